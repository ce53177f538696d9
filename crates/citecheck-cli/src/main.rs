use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use citecheck_core::config_file::{self, ConfigFile};
use citecheck_core::{Matcher, MatcherConfig, NoCache, ReferenceOverride};
use citecheck_ingest::DocumentService;
use citecheck_parsing::{Analyzer, ParsingConfig, ParsingConfigBuilder};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Citation consistency checker - Cross-check in-text citations against the reference list
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file (replaces the platform and ./.citecheck.toml configs)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a .txt, .md or .json document for missing and uncited references
    Check {
        /// Path to the document
        file_path: PathBuf,

        /// Reference list to use instead of the one found in the document
        #[arg(long)]
        references: Option<PathBuf>,

        /// Input type (txt, md, json); defaults to the file extension
        #[arg(long)]
        file_type: Option<String>,

        /// Minimum co-author name similarity (0.0 - 1.0)
        #[arg(long)]
        similarity_threshold: Option<f64>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Path to output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split a raw reference list into entries and show what each parses to
    Segment {
        /// Path to a plain-text reference list
        file_path: PathBuf,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Clean a reference list, add missing year suffixes and sort it
    Normalize {
        /// Path to a plain-text reference list
        file_path: PathBuf,

        /// Print the normalized list and counts as JSON
        #[arg(long)]
        json: bool,

        /// Print only the sorted list, one entry per line
        #[arg(long)]
        plain: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Path to output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare pasted body text with a pasted reference list by key only
    MatchText {
        /// Plain-text file with the body text
        body: PathBuf,

        /// Plain-text file with the reference list
        references: PathBuf,

        /// Print the key lists as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => config_file::load_from_path(path)
            .ok_or_else(|| anyhow::anyhow!("Could not read config file {}", path.display()))?,
        None => config_file::load_config(),
    };
    init_logging(file_config.log_level());

    match cli.command {
        Command::Check {
            file_path,
            references,
            file_type,
            similarity_threshold,
            json,
            no_color,
            output,
        } => check(
            &file_config,
            &file_path,
            references.as_deref(),
            file_type.as_deref(),
            similarity_threshold,
            json,
            no_color,
            output,
        ),
        Command::Segment {
            file_path,
            json,
            no_color,
        } => segment(&file_config, &file_path, json, no_color),
        Command::Normalize {
            file_path,
            json,
            plain,
            no_color,
            output,
        } => normalize(&file_config, &file_path, json, plain, no_color, output),
        Command::MatchText {
            body,
            references,
            json,
            no_color,
        } => match_text(&body, &references, json, no_color),
    }
}

/// Filter precedence: `CITECHECK_LOG`, `RUST_LOG`, config file, then `warn`.
fn init_logging(config_level: Option<&str>) {
    let directive = std::env::var("CITECHECK_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .or_else(|| config_level.map(str::to_string))
        .unwrap_or_else(|| "warn".to_string());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Parsing settings: environment over config file over defaults.
fn parsing_config(file_config: &ConfigFile) -> anyhow::Result<ParsingConfig> {
    let engine = file_config.engine.clone().unwrap_or_default();
    let headings = file_config.headings.clone().unwrap_or_default();

    let mut builder = ParsingConfigBuilder::new();
    for heading in headings.reference.unwrap_or_default() {
        builder = builder.add_reference_heading(heading);
    }
    for heading in headings.tail.unwrap_or_default() {
        builder = builder.add_tail_heading(heading);
    }
    if let Some(chars) = env_value("CITECHECK_CONTEXT_WINDOW").or(engine.context_window) {
        builder = builder.context_window(chars);
    }
    if let Some(lines) = env_value("CITECHECK_MERGE_LINE_CAP").or(engine.merge_line_cap) {
        builder = builder.merge_line_cap(lines);
    }
    if let Some(span) = env_value("CITECHECK_RELAXED_ANCHOR_SPAN").or(engine.relaxed_anchor_span) {
        builder = builder.relaxed_anchor_span(span);
    }
    builder
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid parsing configuration: {}", e))
}

/// Matcher settings: CLI flag over environment over config file over defaults.
fn matcher_config(file_config: &ConfigFile, threshold_flag: Option<f64>) -> anyhow::Result<MatcherConfig> {
    let mut config = MatcherConfig::default();
    if let Some(threshold) = threshold_flag
        .or_else(|| env_value("CITECHECK_SIMILARITY_THRESHOLD"))
        .or(file_config.similarity_threshold())
    {
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("Similarity threshold must be between 0 and 1, got {}", threshold);
        }
        config.similarity_threshold = threshold;
    }
    Ok(config)
}

fn open_writer(output: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[allow(clippy::too_many_arguments)]
fn check(
    file_config: &ConfigFile,
    file_path: &Path,
    references: Option<&Path>,
    file_type: Option<&str>,
    similarity_threshold: Option<f64>,
    json: bool,
    no_color: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    if !file_path.exists() {
        anyhow::bail!("File not found: {}", file_path.display());
    }

    let reference_override = match references {
        Some(path) => Some(ReferenceOverride::Text(
            std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Could not read reference list {}: {}", path.display(), e))?,
        )),
        None => None,
    };

    let analyzer = Analyzer::with_config(
        parsing_config(file_config)?,
        Matcher::new(matcher_config(file_config, similarity_threshold)?),
    );
    tracing::debug!(threshold = analyzer.matcher().config().similarity_threshold, "settings resolved");
    // One analysis per process; the `[cache]` table only sizes `DocumentService::from_config`.
    let service = DocumentService::new(analyzer, Arc::new(NoCache));

    let report = service.analyze_path(file_path, file_type, reference_override.as_ref())?;

    let color = ColorMode(!no_color && output.is_none());
    let mut writer = open_writer(output.as_deref())?;

    if json {
        serde_json::to_writer_pretty(&mut writer, &*report)?;
        writeln!(writer)?;
        return Ok(());
    }

    output::print_summary(&mut writer, &display_name(file_path), &report, color)?;
    output::print_problems(&mut writer, &report, color)?;
    output::print_fallback_matches(&mut writer, &report, color)?;
    Ok(())
}

fn segment(file_config: &ConfigFile, file_path: &Path, json: bool, no_color: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file_path)
        .map_err(|e| anyhow::anyhow!("Could not read {}: {}", file_path.display(), e))?;
    let analyzer = Analyzer::with_config(parsing_config(file_config)?, Matcher::default());

    let entries: Vec<_> = analyzer
        .segment_entries(&raw)
        .into_iter()
        .enumerate()
        .map(|(ordinal, entry)| {
            let parsed = citecheck_parsing::parse_reference(&entry.text, ordinal, 0);
            (entry, parsed)
        })
        .collect();

    let mut writer = open_writer(None)?;
    if json {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|(entry, parsed)| {
                serde_json::json!({
                    "line": entry.line,
                    "text": entry.text,
                    "reference": parsed,
                })
            })
            .collect();
        serde_json::to_writer_pretty(&mut writer, &rows)?;
        writeln!(writer)?;
        return Ok(());
    }

    output::print_segments(&mut writer, &display_name(file_path), &entries, ColorMode(!no_color))?;
    Ok(())
}

fn normalize(
    file_config: &ConfigFile,
    file_path: &Path,
    json: bool,
    plain: bool,
    no_color: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file_path)
        .map_err(|e| anyhow::anyhow!("Could not read {}: {}", file_path.display(), e))?;
    let analyzer = Analyzer::with_config(parsing_config(file_config)?, Matcher::default());
    let list = analyzer.normalize_references(&raw);

    let color = ColorMode(!no_color && output.is_none());
    let mut writer = open_writer(output.as_deref())?;
    if json {
        serde_json::to_writer_pretty(&mut writer, &list)?;
        writeln!(writer)?;
    } else if plain {
        writeln!(writer, "{}", list.formatted())?;
    } else {
        output::print_normalized(&mut writer, &display_name(file_path), &list, color)?;
    }
    Ok(())
}

fn match_text(body: &Path, references: &Path, json: bool, no_color: bool) -> anyhow::Result<()> {
    let body_text = std::fs::read_to_string(body)
        .map_err(|e| anyhow::anyhow!("Could not read {}: {}", body.display(), e))?;
    let reference_text = std::fs::read_to_string(references)
        .map_err(|e| anyhow::anyhow!("Could not read {}: {}", references.display(), e))?;

    let report = citecheck_parsing::check_text(&body_text, &reference_text);

    let mut writer = open_writer(None)?;
    if json {
        serde_json::to_writer_pretty(&mut writer, &report)?;
        writeln!(writer)?;
        return Ok(());
    }
    output::print_free_text(&mut writer, &report, ColorMode(!no_color))?;
    Ok(())
}
