use std::io::Write;

use citecheck_core::text_utils::truncate_chars;
use citecheck_core::{AnalysisReport, IdentityKey, InTextCitation, MatchType, ReferenceItem, ReferenceSource};
use citecheck_parsing::{FreeTextReport, NormalizedReferenceList, SegmentedEntry};
use owo_colors::OwoColorize;

const RAW_DISPLAY_CHARS: usize = 160;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn heading(w: &mut dyn Write, title: &str, count: usize, color: ColorMode) -> std::io::Result<()> {
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{} ({})", title.bold(), count)?;
    } else {
        writeln!(w, "{} ({})", title, count)?;
    }
    Ok(())
}

fn citation_line(citation: &InTextCitation) -> String {
    let key = IdentityKey::for_citation(citation).key_string();
    format!("{key}  \"{}\"  page {}", citation.raw, citation.page)
}

fn reference_line(reference: &ReferenceItem) -> String {
    let raw: String = reference.raw.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(
        "[{}] {}  page {}",
        reference.index + 1,
        truncate_chars(&raw, RAW_DISPLAY_CHARS),
        reference.page
    )
}

/// Print the header, counts and any override warning.
pub fn print_summary(
    w: &mut dyn Write,
    file_name: &str,
    report: &AnalysisReport,
    color: ColorMode,
) -> std::io::Result<()> {
    let s = &report.summary;
    writeln!(w, "Checking citations in {}...", file_name)?;
    let source = match report.metadata.reference_source {
        ReferenceSource::AutoExtracted => "extracted from document",
        ReferenceSource::UserOverride => "supplied by user",
    };
    writeln!(w, "Found {} references ({}), {} in-text citations", s.reference_items, source, s.citations)?;

    let failed = report.parse_stats.failures.len();
    if failed > 0 {
        let msg = format!("(Skipped {} entries without a year)", failed);
        if color.enabled() {
            writeln!(w, "{}", msg.dimmed())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    }

    if let Some(warning) = &report.metadata.warning {
        if color.enabled() {
            writeln!(w, "{} {}", "WARNING:".yellow(), warning)?;
        } else {
            writeln!(w, "WARNING: {}", warning)?;
        }
    }

    writeln!(w)?;
    if color.enabled() {
        writeln!(
            w,
            "{} matched, {} missing, {} uncited",
            s.matched.to_string().green(),
            s.missing.to_string().red(),
            s.uncited.to_string().yellow()
        )?;
    } else {
        writeln!(w, "{} matched, {} missing, {} uncited", s.matched, s.missing, s.uncited)?;
    }
    Ok(())
}

/// Citations with no reference entry, then reference entries nobody cites.
pub fn print_problems(w: &mut dyn Write, report: &AnalysisReport, color: ColorMode) -> std::io::Result<()> {
    let outcome = &report.outcome;

    if !outcome.missing.is_empty() {
        heading(w, "Citations missing from the reference list", outcome.missing.len(), color)?;
        for citation in &outcome.missing {
            let line = citation_line(citation);
            if color.enabled() {
                writeln!(w, "  {} {}", "MISSING".red(), line)?;
            } else {
                writeln!(w, "  MISSING {}", line)?;
            }
            if !citation.context.is_empty() {
                writeln!(w, "          ...{}...", citation.context)?;
            }
        }
    }

    if !outcome.uncited.is_empty() {
        heading(w, "References never cited", outcome.uncited.len(), color)?;
        for reference in &outcome.uncited {
            let line = reference_line(reference);
            if color.enabled() {
                writeln!(w, "  {} {}", "UNCITED".yellow(), line)?;
            } else {
                writeln!(w, "  UNCITED {}", line)?;
            }
        }
    }

    if !outcome.ambiguous.is_empty() {
        heading(w, "Keys shared by several references", outcome.ambiguous.len(), color)?;
        for ambiguous in &outcome.ambiguous {
            writeln!(w, "  {}", ambiguous.key)?;
            for preview in &ambiguous.previews {
                writeln!(w, "      {}", preview)?;
            }
        }
    }
    Ok(())
}

/// Matches that needed a fallback strategy.
pub fn print_fallback_matches(w: &mut dyn Write, report: &AnalysisReport, color: ColorMode) -> std::io::Result<()> {
    let fallbacks: Vec<_> = report
        .outcome
        .matched
        .iter()
        .filter(|m| m.match_type != MatchType::Exact)
        .collect();
    if fallbacks.is_empty() {
        return Ok(());
    }
    heading(w, "Matched without an exact key", fallbacks.len(), color)?;
    for m in fallbacks {
        let label = match m.match_type {
            MatchType::RawTextFallback => "RAW TEXT",
            MatchType::ContextRecovery => "CONTEXT",
            MatchType::Exact => "EXACT",
        };
        let target = m
            .reference
            .as_ref()
            .map_or_else(|| "reference section text".to_string(), reference_line);
        if color.enabled() {
            writeln!(w, "  {} {} -> {}", label.cyan(), citation_line(&m.citation), target)?;
        } else {
            writeln!(w, "  {} {} -> {}", label, citation_line(&m.citation), target)?;
        }
    }
    Ok(())
}

/// Segmented entries of a raw reference list and what each parsed to.
pub fn print_segments(
    w: &mut dyn Write,
    file_name: &str,
    entries: &[(SegmentedEntry, Option<ReferenceItem>)],
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} ({} entries segmented)\n", file_name.bold(), entries.len())?;
    } else {
        writeln!(w, "{} ({} entries segmented)\n", file_name, entries.len())?;
    }

    for (i, (entry, parsed)) in entries.iter().enumerate() {
        let raw: String = entry.text.split_whitespace().collect::<Vec<_>>().join(" ");
        writeln!(w, "[{}] line {}: {}", i + 1, entry.line + 1, truncate_chars(&raw, RAW_DISPLAY_CHARS))?;
        match parsed {
            Some(item) => {
                let key = IdentityKey::for_reference(item).key_string();
                let authors = match &item.author2 {
                    Some(second) => format!("{}, {}", item.author1, second),
                    None => item.author1.clone(),
                };
                if color.enabled() {
                    writeln!(w, "    {} {}  ({}; {})", "KEY".green(), key, authors, item.year)?;
                } else {
                    writeln!(w, "    KEY {}  ({}; {})", key, authors, item.year)?;
                }
                if let Some(title) = &item.title {
                    writeln!(w, "    Title: {}", title)?;
                }
            }
            None => {
                if color.enabled() {
                    writeln!(w, "    {}", "no year found".red())?;
                } else {
                    writeln!(w, "    no year found")?;
                }
            }
        }
    }
    Ok(())
}

/// Sorted reference list, then the entries that could not be sorted.
pub fn print_normalized(
    w: &mut dyn Write,
    file_name: &str,
    list: &NormalizedReferenceList,
    color: ColorMode,
) -> std::io::Result<()> {
    let counts = format!(
        "{} entries, {} after cleaning, {} sorted, {} auto-suffixed",
        list.raw_count,
        list.clean_count,
        list.references.len(),
        list.auto_suffixed
    );
    if color.enabled() {
        writeln!(w, "{} ({})\n", file_name.bold(), counts)?;
    } else {
        writeln!(w, "{} ({})\n", file_name, counts)?;
    }

    for reference in &list.references {
        if reference.auto_suffixed && color.enabled() {
            writeln!(w, "{}  {}", reference.text, "[suffix added]".cyan())?;
        } else if reference.auto_suffixed {
            writeln!(w, "{}  [suffix added]", reference.text)?;
        } else {
            writeln!(w, "{}", reference.text)?;
        }
    }

    if !list.failed.is_empty() {
        heading(w, "Entries left unsorted", list.failed.len(), color)?;
        for failed in &list.failed {
            let text = truncate_chars(&failed.text, RAW_DISPLAY_CHARS);
            if color.enabled() {
                writeln!(w, "  {} {}", failed.reason.as_str().red(), text)?;
            } else {
                writeln!(w, "  {} {}", failed.reason.as_str(), text)?;
            }
        }
    }
    Ok(())
}

/// Key lists of a free-text comparison.
pub fn print_free_text(w: &mut dyn Write, report: &FreeTextReport, color: ColorMode) -> std::io::Result<()> {
    let sections: [(&str, &[String]); 3] = [
        ("Matched", &report.matched),
        ("Missing from references", &report.missing),
        ("Never cited", &report.extra),
    ];
    for (title, keys) in sections {
        heading(w, title, keys.len(), color)?;
        for key in keys {
            writeln!(w, "  {}", key)?;
        }
    }
    if !report.ambiguous.is_empty() {
        heading(w, "Ambiguous", report.ambiguous.len(), color)?;
        for ambiguous in &report.ambiguous {
            writeln!(w, "  {} ({} candidates)", ambiguous.key, ambiguous.candidates.len())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use citecheck_core::Paragraph;
    use citecheck_parsing::Analyzer;

    fn render(report: &AnalysisReport) -> String {
        let mut buf = Vec::new();
        print_summary(&mut buf, "paper.txt", report, ColorMode(false)).unwrap();
        print_problems(&mut buf, report, ColorMode(false)).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_plain_report() {
        let paragraphs = vec![
            Paragraph::new("Costs rise (Chava, 2014) and (Baier et al., 2020).", 1),
            Paragraph::new("References", 2),
            Paragraph::new("Chava, S. (2014). Environmental externalities.", 2),
            Paragraph::new("Lee, K. (2019). Uncited work.", 2),
        ];
        let report = Analyzer::new().analyze(&paragraphs, None).unwrap();
        let text = render(&report);
        assert!(text.contains("Found 2 references (extracted from document), 2 in-text citations"));
        assert!(text.contains("1 matched, 1 missing, 1 uncited"));
        assert!(text.contains("MISSING baier_2020"));
        assert!(text.contains("UNCITED [2] Lee, K. (2019). Uncited work.  page 2"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_normalized_list() {
        let list = citecheck_parsing::normalize_references(
            "Lee, K. (2019). Zebra. Journal.\n\nLee, K. (2019). Apple. Journal.\n\nNo year here.",
        );
        let mut buf = Vec::new();
        print_normalized(&mut buf, "refs.txt", &list, ColorMode(false)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("refs.txt (3 entries, 3 after cleaning, 2 sorted, 2 auto-suffixed)"));
        assert!(text.contains("Lee, K. (2019a). Apple. Journal.  [suffix added]\nLee, K. (2019b). Zebra. Journal."));
        assert!(text.contains("Entries left unsorted (1)\n  year_missing No year here."));
    }

    #[test]
    fn test_free_text_sections() {
        let report = FreeTextReport {
            matched: vec!["chava_2014".into()],
            missing: vec![],
            extra: vec!["lee_2019".into()],
            ambiguous: vec![],
        };
        let mut buf = Vec::new();
        print_free_text(&mut buf, &report, ColorMode(false)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Matched (1)\n  chava_2014"));
        assert!(text.contains("Missing from references (0)"));
        assert!(text.contains("Never cited (1)\n  lee_2019"));
        assert!(!text.contains("Ambiguous"));
    }
}
