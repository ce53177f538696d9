use citecheck_core::keys::normalize_year;
use citecheck_core::text_utils::normalize_text;
use citecheck_core::{ExtractionResult, Language, Paragraph, ParseFailure, ParseStats, ReferenceItem};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ParsingConfig;
use crate::patterns::{CJK, LATIN, YEAR_TOKEN};
use crate::segment::segment_entries_with_config;

static PAREN_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\(\s*({YEAR_TOKEN})([- ]?[a-zA-Z])?\s*\)")).unwrap());
static PAREN_ANY_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]*(?:19|20)\d{2}[^()]*)\)").unwrap());
static COMMA_BARE_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"[,\s]\s*((?:19|20)\d{{2}}[a-z]?|{YEAR_TOKEN})\s*[,.]")).unwrap());
static DOT_BARE_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[.\s])((?:19|20)\d{2}[a-z]?)\.").unwrap());

static LATIN_FIRST_AUTHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^([{LATIN}][{LATIN}'\-\s\.]*?),")).unwrap());
static LATIN_SECOND_AUTHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?:&|\band\b)\s*([{LATIN}][{LATIN}'\-\s\.]*?)\s*(?:,|$)")).unwrap()
});
static CONNECTOR_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&|\band\b").unwrap());
static CJK_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"[{CJK}]{{1,10}}")).unwrap());

/// Organization authors without a comma are only accepted below this length.
const MAX_UNDELIMITED_AUTHOR_CHARS: usize = 100;

/// Where the year marker sits in an entry.
pub(crate) struct YearMarker {
    pub(crate) year: String,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

/// Locate the year marker, most specific form first.
pub(crate) fn find_year_marker(text: &str) -> Option<YearMarker> {
    if let Some(caps) = PAREN_YEAR_RE.captures(text) {
        let whole = caps.get(0)?;
        let suffix = caps.get(2).map_or("", |m| m.as_str());
        return Some(YearMarker {
            year: normalize_year(&format!("{}{}", &caps[1], suffix)),
            start: whole.start(),
            end: whole.end(),
        });
    }
    if let Some(caps) = PAREN_ANY_YEAR_RE.captures(text) {
        let whole = caps.get(0)?;
        return Some(YearMarker {
            year: normalize_year(&caps[1]),
            start: whole.start(),
            end: whole.end(),
        });
    }
    if let Some(caps) = COMMA_BARE_YEAR_RE.captures(text) {
        let whole = caps.get(0)?;
        return Some(YearMarker {
            year: normalize_year(&caps[1]),
            start: whole.start(),
            end: caps.get(1)?.end(),
        });
    }
    let caps = DOT_BARE_YEAR_RE.captures(text)?;
    let year = caps.get(1)?;
    Some(YearMarker {
        year: normalize_year(year.as_str()),
        start: year.start(),
        end: year.end(),
    })
}

/// Best-effort title and source: the text after the year marker, split at its
/// first period.
fn title_and_source(rest: &str) -> (Option<String>, Option<String>) {
    let rest = rest.trim_start_matches(['.', ',', ')', ' ']).trim();
    if rest.is_empty() {
        return (None, None);
    }
    let non_empty = |s: &str| {
        let s = s.trim().trim_end_matches('.').trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    match rest.find('.') {
        Some(idx) => (non_empty(&rest[..idx]), non_empty(&rest[idx + 1..])),
        None => (non_empty(rest), None),
    }
}

fn latin_authors(pre: &str) -> Option<(String, Option<String>)> {
    let second = LATIN_SECOND_AUTHOR_RE
        .captures(pre)
        .map(|c| c[1].trim().trim_end_matches('.').trim().to_string())
        .filter(|a| !a.is_empty());

    if let Some(first) = LATIN_FIRST_AUTHOR_RE.captures(pre) {
        return Some((first[1].trim().to_string(), second));
    }

    let whole = pre.trim().trim_end_matches('.').trim();
    if whole.is_empty() || whole.chars().count() >= MAX_UNDELIMITED_AUTHOR_CHARS {
        return None;
    }
    let first = match &second {
        Some(a2) if whole.contains(a2.as_str()) => CONNECTOR_SPLIT_RE
            .split(whole)
            .next()
            .unwrap_or(whole)
            .trim()
            .to_string(),
        _ => whole.to_string(),
    };
    (!first.is_empty()).then_some((first, second))
}

fn chinese_authors(pre: &str) -> Option<(String, Option<String>)> {
    let cleaned: String = pre
        .chars()
        .map(|c| if matches!(c, '與' | '和' | '及' | '&' | '、') { ' ' } else { c })
        .collect();
    let tokens: Vec<&str> = CJK_NAME_RE.find_iter(&cleaned).map(|m| m.as_str()).collect();
    let strip_etal = |t: &str| t.trim_end_matches("等人").trim_end_matches('等').to_string();
    let first = strip_etal(tokens.first()?);
    if first.is_empty() {
        return None;
    }
    let second = (tokens.len() >= 2)
        .then(|| strip_etal(tokens[tokens.len() - 1]))
        .filter(|t| !t.is_empty());
    Some((first, second))
}

/// Parse one segmented entry. `None` means no year marker or no author
/// could be found; the caller counts it as a parse failure.
pub fn parse_reference(entry: &str, ordinal: usize, page: u32) -> Option<ReferenceItem> {
    let text = normalize_text(entry);
    let marker = find_year_marker(&text)?;
    let pre = text[..marker.start].trim();

    let probe: String = if pre.is_empty() {
        text.chars().take(20).collect()
    } else {
        pre.to_string()
    };
    let language = Language::detect(&probe);
    let (author1, author2) = match language {
        Language::Latin => latin_authors(pre)?,
        Language::Chinese => chinese_authors(pre)?,
    };
    let (title, source) = title_and_source(&text[marker.end..]);

    Some(ReferenceItem {
        language,
        author1,
        author2,
        year: marker.year,
        raw: text,
        index: ordinal,
        page,
        title,
        source,
    })
}

/// Segment and parse a collected reference list.
///
/// Paragraphs are joined line by line so every entry can be attributed to the
/// page of the paragraph holding its first line. Retained entries get
/// consecutive indices; dropped ones are recorded in the stats.
pub fn extract_reference_items(paragraphs: &[Paragraph]) -> ExtractionResult {
    extract_reference_items_with_config(paragraphs, &ParsingConfig::default())
}

pub(crate) fn extract_reference_items_with_config(
    paragraphs: &[Paragraph],
    config: &ParsingConfig,
) -> ExtractionResult {
    let mut line_pages: Vec<u32> = Vec::new();
    let mut blob = String::new();
    for p in paragraphs {
        for line in p.text.lines() {
            if !blob.is_empty() {
                blob.push('\n');
            }
            blob.push_str(line);
            line_pages.push(p.page);
        }
    }

    let entries = segment_entries_with_config(&blob, config);
    let mut references = Vec::new();
    let mut stats = ParseStats {
        total_segments: entries.len(),
        ..ParseStats::default()
    };
    for (ordinal, entry) in entries.iter().enumerate() {
        let page = line_pages.get(entry.line).copied().unwrap_or(0);
        match parse_reference(&entry.text, references.len(), page) {
            Some(item) => references.push(item),
            None => {
                tracing::debug!(ordinal, entry = %entry.text, "reference entry without year or author");
                stats.failures.push(ParseFailure {
                    ordinal,
                    text: entry.text.clone(),
                });
            }
        }
    }
    stats.parsed = references.len();
    tracing::debug!(
        segments = stats.total_segments,
        parsed = stats.parsed,
        failed = stats.failures.len(),
        "reference list parsed"
    );
    ExtractionResult { references, stats }
}
