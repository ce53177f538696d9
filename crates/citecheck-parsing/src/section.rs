use citecheck_core::Paragraph;
use citecheck_core::text_utils::{is_latin_letter, normalize_text};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ParsingConfig;

static HEADING_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+(?:\.\d+)*\.?|[ivxlc]+\.|第[一二三四五六七八九十]+[章節])\s*").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:19|20)\d{2}").unwrap());
static TABLE_TAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:表\s*[一二三四五六七八九十\d]+|table\s*[ivx\d]+\b)").unwrap());
static APPENDIX_TAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(?:附錄|appendix\b|appendices\b)").unwrap());
static PAGE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:page\s+)?-?\s*\d{1,4}\s*-?(?:\s*(?:/|of)\s*\d{1,4})?$").unwrap());
static NUMBERED_RUNNING_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\s+[A-Za-z][A-Za-z\-\s\.]{8,}$").unwrap());
static TITLE_CASE_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Z][A-Za-z'\-]+\s+){2,}[A-Z][A-Za-z'\-]+$").unwrap());

/// Heading text with numbering and trailing punctuation removed, lower-cased.
fn heading_candidate(text: &str) -> String {
    let lowered = normalize_text(text).to_lowercase();
    let stripped = HEADING_NUMBER_RE.replace(&lowered, "");
    stripped.trim().trim_end_matches([':', '.', ' ']).to_string()
}

/// `heading` occurs in `line` without touching another Latin letter.
fn contains_heading(line: &str, heading: &str) -> bool {
    line.match_indices(heading).any(|(start, m)| {
        let before = line[..start].chars().next_back();
        let after = line[start + m.len()..].chars().next();
        !before.is_some_and(is_latin_letter) && !after.is_some_and(is_latin_letter)
    })
}

fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Index of the reference-section heading paragraph.
///
/// Three passes of decreasing strictness: exact heading, heading with spaces
/// removed, then a short line (≤ 40 chars) containing a heading. Within a
/// pass the last matching paragraph wins so a table of contents entry never
/// shadows the real heading.
pub fn find_reference_section_start(paragraphs: &[Paragraph]) -> Option<usize> {
    find_reference_section_start_with_config(paragraphs, &ParsingConfig::default())
}

pub(crate) fn find_reference_section_start_with_config(
    paragraphs: &[Paragraph],
    config: &ParsingConfig,
) -> Option<usize> {
    let headings = config.reference_headings();
    let compact_headings: Vec<String> = headings.iter().map(|h| compact(h)).collect();
    let candidates: Vec<String> = paragraphs.iter().map(|p| heading_candidate(&p.text)).collect();

    let exact = candidates.iter().rposition(|c| {
        !c.is_empty() && headings.iter().any(|h| h == c)
            || config
                .section_header_re
                .as_ref()
                .is_some_and(|re| !c.is_empty() && re.is_match(c))
    });
    if exact.is_some() {
        return exact;
    }

    let spaced = candidates.iter().rposition(|c| {
        let c = compact(c);
        !c.is_empty() && compact_headings.iter().any(|h| *h == c)
    });
    if spaced.is_some() {
        return spaced;
    }

    candidates.iter().rposition(|c| {
        c.chars().count() <= 40 && headings.iter().any(|h| contains_heading(c, h))
    })
}

/// A heading that closes the reference list (e.g. a trailing technical-report list).
fn is_tail_heading(text: &str, config: &ParsingConfig) -> bool {
    if config.section_end_re.as_ref().is_some_and(|re| re.is_match(text)) {
        return true;
    }
    if text.chars().count() > 60 || YEAR_RE.is_match(text) {
        return false;
    }
    let squeeze = |s: &str| -> String { s.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect() };
    let line = squeeze(text);
    config.tail_headings().iter().any(|h| {
        let marker = squeeze(h);
        !marker.is_empty() && line.contains(&marker)
    })
}

/// Table or appendix material that follows the reference list.
pub fn is_non_reference_tail(text: &str) -> bool {
    TABLE_TAIL_RE.is_match(text) || APPENDIX_TAIL_RE.is_match(text)
}

/// Page numbers, download stamps and running headers that interrupt a reference list.
pub fn is_running_noise(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if PAGE_NUMBER_RE.is_match(text) {
        return true;
    }
    let low = text.to_lowercase();
    if low.contains("this content downloaded from") || low.contains("all use subject to") {
        return true;
    }
    let has_punct = text.contains([',', '(', ')']);
    if NUMBERED_RUNNING_HEADER_RE.is_match(text) && !has_punct {
        return true;
    }
    TITLE_CASE_HEADER_RE.is_match(text) && !has_punct && !YEAR_RE.is_match(text)
}

/// Normalized reference-list paragraphs following the heading at `start`.
///
/// Empty paragraphs and running noise are skipped; collection stops at the
/// first tail heading or appendix/table content.
pub fn collect_reference_paragraphs(paragraphs: &[Paragraph], start: usize) -> Vec<Paragraph> {
    collect_reference_paragraphs_with_config(paragraphs, start, &ParsingConfig::default())
}

pub(crate) fn collect_reference_paragraphs_with_config(
    paragraphs: &[Paragraph],
    start: usize,
    config: &ParsingConfig,
) -> Vec<Paragraph> {
    let mut kept = Vec::new();
    let mut noise = 0usize;
    for p in paragraphs.iter().skip(start + 1) {
        let text = normalize_text(&p.text);
        if text.is_empty() {
            continue;
        }
        if is_tail_heading(&text, config) || is_non_reference_tail(&text) {
            tracing::debug!(page = p.page, line = %text, "reference list ends");
            break;
        }
        if is_running_noise(&text) {
            noise += 1;
            continue;
        }
        kept.push(Paragraph::new(text, p.page));
    }
    tracing::debug!(kept = kept.len(), noise, "collected reference paragraphs");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParsingConfigBuilder;

    fn paras(lines: &[&str]) -> Vec<Paragraph> {
        lines.iter().map(|l| Paragraph::new(*l, 1)).collect()
    }

    #[test]
    fn test_exact_heading() {
        let doc = paras(&["Introduction", "Body text (Smith, 2020).", "References", "Smith, J. (2020). Title."]);
        assert_eq!(find_reference_section_start(&doc), Some(2));
    }

    #[test]
    fn test_chinese_and_spaced_headings() {
        let doc = paras(&["緒論", "參考文獻：", "王小明(2020)。標題。"]);
        assert_eq!(find_reference_section_start(&doc), Some(1));
        let spaced = paras(&["正文", "參 考 文 獻", "王小明(2020)。"]);
        assert_eq!(find_reference_section_start(&spaced), Some(1));
    }

    #[test]
    fn test_numbered_heading() {
        let doc = paras(&["1. Introduction", "7. References", "Smith, J. (2020)."]);
        assert_eq!(find_reference_section_start(&doc), Some(1));
    }

    #[test]
    fn test_last_exact_heading_wins() {
        let doc = paras(&["Contents", "References", "1 Introduction", "Body.", "References", "Smith, J. (2020)."]);
        assert_eq!(find_reference_section_start(&doc), Some(4));
    }

    #[test]
    fn test_contained_heading_respects_word_boundary() {
        let doc = paras(&["Consumer preferences", "Body."]);
        assert_eq!(find_reference_section_start(&doc), None);
        let doc = paras(&["Body.", "List of References Cited", "Smith, J. (2020)."]);
        assert_eq!(find_reference_section_start(&doc), Some(1));
    }

    #[test]
    fn test_custom_heading_regex() {
        let config = ParsingConfigBuilder::new()
            .section_header_regex(r"^quellen(verzeichnis)?$")
            .build()
            .unwrap();
        let doc = paras(&["Einleitung", "Quellenverzeichnis", "Müller, A. (2019)."]);
        assert_eq!(find_reference_section_start_with_config(&doc, &config), Some(1));
    }

    #[test]
    fn test_noise_filters() {
        assert!(is_running_noise("12"));
        assert!(is_running_noise("Page 3 of 10"));
        assert!(is_running_noise("This content downloaded from 140.112.1.1 on Mon"));
        assert!(is_running_noise("12 Journal of Management Studies"));
        assert!(is_running_noise("Journal Of Accounting Research"));
        assert!(!is_running_noise("Smith, J. (2020). Title."));
        assert!(!is_running_noise("Policy, 35, 455-476."));
        assert!(!is_running_noise("Firm Investment Decisions."));
    }

    #[test]
    fn test_collect_stops_at_tail() {
        let doc = vec![
            Paragraph::new("Body", 1),
            Paragraph::new("References", 5),
            Paragraph::new("Smith, J. (2020). Title.", 5),
            Paragraph::new("", 5),
            Paragraph::new("17", 5),
            Paragraph::new("Lee, K. (2019). Other.", 6),
            Paragraph::new("技術手冊、準則與報告", 6),
            Paragraph::new("經濟部(2018)。技術手冊。", 6),
        ];
        let kept = collect_reference_paragraphs(&doc, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].text, "Lee, K. (2019). Other.");
        assert_eq!(kept[1].page, 6);
    }

    #[test]
    fn test_collect_stops_at_appendix() {
        let doc = paras(&["References", "Smith, J. (2020).", "Appendix A", "Table content (2019)"]);
        let kept = collect_reference_paragraphs(&doc, 0);
        assert_eq!(kept.len(), 1);
        assert!(is_non_reference_tail("表一 樣本分布"));
        assert!(is_non_reference_tail("Table 3 Descriptive statistics"));
    }
}
