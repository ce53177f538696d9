use citecheck_core::text_utils::{is_cjk, normalize_text};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::boundary::{self, Boundary};
use crate::config::{DEFAULT_RELAXED_ANCHOR_SPAN, ParsingConfig};
use crate::patterns::{AUTHOR_YEAR_OPENING_RE, CJK, YEAR_TOKEN, has_year};

/// Minimum distance in bytes between two accepted anchors.
const MIN_ANCHOR_GAP: usize = 8;

/// `Surname, I. I., Surname, I., & Surname, I. (year)`.
static STRICT_ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    let author = r"[A-Z][A-Za-z'\-]+,\s*(?:[A-Z]\.(?:-[A-Z]\.)?\s*)+";
    Regex::new(&format!(
        r"{author}(?:,\s*{author})*(?:\s*,?\s*(?:&|and)\s*{author})?\s*\(\s*{YEAR_TOKEN}(?:[- ]?[a-z])?\s*\)"
    ))
    .unwrap()
});

static RELAXED_ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&relaxed_anchor_pattern(DEFAULT_RELAXED_ANCHOR_SPAN)).unwrap());

static ZH_ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"[{CJK}]{{1,20}}\s*\(\s*{YEAR_TOKEN}(?:[- ]?[a-z])?\s*\)")).unwrap());

static INLINE_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.;]\s+").unwrap());
static CONNECTOR_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:&|\band|,)\s*$").unwrap());

/// `Surname, <up to span chars without parentheses> (year)`.
pub(crate) fn relaxed_anchor_pattern(span: usize) -> String {
    format!(r"[A-Z][A-Za-z'\-]+,\s*[^()]{{0,{span}}}?\(\s*{YEAR_TOKEN}(?:[- ]?[a-z])?\s*\)")
}

/// One reference entry cut from the reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedEntry {
    pub text: String,
    /// Source line (0-based) holding the entry's first character.
    pub line: usize,
}

impl SegmentedEntry {
    fn new(text: &str, line: usize) -> Self {
        Self {
            text: text.to_string(),
            line,
        }
    }
}

/// Split a raw reference-list blob into one string per entry, in order.
pub fn segment(raw: &str) -> Vec<String> {
    segment_entries(raw).into_iter().map(|e| e.text).collect()
}

/// Like [`segment`], keeping the source line of every entry.
pub fn segment_entries(raw: &str) -> Vec<SegmentedEntry> {
    segment_entries_with_config(raw, &ParsingConfig::default())
}

pub(crate) fn segment_entries_with_config(raw: &str, config: &ParsingConfig) -> Vec<SegmentedEntry> {
    let lines: Vec<String> = raw.lines().map(normalize_text).collect();
    let by_lines = split_by_lines(&lines);

    let joined = lines.join("\n");
    let relaxed = config.relaxed_anchor_re.as_ref().unwrap_or(&RELAXED_ANCHOR_RE);
    let starts = find_anchor_starts(&joined, relaxed);
    if starts.len() >= 2 {
        let anchored = split_at_anchors(&joined, &starts);
        if anchored.len() > by_lines.len() {
            tracing::debug!(
                anchored = anchored.len(),
                by_lines = by_lines.len(),
                "segmentation: anchor split wins"
            );
            return anchored;
        }
    }
    tracing::debug!(entries = by_lines.len(), "segmentation: line split");
    by_lines
}

/// Blank-line blocks first, then the line-merge heuristic.
///
/// A blank-separated block is one entry unless it holds several lines that
/// open with an author and a year.
fn split_by_lines(lines: &[String]) -> Vec<SegmentedEntry> {
    let mut blocks: Vec<Vec<(usize, &str)>> = Vec::new();
    let mut current: Vec<(usize, &str)> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push((idx, line.as_str()));
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    if blocks.len() < 2 {
        return blocks.iter().flat_map(|b| merge_lines(b)).collect();
    }

    let mut entries = Vec::new();
    for block in &blocks {
        let year_starts = block
            .iter()
            .filter(|(_, line)| has_year(line) && boundary::entry_start_rule(line).is_some())
            .count();
        if year_starts >= 2 {
            entries.extend(merge_lines(block));
        } else {
            entries.push(join_block(block));
        }
    }
    entries
}

/// Merge lines into entries per the boundary rules, then split crammed lines.
fn merge_lines(lines: &[(usize, &str)]) -> Vec<SegmentedEntry> {
    let mut merged: Vec<SegmentedEntry> = Vec::new();
    for &(idx, line) in lines {
        match merged.last_mut() {
            None => merged.push(SegmentedEntry::new(line, idx)),
            Some(current) => match boundary::classify(&current.text, line) {
                Boundary::Split(rule) => {
                    tracing::trace!(rule, line = idx, "entry boundary");
                    merged.push(SegmentedEntry::new(line, idx));
                }
                Boundary::Continue(rule) => {
                    tracing::trace!(rule, line = idx, "entry continues");
                    join_wrapped(&mut current.text, line);
                }
                Boundary::Append => join_wrapped(&mut current.text, line),
            },
        }
    }
    merged.into_iter().flat_map(split_inline).collect()
}

fn join_block(block: &[(usize, &str)]) -> SegmentedEntry {
    let mut text = String::new();
    for (_, line) in block {
        join_wrapped(&mut text, line);
    }
    SegmentedEntry {
        text,
        line: block.first().map_or(0, |(idx, _)| *idx),
    }
}

/// Append a wrapped line, repairing a word broken by a line-end hyphen.
fn join_wrapped(buffer: &mut String, next: &str) {
    let next = next.trim();
    if next.is_empty() {
        return;
    }
    if buffer.is_empty() {
        buffer.push_str(next);
        return;
    }
    if buffer.ends_with('-') {
        let before = buffer[..buffer.len() - 1].chars().next_back();
        let starts_lower = next.chars().next().is_some_and(char::is_lowercase);
        if before.is_some_and(char::is_alphabetic) && starts_lower {
            buffer.pop();
        }
        buffer.push_str(next);
        return;
    }
    let glued_cjk = buffer.chars().next_back().is_some_and(is_cjk) && next.chars().next().is_some_and(is_cjk);
    if !glued_cjk {
        buffer.push(' ');
    }
    buffer.push_str(next);
}

/// Split one entry at `.` / `;` followed by an author-with-year opening.
fn split_inline(entry: SegmentedEntry) -> Vec<SegmentedEntry> {
    let cuts: Vec<usize> = INLINE_SEPARATOR_RE
        .find_iter(&entry.text)
        .filter(|m| AUTHOR_YEAR_OPENING_RE.is_match(&entry.text[m.end()..]))
        .map(|m| m.end())
        .collect();
    if cuts.is_empty() {
        return vec![entry];
    }

    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut prev = 0;
    for cut in cuts.into_iter().chain(std::iter::once(entry.text.len())) {
        let piece = entry.text[prev..cut].trim();
        if !piece.is_empty() {
            pieces.push(SegmentedEntry::new(piece, entry.line));
        }
        prev = cut;
    }
    pieces
}

/// A start at `idx` sits at a line start (not after a connector), after
/// terminal punctuation, or after a URL.
fn is_start_boundary(text: &str, idx: usize) -> bool {
    let before = text[..idx].trim_end_matches([' ', '\t']);
    match before.chars().next_back() {
        None => true,
        Some('\n') => {
            let prev_line = before[..before.len() - 1].rsplit('\n').next().unwrap_or_default();
            !CONNECTOR_END_RE.is_match(prev_line.trim())
        }
        Some('.' | ';' | '!' | '?') => true,
        Some(_) => {
            let token = before.rsplit(char::is_whitespace).next().unwrap_or_default();
            token.contains("http://") || token.contains("https://") || token.starts_with("www.")
        }
    }
}

/// Byte offsets of accepted entry starts, sorted and de-duplicated.
fn find_anchor_starts(text: &str, relaxed: &Regex) -> Vec<usize> {
    let strong: Vec<usize> = STRICT_ANCHOR_RE
        .find_iter(text)
        .chain(ZH_ANCHOR_RE.find_iter(text))
        .map(|m| m.start())
        .filter(|&s| is_start_boundary(text, s))
        .collect();

    // A relaxed match swallowing a stronger start would cut the entry too early.
    let weak = relaxed
        .find_iter(text)
        .filter(|m| !strong.iter().any(|&s| s > m.start() && s < m.end()))
        .map(|m| m.start())
        .filter(|&s| is_start_boundary(text, s));

    let mut all: Vec<usize> = strong.iter().copied().chain(weak).collect();
    all.sort_unstable();
    let mut starts: Vec<usize> = Vec::with_capacity(all.len());
    for s in all {
        if starts.last().is_none_or(|&last| s - last >= MIN_ANCHOR_GAP) {
            starts.push(s);
        }
    }
    starts
}

fn split_at_anchors(text: &str, starts: &[usize]) -> Vec<SegmentedEntry> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| line_starts.partition_point(|&ls| ls <= offset).saturating_sub(1);

    let mut entries = Vec::new();
    let piece = |from: usize, to: usize| -> String {
        let mut buf = String::new();
        for line in text[from..to].split('\n') {
            join_wrapped(&mut buf, line);
        }
        buf
    };

    // Text before the first anchor survives only if it could be an entry itself.
    let head = piece(0, starts[0]);
    if !head.is_empty() && has_year(&head) {
        entries.push(SegmentedEntry { text: head, line: 0 });
    }
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let entry_text = piece(start, end);
        if !entry_text.is_empty() {
            entries.push(SegmentedEntry {
                text: entry_text,
                line: line_of(start),
            });
        }
    }
    entries
}
