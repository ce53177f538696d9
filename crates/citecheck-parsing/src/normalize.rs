//! Reference-list clean-up: tidy every entry, disambiguate same-author
//! same-year entries with year suffixes, and sort the list.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use citecheck_core::text_utils::normalize_text;
use citecheck_core::{IdentityKey, Language, ReferenceItem};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::ParsingConfig;
use crate::reference::{find_year_marker, parse_reference};
use crate::segment::segment_entries_with_config;

static SPACE_BEFORE_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.;:])").unwrap());
static COMMA_SPACING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s+").unwrap());
static NUMBER_RANGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)\s*-\s*(\d)").unwrap());

/// Why an entry was left out of the sorted list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    YearMissing,
    AuthorMissing,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::YearMissing => "year_missing",
            FailureReason::AuthorMissing => "author_missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedReference {
    /// Cleaned entry text; an assigned suffix is written into its year marker.
    pub text: String,
    pub key: String,
    pub language: Language,
    pub year: String,
    pub auto_suffixed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedReference {
    /// Position among the cleaned entries.
    pub ordinal: usize,
    pub text: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedReferenceList {
    /// Parsed entries, Chinese first, then Latin by surname and year.
    pub references: Vec<NormalizedReference>,
    /// Entries without a usable year or author, in input order.
    pub failed: Vec<FailedReference>,
    /// Entries produced by segmentation.
    pub raw_count: usize,
    /// Entries left after cleaning dropped empty ones.
    pub clean_count: usize,
    /// Entries that received an automatic year suffix.
    pub auto_suffixed: usize,
}

impl NormalizedReferenceList {
    /// One entry per line, failed entries after the sorted ones.
    pub fn formatted(&self) -> String {
        self.references
            .iter()
            .map(|r| r.text.as_str())
            .chain(self.failed.iter().map(|f| f.text.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

struct Entry {
    item: ReferenceItem,
    key: IdentityKey,
    base_year: String,
    suffix: Option<char>,
    auto_suffixed: bool,
}

impl Entry {
    fn new(item: ReferenceItem) -> Self {
        let (base_year, suffix) = split_year_suffix(&item.year);
        Self {
            key: IdentityKey::for_reference(&item),
            item,
            base_year,
            suffix,
            auto_suffixed: false,
        }
    }

    fn assign_suffix(&mut self, letter: char) {
        if let Some(marker) = find_year_marker(&self.item.raw)
            && let Some(offset) = self.item.raw[marker.start..marker.end].find(self.base_year.as_str())
        {
            let at = marker.start + offset + self.base_year.len();
            self.item.raw.insert(at, letter);
        }
        self.item.year = format!("{}{}", self.base_year, letter);
        self.key = IdentityKey::for_reference(&self.item);
        self.suffix = Some(letter);
        self.auto_suffixed = true;
    }

    fn finish(self) -> NormalizedReference {
        NormalizedReference {
            key: self.key.key_string(),
            text: self.item.raw,
            language: self.item.language,
            year: self.item.year,
            auto_suffixed: self.auto_suffixed,
        }
    }
}

fn is_four_digit_year(year: &str) -> bool {
    year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit())
}

/// `2020a` → (`2020`, `a`); anything else has no suffix.
fn split_year_suffix(year: &str) -> (String, Option<char>) {
    let mut chars = year.chars();
    match chars.next_back() {
        Some(c) if c.is_ascii_lowercase() && is_four_digit_year(chars.as_str()) => (chars.as_str().to_string(), Some(c)),
        _ => (year.to_string(), None),
    }
}

/// Collapse whitespace and tidy punctuation spacing and number ranges.
fn clean_entry(entry: &str) -> String {
    let text = normalize_text(entry).split_whitespace().collect::<Vec<_>>().join(" ");
    let text = SPACE_BEFORE_PUNCT_RE.replace_all(&text, "$1");
    let text = COMMA_SPACING_RE.replace_all(&text, ", ");
    NUMBER_RANGE_RE.replace_all(&text, "$1-$2").trim().to_string()
}

fn language_rank(language: Language) -> u8 {
    match language {
        Language::Chinese => 0,
        Language::Latin => 1,
    }
}

/// Undated entries first, then years ascending, then in-press entries.
fn year_rank(base_year: &str) -> (u8, &str) {
    if base_year.starts_with("n.d.") {
        (0, base_year)
    } else if is_four_digit_year(base_year) {
        (1, base_year)
    } else if base_year == "in press" {
        (2, base_year)
    } else {
        (3, base_year)
    }
}

fn title_key(item: &ReferenceItem) -> String {
    item.title
        .as_deref()
        .unwrap_or_default()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

fn compare(a: &Entry, b: &Entry) -> Ordering {
    language_rank(a.key.language)
        .cmp(&language_rank(b.key.language))
        .then_with(|| a.key.author1.cmp(&b.key.author1))
        .then_with(|| a.key.author2.cmp(&b.key.author2))
        .then_with(|| year_rank(&a.base_year).cmp(&year_rank(&b.base_year)))
        .then_with(|| a.suffix.cmp(&b.suffix))
        .then_with(|| title_key(&a.item).cmp(&title_key(&b.item)))
        .then_with(|| a.item.index.cmp(&b.item.index))
}

/// Give unsuffixed entries sharing language, first author and year the free
/// letters `a`..`z`, in sort order. Returns how many were assigned.
fn assign_suffixes(entries: &mut [Entry]) -> usize {
    let mut groups: HashMap<(Language, &str, &str), Vec<usize>> = HashMap::new();
    for (pos, entry) in entries.iter().enumerate() {
        if is_four_digit_year(&entry.base_year) {
            groups
                .entry((entry.key.language, entry.key.author1.as_str(), entry.base_year.as_str()))
                .or_default()
                .push(pos);
        }
    }
    let groups: Vec<Vec<usize>> = groups.into_values().filter(|members| members.len() > 1).collect();

    let mut assigned = 0;
    for members in groups {
        let used: HashSet<char> = members.iter().filter_map(|&pos| entries[pos].suffix).collect();
        let mut free = ('a'..='z').filter(|c| !used.contains(c));
        for pos in members {
            if entries[pos].suffix.is_some() {
                continue;
            }
            let Some(letter) = free.next() else { break };
            tracing::trace!(entry = pos, %letter, "auto suffix");
            entries[pos].assign_suffix(letter);
            assigned += 1;
        }
    }
    assigned
}

/// Clean, disambiguate and sort a raw reference list.
pub fn normalize_references(raw: &str) -> NormalizedReferenceList {
    normalize_references_with_config(raw, &ParsingConfig::default())
}

pub(crate) fn normalize_references_with_config(raw: &str, config: &ParsingConfig) -> NormalizedReferenceList {
    let segmented = segment_entries_with_config(raw, config);
    let raw_count = segmented.len();
    let cleaned: Vec<String> = segmented
        .iter()
        .map(|e| clean_entry(&e.text))
        .filter(|t| !t.is_empty())
        .collect();

    let mut entries = Vec::new();
    let mut failed = Vec::new();
    for (ordinal, text) in cleaned.iter().enumerate() {
        match parse_reference(text, ordinal, 0) {
            Some(item) => entries.push(Entry::new(item)),
            None => {
                let reason = if find_year_marker(text).is_none() {
                    FailureReason::YearMissing
                } else {
                    FailureReason::AuthorMissing
                };
                tracing::debug!(ordinal, reason = reason.as_str(), "reference entry left unsorted");
                failed.push(FailedReference {
                    ordinal,
                    text: text.clone(),
                    reason,
                });
            }
        }
    }

    entries.sort_by(compare);
    let auto_suffixed = assign_suffixes(&mut entries);
    entries.sort_by(compare);

    tracing::debug!(
        raw = raw_count,
        clean = cleaned.len(),
        failed = failed.len(),
        auto_suffixed,
        "reference list normalized"
    );
    NormalizedReferenceList {
        references: entries.into_iter().map(Entry::finish).collect(),
        failed,
        raw_count,
        clean_count: cleaned.len(),
        auto_suffixed,
    }
}
