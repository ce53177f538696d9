use std::collections::{BTreeMap, BTreeSet};

use citecheck_core::{AmbiguousKey, IdentityKey, Matcher, Paragraph};
use serde::Serialize;

use crate::citations::extract_citations;
use crate::reference::parse_reference;
use crate::segment::segment;

/// Key-level comparison of pasted body text against a pasted reference list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FreeTextReport {
    /// Cited keys with exactly one reference entry.
    pub matched: Vec<String>,
    /// Cited keys with no reference entry.
    pub missing: Vec<String>,
    /// Reference keys nobody cites.
    pub extra: Vec<String>,
    /// Cited keys shared by several reference entries.
    pub ambiguous: Vec<AmbiguousKey>,
}

/// Compare citations in `body_text` with the entries of `reference_text`.
///
/// Works on identity keys only: no pages, no raw-text fallback, no context
/// recovery. Every list is sorted by key.
pub fn check_text(body_text: &str, reference_text: &str) -> FreeTextReport {
    let references: Vec<_> = segment(reference_text)
        .iter()
        .enumerate()
        .filter_map(|(ordinal, entry)| parse_reference(entry, ordinal, 0))
        .collect();
    let body: Vec<Paragraph> = body_text.lines().map(|line| Paragraph::new(line, 0)).collect();
    let citations = extract_citations(&body, None);

    let outcome = Matcher::key_only().match_citations(&citations, &references, &[]);

    let ambiguous: BTreeMap<String, AmbiguousKey> =
        outcome.ambiguous.into_iter().map(|a| (a.key.clone(), a)).collect();
    let cited: BTreeSet<String> = outcome
        .matched
        .iter()
        .map(|m| IdentityKey::for_citation(&m.citation).key_string())
        .filter(|k| !ambiguous.contains_key(k))
        .collect();
    let missing: BTreeSet<String> = outcome
        .missing
        .iter()
        .map(|c| IdentityKey::for_citation(c).key_string())
        .collect();
    let extra: BTreeSet<String> = outcome
        .uncited
        .iter()
        .map(|r| IdentityKey::for_reference(r).key_string())
        .filter(|k| !cited.contains(k) && !ambiguous.contains_key(k))
        .collect();

    tracing::debug!(
        references = references.len(),
        citations = citations.len(),
        matched = cited.len(),
        missing = missing.len(),
        extra = extra.len(),
        ambiguous = ambiguous.len(),
        "free-text check complete"
    );

    FreeTextReport {
        matched: cited.into_iter().collect(),
        missing: missing.into_iter().collect(),
        extra: extra.into_iter().collect(),
        ambiguous: ambiguous.into_values().collect(),
    }
}
