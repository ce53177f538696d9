use std::collections::{HashMap, HashSet};

use crate::keys::{IdentityKey, normalize_year};
use crate::text_utils::{normalize_text, strip_accents, truncate_chars};
use crate::{
    AmbiguousKey, InTextCitation, Language, MatchOutcome, MatchType, MatchedCitation, Paragraph,
    ReferenceItem,
};

/// Minimum normalized similarity for two co-author names to count as the same person.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;

const PREVIEW_CHARS: usize = 120;

/// Which strategies of the cascade are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Exact key lookup, raw-text fallback, then context recovery.
    #[default]
    PageAware,
    /// Exact key lookup only. Used for pasted text without page context.
    KeyOnly,
}

#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub mode: MatchMode,
    pub similarity_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            mode: MatchMode::PageAware,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Fuzzy name comparison.
///
/// Names of four characters or fewer must match exactly (case-insensitive);
/// longer names are compared accent-stripped and lower-cased by normalized
/// Indel similarity.
pub fn names_similar(a: &str, b: &str, threshold: f64) -> bool {
    let a = a.trim();
    let b = b.trim();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.chars().count() <= 4 || b.chars().count() <= 4 {
        return a.to_lowercase() == b.to_lowercase();
    }
    let norm_a = strip_accents(a).to_lowercase();
    let norm_b = strip_accents(b).to_lowercase();
    rapidfuzz::fuzz::ratio(norm_a.chars(), norm_b.chars()) >= threshold
}

type PrimaryKey = (Language, String, String);

/// Lookup structures over one reference list.
struct ReferenceIndex<'a> {
    references: &'a [ReferenceItem],
    keys: Vec<IdentityKey>,
    exact: HashMap<PrimaryKey, Vec<usize>>,
    by_year: HashMap<String, Vec<usize>>,
}

impl<'a> ReferenceIndex<'a> {
    fn build(references: &'a [ReferenceItem]) -> Self {
        let keys: Vec<IdentityKey> = references.iter().map(IdentityKey::for_reference).collect();
        let mut exact: HashMap<PrimaryKey, Vec<usize>> = HashMap::new();
        let mut by_year: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, key) in keys.iter().enumerate() {
            exact.entry(key.primary()).or_default().push(pos);
            by_year.entry(key.year.clone()).or_default().push(pos);
        }
        Self {
            references,
            keys,
            exact,
            by_year,
        }
    }
}

/// Joins in-text citations against a parsed reference list.
///
/// The same matcher serves both the document check ([`MatchMode::PageAware`])
/// and the free-text check ([`MatchMode::KeyOnly`]), so both surfaces share one
/// normalization and one notion of ambiguity.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn key_only() -> Self {
        Self::new(MatcherConfig {
            mode: MatchMode::KeyOnly,
            ..MatcherConfig::default()
        })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Classify every citation as matched or missing and every reference as
    /// claimed or uncited.
    ///
    /// `raw_reference_text` is the unsegmented reference section; it backs the
    /// raw-text fallback when segmentation lost an entry.
    pub fn match_citations(
        &self,
        citations: &[InTextCitation],
        references: &[ReferenceItem],
        raw_reference_text: &[Paragraph],
    ) -> MatchOutcome {
        let index = ReferenceIndex::build(references);
        let section_text = normalize_text(
            &raw_reference_text
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        )
        .to_lowercase();

        let mut claimed: HashSet<usize> = HashSet::new();
        let mut reported_ambiguous: HashSet<PrimaryKey> = HashSet::new();
        let mut outcome = MatchOutcome::default();

        for citation in citations {
            let key = IdentityKey::for_citation(citation);

            if let Some(candidates) = index.exact.get(&key.primary()) {
                claimed.extend(candidates.iter().copied());
                if candidates.len() > 1 && reported_ambiguous.insert(key.primary()) {
                    outcome.ambiguous.push(ambiguous_entry(&key, candidates, references));
                }
                outcome.matched.push(MatchedCitation {
                    citation: citation.clone(),
                    reference: Some(references[candidates[0]].clone()),
                    match_type: MatchType::Exact,
                });
                continue;
            }

            if self.config.mode == MatchMode::KeyOnly {
                outcome.missing.push(citation.clone());
                continue;
            }

            if raw_text_contains(&section_text, citation) {
                outcome.matched.push(MatchedCitation {
                    citation: citation.clone(),
                    reference: None,
                    match_type: MatchType::RawTextFallback,
                });
                continue;
            }

            match self.recover_from_context(&index, citation, &key) {
                Some(pos) => {
                    claimed.insert(pos);
                    outcome.matched.push(MatchedCitation {
                        citation: citation.clone(),
                        reference: Some(references[pos].clone()),
                        match_type: MatchType::ContextRecovery,
                    });
                }
                None => outcome.missing.push(citation.clone()),
            }
        }

        outcome.uncited = references
            .iter()
            .enumerate()
            .filter(|(pos, _)| !claimed.contains(pos))
            .map(|(_, r)| r.clone())
            .collect();

        tracing::debug!(
            mode = ?self.config.mode,
            citations = citations.len(),
            references = references.len(),
            matched = outcome.matched.len(),
            missing = outcome.missing.len(),
            uncited = outcome.uncited.len(),
            ambiguous = outcome.ambiguous.len(),
            "matching complete"
        );
        outcome
    }

    /// Same year and language, a corroborating author signal, then the
    /// candidate's first author must appear in the citation's context.
    fn recover_from_context(
        &self,
        index: &ReferenceIndex<'_>,
        citation: &InTextCitation,
        key: &IdentityKey,
    ) -> Option<usize> {
        let candidates = index.by_year.get(&key.year)?;
        let cited_author = citation.author1.trim().to_lowercase();
        let context = strip_accents(&normalize_text(&citation.context)).to_lowercase();
        let context_spaced = context.replace('-', " ");

        candidates.iter().copied().find(|&pos| {
            let reference = &index.references[pos];
            let ref_key = &index.keys[pos];
            if reference.language != citation.language || ref_key.author1.is_empty() {
                return false;
            }

            let coauthor_agrees = match (&key.author2, &ref_key.author2) {
                (Some(a), Some(b)) => {
                    a == b || names_similar(a, b, self.config.similarity_threshold)
                }
                _ => false,
            };
            let author_in_entry =
                !cited_author.is_empty() && reference.raw.to_lowercase().contains(&cited_author);
            if !coauthor_agrees && !author_in_entry {
                return false;
            }

            let spaced = ref_key.author1.replace('-', " ");
            context.contains(&ref_key.author1) || context_spaced.contains(&spaced)
        })
    }
}

/// The section text mentions both the cited author and the cited year.
fn raw_text_contains(section_text: &str, citation: &InTextCitation) -> bool {
    let author = citation.author1.trim().to_lowercase();
    if author.chars().count() < 2 {
        return false;
    }
    let year = normalize_year(&citation.year);
    if year.is_empty() || !year_spellings(&year).iter().any(|form| section_text.contains(form.as_str())) {
        return false;
    }
    section_text.contains(&author) || section_text.contains(&author.replace('-', " "))
}

/// Spellings a reference list may use for a canonical year token.
fn year_spellings(year: &str) -> Vec<String> {
    let (base, suffix) = match year.strip_prefix("n.d.") {
        Some(suffix) => ("n.d.", suffix),
        None => (year, ""),
    };
    let written: &[&str] = match base {
        "in press" => &["in press", "inpress", "印刷中", "未刊"],
        "n.d." => &["n.d.", "n. d.", "no date"],
        _ => return vec![year.to_string()],
    };
    written.iter().map(|form| format!("{form}{suffix}")).collect()
}

fn ambiguous_entry(key: &IdentityKey, candidates: &[usize], references: &[ReferenceItem]) -> AmbiguousKey {
    AmbiguousKey {
        key: key.key_string(),
        candidates: candidates.iter().map(|&pos| references[pos].index).collect(),
        previews: candidates
            .iter()
            .map(|&pos| truncate_chars(&references[pos].raw, PREVIEW_CHARS))
            .collect(),
    }
}
