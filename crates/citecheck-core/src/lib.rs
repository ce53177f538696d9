use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod config_file;
pub mod keys;
pub mod matching;
pub mod text_utils;

// Re-export for convenience
pub use cache::{BoundedCache, CacheKey, DEFAULT_CACHE_CAPACITY, ENGINE_VERSION, NoCache, ResultCache};
pub use keys::IdentityKey;
pub use matching::{DEFAULT_SIMILARITY_THRESHOLD, MatchMode, Matcher, MatcherConfig};
pub use text_utils::normalize_text;

/// Script family of an author name, decided once per reference or citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    Latin,
    #[serde(rename = "zh")]
    Chinese,
}

impl Language {
    /// Any Latin letter in `text` makes it Latin; everything else is treated as Chinese.
    pub fn detect(text: &str) -> Self {
        if text.chars().any(text_utils::is_latin_letter) {
            Language::Latin
        } else {
            Language::Chinese
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Latin => "en",
            Language::Chinese => "zh",
        }
    }
}

/// One paragraph (or line) of document text with its 1-based page.
/// Page 0 means the text carries no page context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    #[serde(default)]
    pub page: u32,
}

impl Paragraph {
    pub fn new(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page,
        }
    }
}

/// A parsed entry of the reference list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceItem {
    pub language: Language,
    pub author1: String,
    pub author2: Option<String>,
    /// Normalized year token: `2020`, `2020a`, `n.d.` or `in press`.
    pub year: String,
    pub raw: String,
    /// Position among the retained entries, in document order.
    pub index: usize,
    pub page: u32,
    pub title: Option<String>,
    pub source: Option<String>,
}

/// Which extraction strategy produced a citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStyle {
    /// Author outside the parentheses: `Smith (2020)`.
    Narrative,
    /// Author inside the parentheses: `(Smith, 2020)`.
    Parenthetical,
    /// Found by searching parenthesized spans for known reference authors.
    Recovered,
}

/// One occurrence of a citation in the document body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InTextCitation {
    pub language: Language,
    pub author1: String,
    pub author2: Option<String>,
    /// Normalized year token, e.g. `2020`, `2020a`, `n.d.`, `in press`.
    pub year: String,
    /// The matched citation text.
    pub raw: String,
    /// Index of the first source paragraph of the merged run the citation was found in.
    pub paragraph: usize,
    pub context: String,
    pub page: u32,
    pub style: CitationStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    RawTextFallback,
    ContextRecovery,
}

/// A citation paired with the reference it resolved to.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedCitation {
    pub citation: InTextCitation,
    /// `None` when the raw-text fallback found the author and year somewhere
    /// in the reference section without pinning a specific entry.
    pub reference: Option<ReferenceItem>,
    pub match_type: MatchType,
}

impl MatchedCitation {
    /// Page of the matched reference, 0 when no specific entry was matched.
    pub fn reference_page(&self) -> u32 {
        self.reference.as_ref().map_or(0, |r| r.page)
    }
}

/// An identity key claimed by more than one reference entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousKey {
    pub key: String,
    /// `ReferenceItem::index` of every candidate.
    pub candidates: Vec<usize>,
    /// Raw text of every candidate, truncated for display.
    pub previews: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedCitation>,
    pub missing: Vec<InTextCitation>,
    pub uncited: Vec<ReferenceItem>,
    pub ambiguous: Vec<AmbiguousKey>,
}

/// A segmented reference entry without a detectable year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    /// Position of the entry in the segmenter output.
    pub ordinal: usize,
    pub text: String,
}

/// Statistics about reference entries dropped during parsing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseStats {
    pub total_segments: usize,
    pub parsed: usize,
    pub failures: Vec<ParseFailure>,
}

/// Result of extracting references from a reference section.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub references: Vec<ReferenceItem>,
    pub stats: ParseStats,
}

/// Where the reference list used for matching came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    AutoExtracted,
    UserOverride,
}

/// Caller-supplied reference list that replaces the auto-extracted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceOverride {
    /// A raw blob to be segmented.
    Text(String),
    /// Pre-split entries, one per element.
    Items(Vec<String>),
}

impl ReferenceOverride {
    /// True when the override carries no non-whitespace text.
    /// An item list counts as a request even when empty; text only when non-blank.
    pub fn is_requested(&self) -> bool {
        match self {
            ReferenceOverride::Text(t) => !t.trim().is_empty(),
            ReferenceOverride::Items(_) => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OverrideMetadata {
    pub reference_source: ReferenceSource,
    pub override_requested: bool,
    pub override_items: usize,
    pub override_parse_failures: usize,
    pub warning: Option<String>,
}

impl Default for OverrideMetadata {
    fn default() -> Self {
        Self {
            reference_source: ReferenceSource::AutoExtracted,
            override_requested: false,
            override_items: 0,
            override_parse_failures: 0,
            warning: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub body_paragraphs: usize,
    pub reference_items: usize,
    pub citations: usize,
    pub matched: usize,
    pub missing: usize,
    pub uncited: usize,
}

/// Full result of checking one document.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub summary: AnalysisSummary,
    pub outcome: MatchOutcome,
    pub parse_stats: ParseStats,
    pub metadata: OverrideMetadata,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("no reference section heading found; supply a reference list override")]
    SectionNotFound,
    #[error("unsupported input type: {0}")]
    UnsupportedInputType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detect() {
        assert_eq!(Language::detect("Smith, J."), Language::Latin);
        assert_eq!(Language::detect("Müller"), Language::Latin);
        assert_eq!(Language::detect("王小明、李大華"), Language::Chinese);
        assert_eq!(Language::detect("王小明 2020 Smith"), Language::Latin);
    }

    #[test]
    fn test_override_request() {
        assert!(!ReferenceOverride::Text("  \n ".into()).is_requested());
        assert!(ReferenceOverride::Text("Smith, J. (2020).".into()).is_requested());
        assert!(ReferenceOverride::Items(vec![" ".into(), String::new()]).is_requested());
        assert!(ReferenceOverride::Items(Vec::new()).is_requested());
    }

    #[test]
    fn test_reference_page_without_entry() {
        let citation = InTextCitation {
            language: Language::Latin,
            author1: "Smith".into(),
            author2: None,
            year: "2020".into(),
            raw: "Smith (2020)".into(),
            paragraph: 0,
            context: "...Smith (2020)...".into(),
            page: 3,
            style: CitationStyle::Narrative,
        };
        let row = MatchedCitation {
            citation,
            reference: None,
            match_type: MatchType::RawTextFallback,
        };
        assert_eq!(row.reference_page(), 0);
    }
}
