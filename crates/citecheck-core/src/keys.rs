use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::text_utils::strip_accents;
use crate::{InTextCitation, Language, ReferenceItem};

static TRAILING_INITIAL_DOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[A-Za-z\u{00C0}-\u{00FF}]\.").unwrap());
static TRAILING_INITIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[A-Za-z\u{00C0}-\u{00FF}]$").unwrap());
static MASHED_INITIALS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])[A-Z]{1,3}$").unwrap());
static FOUR_DIGIT_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[12]\d{3}").unwrap());
static YEAR_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[12]\d{3}[- ]?([a-z])$").unwrap());
static NO_DATE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"d\.?[- ]([a-z])$").unwrap());

/// Canonical form of a Latin-script surname.
///
/// Keeps the part before the first comma, drops trailing initials (`Smith J.`,
/// `Smith J`, `SmithJK`), strips accents and periods, lower-cases and collapses
/// whitespace.
pub fn normalize_latin_surname(name: &str) -> String {
    let surname = name.split(',').next().unwrap_or_default().trim();
    let surname = TRAILING_INITIAL_DOT_RE.replace_all(surname, "");
    let surname = TRAILING_INITIAL_RE.replace(&surname, "");
    let surname = MASHED_INITIALS_RE.replace(&surname, "$1");
    let folded = strip_accents(&surname).to_lowercase().replace('.', "");
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of a Chinese-script name: all whitespace removed.
pub fn normalize_chinese_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn normalize_author(language: Language, name: &str) -> String {
    match language {
        Language::Latin => normalize_latin_surname(name),
        Language::Chinese => normalize_chinese_name(name),
    }
}

/// Canonical year token.
///
/// `n.d.` / `no date` → `n.d.`, in-press tokens → `in press`, otherwise the
/// first four-digit year plus a single-letter suffix written directly after it.
/// Suffixes are preserved so `2020a` and `2020b` stay distinct.
pub fn normalize_year(year: &str) -> String {
    let lowered = year.trim().to_lowercase();
    let compact: String = lowered.chars().filter(|c| !c.is_whitespace()).collect();

    let base = if compact.starts_with("n.d") || compact.starts_with("nd") || compact.contains("nodate")
    {
        "n.d.".to_string()
    } else if compact.contains("press") || compact.contains("印刷") || compact.contains("未刊") {
        return "in press".to_string();
    } else if let Some(m) = FOUR_DIGIT_YEAR_RE.find(&lowered) {
        m.as_str().to_string()
    } else {
        return lowered;
    };

    let suffix = if base == "n.d." {
        NO_DATE_SUFFIX_RE.captures(&lowered)
    } else {
        YEAR_SUFFIX_RE.captures(&lowered)
    };
    match suffix {
        Some(caps) => format!("{}{}", base, &caps[1]),
        None => base,
    }
}

/// Comparable identity of a reference or citation. Never stored; recomputed
/// from the item whenever needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IdentityKey {
    pub language: Language,
    pub author1: String,
    pub author2: Option<String>,
    pub year: String,
}

impl IdentityKey {
    pub fn new(language: Language, author1: &str, author2: Option<&str>, year: &str) -> Self {
        Self {
            language,
            author1: normalize_author(language, author1),
            author2: author2
                .map(|a| normalize_author(language, a))
                .filter(|a| !a.is_empty()),
            year: normalize_year(year),
        }
    }

    pub fn for_reference(item: &ReferenceItem) -> Self {
        Self::new(item.language, &item.author1, item.author2.as_deref(), &item.year)
    }

    pub fn for_citation(citation: &InTextCitation) -> Self {
        Self::new(
            citation.language,
            &citation.author1,
            citation.author2.as_deref(),
            &citation.year,
        )
    }

    /// The exact-match lookup key: (language, first author, year).
    pub fn primary(&self) -> (Language, String, String) {
        (self.language, self.author1.clone(), self.year.clone())
    }

    /// Compact `surname_year` form, e.g. `dimaggio_1983`, `smith_nd`, `lee_inpress`.
    pub fn key_string(&self) -> String {
        let author: String = self.author1.chars().filter(|c| c.is_alphanumeric()).collect();
        let year: String = self.year.chars().filter(|c| c.is_alphanumeric()).collect();
        format!("{}_{}", author, year)
    }
}
