//! Regex fragments shared by the segmenter, the reference parser and the
//! citation extractor.

use once_cell::sync::Lazy;
use regex::Regex;

/// Latin letters, including Latin-1 accented letters.
pub(crate) const LATIN: &str = r"A-Za-z\u{00C0}-\u{00FF}";
/// Upper-case Latin letters, including Latin-1 accented capitals.
pub(crate) const LATIN_UPPER: &str = r"A-Z\u{00C0}-\u{00DE}";
pub(crate) const CJK: &str = r"\u{4e00}-\u{9fff}";

/// Year token inside a parenthesized marker: `2020`, `n.d.`, `in press`, `印刷中`, `未刊`.
pub(crate) const YEAR_TOKEN: &str = r"(?:[12]\d{3}|(?i:n\.?\s?d\.?|no\s*date|in\s*press)|印刷中|未刊)";

/// Lower-case name particles that may precede a capitalized surname.
pub(crate) const PARTICLES: &str = r"(?i:van|von|der|den|de|del|della|di|da|du|dos|la|le|ter)";

/// A capitalized surname token, possibly hyphenated or CamelCase (`DiMaggio`).
pub(crate) fn surname() -> String {
    format!(r"[{LATIN_UPPER}][{LATIN}'\-]+")
}

/// One to four name words where all but the last may be particles: `van der Berg`, `Smith`.
pub(crate) fn surname_phrase() -> String {
    let s = surname();
    format!(r"(?:{PARTICLES}\s+){{0,2}}{s}(?:\s+(?:{PARTICLES}\s+)?{s}){{0,2}}")
}

/// Parenthesized year marker with optional letter suffix.
pub(crate) fn paren_year() -> String {
    format!(r"\(\s*{YEAR_TOKEN}(?:[- ]?[a-z])?\s*\)")
}

/// An entry opening with author tokens or a CJK run directly followed by a parenthesized year.
pub(crate) static AUTHOR_YEAR_OPENING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:{}(?:,\s*[A-Z](?:\.\s?-?[A-Z])*\.)?|[{CJK}]{{1,20}})\s*{}",
        surname_phrase(),
        paren_year()
    ))
    .unwrap()
});

/// A year somewhere in the text, not glued to other digits or letters.
pub(crate) static HAS_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])(?:19|20)\d{2}[a-z]?(?:[^0-9A-Za-z]|$)|\((?i:n\.?\s?d\.?|in\s*press)\)|印刷中|未刊")
        .unwrap()
});

pub(crate) fn has_year(text: &str) -> bool {
    HAS_YEAR_RE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_year_opening() {
        assert!(AUTHOR_YEAR_OPENING_RE.is_match("Smith, J. (2020). Title."));
        assert!(AUTHOR_YEAR_OPENING_RE.is_match("DiMaggio (1983) argued"));
        assert!(AUTHOR_YEAR_OPENING_RE.is_match("van der Berg, K. (2018a). Report."));
        assert!(AUTHOR_YEAR_OPENING_RE.is_match("王小明(2020)。標題。"));
        assert!(AUTHOR_YEAR_OPENING_RE.is_match("Lee, K.-H. (n.d.). Draft."));
        assert!(!AUTHOR_YEAR_OPENING_RE.is_match("Commentary on Jones (2019)."));
        assert!(!AUTHOR_YEAR_OPENING_RE.is_match("The relationship between tax (2016)"));
    }

    #[test]
    fn test_has_year() {
        assert!(has_year("Smith, J. (2020a)."));
        assert!(has_year("王小明, 2019, 標題"));
        assert!(has_year("Lee, K. (n.d.). Draft."));
        assert!(has_year("2020年的研究"));
        assert!(!has_year("pp. 120455-476"));
        assert!(!has_year("Vol. 12, No. 3"));
    }
}
