//! Named rules deciding whether a reference-list line starts a new entry.
//!
//! Continuation rules are checked first and force the next line into the
//! current entry; entry-start rules are checked next and open a new entry.
//! A line no rule claims is appended. Each rule is an independently testable
//! `(name, predicate)` pair so a mis-split can be traced to the rule that fired.

use citecheck_core::text_utils::paren_balance;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::patterns::{AUTHOR_YEAR_OPENING_RE, CJK, LATIN, LATIN_UPPER, PARTICLES, paren_year, surname};

static TRAILING_CONNECTOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:&|\band|,)\s*$").unwrap());

static CAPITALIZED_NEAR_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^[{LATIN_UPPER}{CJK}][^()\n]{{0,100}}{}", paren_year())).unwrap()
});

static SURNAME_INITIAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^{}(?:\s+(?:{PARTICLES}\s+)?[{LATIN_UPPER}][{LATIN}'\-]+){{0,2}},\s+[A-Z]\.",
        surname()
    ))
    .unwrap()
});

static CJK_BARE_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^[{CJK}][^\n]{{0,30}}?[,\s]\s*(?:19|20)\d{{2}}\s*[,.]")).unwrap());

/// A named predicate over `(current entry text, next line)`.
pub struct BoundaryRule {
    pub name: &'static str,
    pub applies: fn(current: &str, next: &str) -> bool,
}

impl std::fmt::Debug for BoundaryRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryRule").field("name", &self.name).finish()
    }
}

/// What to do with the next line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// A continuation rule fired; the line joins the current entry.
    Continue(&'static str),
    /// An entry-start rule fired; the line opens a new entry.
    Split(&'static str),
    /// No rule fired; the line joins the current entry.
    Append,
}

fn trailing_connector(current: &str, _next: &str) -> bool {
    TRAILING_CONNECTOR_RE.is_match(current.trim_end())
}

fn trailing_hyphen(current: &str, _next: &str) -> bool {
    current.trim_end().ends_with('-')
}

fn open_parenthesis(current: &str, _next: &str) -> bool {
    paren_balance(current) > 0
}

fn author_year_opening(_current: &str, next: &str) -> bool {
    AUTHOR_YEAR_OPENING_RE.is_match(next)
}

fn capitalized_opening_near_year(_current: &str, next: &str) -> bool {
    CAPITALIZED_NEAR_YEAR_RE.is_match(next)
}

fn surname_initial_opening(_current: &str, next: &str) -> bool {
    SURNAME_INITIAL_RE.is_match(next)
}

fn cjk_opening_bare_year(_current: &str, next: &str) -> bool {
    CJK_BARE_YEAR_RE.is_match(next)
}

/// Rules that keep the next line in the current entry, in priority order.
pub static CONTINUATION_RULES: &[BoundaryRule] = &[
    BoundaryRule {
        name: "trailing_connector",
        applies: trailing_connector,
    },
    BoundaryRule {
        name: "trailing_hyphen",
        applies: trailing_hyphen,
    },
    BoundaryRule {
        name: "open_parenthesis",
        applies: open_parenthesis,
    },
];

/// Rules that open a new entry, in priority order.
pub static ENTRY_START_RULES: &[BoundaryRule] = &[
    BoundaryRule {
        name: "author_year_opening",
        applies: author_year_opening,
    },
    BoundaryRule {
        name: "capitalized_opening_near_year",
        applies: capitalized_opening_near_year,
    },
    BoundaryRule {
        name: "surname_initial_opening",
        applies: surname_initial_opening,
    },
    BoundaryRule {
        name: "cjk_opening_bare_year",
        applies: cjk_opening_bare_year,
    },
];

/// Decide whether `next` continues `current` or opens a new entry.
pub fn classify(current: &str, next: &str) -> Boundary {
    if let Some(rule) = CONTINUATION_RULES.iter().find(|r| (r.applies)(current, next)) {
        return Boundary::Continue(rule.name);
    }
    match entry_start_rule(next) {
        Some(name) => Boundary::Split(name),
        None => Boundary::Append,
    }
}

/// Name of the first entry-start rule `line` satisfies.
pub fn entry_start_rule(line: &str) -> Option<&'static str> {
    ENTRY_START_RULES
        .iter()
        .find(|r| (r.applies)("", line))
        .map(|r| r.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_rules_win() {
        assert_eq!(
            classify("Smith, J., &", "Jones, K. (2020). Title."),
            Boundary::Continue("trailing_connector")
        );
        assert_eq!(
            classify("Smith, J., Lee, K., and", "Jones, K. (2020)."),
            Boundary::Continue("trailing_connector")
        );
        assert_eq!(
            classify("Smith, J. (2020). Journal, 12, 455-", "Jones, K. (2021)."),
            Boundary::Continue("trailing_hyphen")
        );
        assert_eq!(
            classify("Smith, J. (2020). Title (Vol.", "Lee, K. (2019) edition)."),
            Boundary::Continue("open_parenthesis")
        );
    }

    #[test]
    fn test_entry_start_rules() {
        assert_eq!(
            classify("Smith, J. (2020). Title.", "Jones, K. (2021). Other."),
            Boundary::Split("author_year_opening")
        );
        assert_eq!(
            classify("Smith, J. (2020). Title.", "Hummel, K., & Schlick, C. (2016)."),
            Boundary::Split("capitalized_opening_near_year")
        );
        assert_eq!(
            classify("Smith, J. (2020). Title.", "World Bank, A. Report on growth."),
            Boundary::Split("surname_initial_opening")
        );
        assert_eq!(
            classify("王小明, 2019, 標題。", "李大華, 2020, 另一篇研究。"),
            Boundary::Split("cjk_opening_bare_year")
        );
    }

    #[test]
    fn test_wrapped_lines_append() {
        assert_eq!(
            classify("Hummel, K., & Schlick, C. (2016).", "The relationship between sustainability"),
            Boundary::Append
        );
        assert_eq!(
            classify("The relationship between sustainability", "Policy, 35, 455-476."),
            Boundary::Append
        );
        assert_eq!(classify("王小明(2020)。企業社會責任", "與公司治理。管理學報。"), Boundary::Append);
    }

    #[test]
    fn test_rule_names_unique() {
        let mut names: Vec<&str> = CONTINUATION_RULES
            .iter()
            .chain(ENTRY_START_RULES.iter())
            .map(|r| r.name)
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
