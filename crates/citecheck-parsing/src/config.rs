use regex::Regex;

/// Headings that open the reference section, compared case-insensitively.
pub const DEFAULT_REFERENCE_HEADINGS: &[&str] = &[
    "參考文獻",
    "参考文献",
    "參考資料",
    "references",
    "reference",
    "bibliography",
    "works cited",
    "literature cited",
];

/// Headings after the reference list that end it.
pub const DEFAULT_TAIL_HEADINGS: &[&str] = &[
    "技術手冊、準則與報告",
    "technical manuals, standards and reports",
    "technical manuals, standards & reports",
];

pub const DEFAULT_CONTEXT_WINDOW: usize = 50;
pub const DEFAULT_MERGE_LINE_CAP: usize = 10;
pub const DEFAULT_RELAXED_ANCHOR_SPAN: usize = 220;

/// Controls how a list of values is overridden from its defaults.
#[derive(Debug, Clone, Default)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    /// Resolve this override against the given defaults.
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }
}

/// Configuration for section detection, segmentation and citation extraction.
///
/// Regex fields are `Option<Regex>`; `None` means "use the built-in default".
/// Use [`ParsingConfigBuilder`] to construct with string patterns.
#[derive(Debug, Clone)]
pub struct ParsingConfig {
    // ── section.rs ──
    pub(crate) reference_headings: ListOverride<String>,
    pub(crate) tail_headings: ListOverride<String>,
    /// Extra pattern a whole line may match to count as a reference heading.
    pub(crate) section_header_re: Option<Regex>,
    /// Extra pattern a line may match to end the reference list.
    pub(crate) section_end_re: Option<Regex>,

    // ── segment.rs ──
    /// Relaxed "Surname, ... (year)" anchor with a non-default span.
    pub(crate) relaxed_anchor_re: Option<Regex>,

    // ── citations.rs ──
    /// Characters of context kept on each side of a citation.
    pub(crate) context_window: usize,
    /// Maximum lines merged into one body paragraph.
    pub(crate) merge_line_cap: usize,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            reference_headings: ListOverride::Default,
            tail_headings: ListOverride::Default,
            section_header_re: None,
            section_end_re: None,
            relaxed_anchor_re: None,
            context_window: DEFAULT_CONTEXT_WINDOW,
            merge_line_cap: DEFAULT_MERGE_LINE_CAP,
        }
    }
}

fn owned_defaults(defaults: &[&str]) -> Vec<String> {
    defaults.iter().map(|s| s.to_string()).collect()
}

impl ParsingConfig {
    /// Resolved reference headings, lower-cased.
    pub fn reference_headings(&self) -> Vec<String> {
        self.reference_headings
            .resolve(&owned_defaults(DEFAULT_REFERENCE_HEADINGS))
            .into_iter()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect()
    }

    /// Resolved tail headings, lower-cased.
    pub fn tail_headings(&self) -> Vec<String> {
        self.tail_headings
            .resolve(&owned_defaults(DEFAULT_TAIL_HEADINGS))
            .into_iter()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect()
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }

    pub fn merge_line_cap(&self) -> usize {
        self.merge_line_cap
    }
}

/// Builder for [`ParsingConfig`].
///
/// Accepts string patterns that are compiled to `Regex` in [`build()`](Self::build).
/// Fails fast with `regex::Error` if any pattern is invalid.
#[derive(Debug, Clone, Default)]
pub struct ParsingConfigBuilder {
    reference_headings: ListOverride<String>,
    tail_headings: ListOverride<String>,
    section_header_re: Option<String>,
    section_end_re: Option<String>,
    relaxed_anchor_span: Option<usize>,
    context_window: Option<usize>,
    merge_line_cap: Option<usize>,
}

impl ParsingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Headings ──

    pub fn set_reference_headings(mut self, headings: Vec<String>) -> Self {
        self.reference_headings = ListOverride::Replace(headings);
        self
    }

    pub fn add_reference_heading(mut self, heading: String) -> Self {
        match &mut self.reference_headings {
            ListOverride::Extend(v) | ListOverride::Replace(v) => v.push(heading),
            ListOverride::Default => self.reference_headings = ListOverride::Extend(vec![heading]),
        }
        self
    }

    pub fn set_tail_headings(mut self, headings: Vec<String>) -> Self {
        self.tail_headings = ListOverride::Replace(headings);
        self
    }

    pub fn add_tail_heading(mut self, heading: String) -> Self {
        match &mut self.tail_headings {
            ListOverride::Extend(v) | ListOverride::Replace(v) => v.push(heading),
            ListOverride::Default => self.tail_headings = ListOverride::Extend(vec![heading]),
        }
        self
    }

    pub fn section_header_regex(mut self, pattern: &str) -> Self {
        self.section_header_re = Some(pattern.to_string());
        self
    }

    pub fn section_end_regex(mut self, pattern: &str) -> Self {
        self.section_end_re = Some(pattern.to_string());
        self
    }

    // ── Scalars ──

    pub fn relaxed_anchor_span(mut self, chars: usize) -> Self {
        self.relaxed_anchor_span = Some(chars);
        self
    }

    pub fn context_window(mut self, chars: usize) -> Self {
        self.context_window = Some(chars);
        self
    }

    pub fn merge_line_cap(mut self, lines: usize) -> Self {
        self.merge_line_cap = Some(lines);
        self
    }

    /// Compile all string patterns into regexes and produce a [`ParsingConfig`].
    pub fn build(self) -> Result<ParsingConfig, regex::Error> {
        let compile = |opt: Option<String>| -> Result<Option<Regex>, regex::Error> {
            opt.map(|p| Regex::new(&p)).transpose()
        };

        let relaxed_anchor_re = match self.relaxed_anchor_span {
            Some(span) if span != DEFAULT_RELAXED_ANCHOR_SPAN => {
                Some(Regex::new(&crate::segment::relaxed_anchor_pattern(span))?)
            }
            _ => None,
        };

        Ok(ParsingConfig {
            reference_headings: self.reference_headings,
            tail_headings: self.tail_headings,
            section_header_re: compile(self.section_header_re)?,
            section_end_re: compile(self.section_end_re)?,
            relaxed_anchor_re,
            context_window: self.context_window.unwrap_or(DEFAULT_CONTEXT_WINDOW),
            merge_line_cap: self.merge_line_cap.unwrap_or(DEFAULT_MERGE_LINE_CAP).max(1),
        })
    }
}
