use std::collections::HashSet;

use citecheck_core::keys::{normalize_author, normalize_year};
use citecheck_core::text_utils::{
    context_window, fix_sticky_year_spacing, is_cjk, is_latin_letter, normalize_text, paren_balance,
};
use citecheck_core::{CitationStyle, InTextCitation, Language, Paragraph, ReferenceItem};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ParsingConfig;
use crate::patterns::{CJK, YEAR_TOKEN, surname_phrase};

/// Year inside a citation: token plus optional letter suffix.
fn cited_year() -> String {
    format!(r"{YEAR_TOKEN}(?:[- ]?[a-zA-Z])?")
}

/// `, p. 12`, `: 12-15`, `, pp. 3-4` after the year.
const PAGE_LOCATOR: &str = r"(?:\s*[,:]\s*(?:pp?\.\s*)?\d+(?:-\d+)?)?";

static LATIN_OUTSIDE_RE: Lazy<Regex> = Lazy::new(|| {
    let name = surname_phrase();
    let initial = r"(?:,\s*[A-Z]\.)?";
    Regex::new(&format!(
        r"^(?P<a1>{name}){initial}(?:(?:\s*,\s*{name}{initial})*\s*,?\s*(?:&|and)\s*(?P<a2>{name}){initial}|\s+et\s+al\.?)?\s*\(\s*(?P<year>{}){PAGE_LOCATOR}\s*\)",
        cited_year()
    ))
    .unwrap()
});

static CHINESE_OUTSIDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<a1>[{CJK}]{{2,4}})(?:(?:、\s*[{CJK}]{{1,10}})*\s*(?:、|&|與|和)\s*(?P<a2>[{CJK}]{{1,10}})|\s*(?:等人|等))?\s*\(\s*(?P<year>{}){PAGE_LOCATOR}\s*\)",
        cited_year()
    ))
    .unwrap()
});

static PAREN_GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^()]{1,240})\)").unwrap());
static GROUP_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"(?:^|[\s,])(?:{YEAR_TOKEN})")).unwrap());
static AUTHOR_YEAR_SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(.+?)[,\s]+({})(?:,|$)", cited_year())).unwrap());
static SEGMENT_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(.+?)[,\s]+({}){PAGE_LOCATOR}$", cited_year())).unwrap());
static SECONDARY_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[、,]").unwrap());
static ET_AL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bet\s+al\.?").unwrap());
static LATIN_CONNECTOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)&|\band\b").unwrap());
static CHINESE_ET_AL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"等人|等").unwrap());
static CHINESE_LIST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[、&與和]").unwrap());
static YEAR_OPENING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"^\s*\(\s*{YEAR_TOKEN}")).unwrap());
static CONNECTOR_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:,|\band|&)\s*$").unwrap());

/// Lead-in words swallowed by the author pattern. Matched case-insensitively;
/// the longest match is stripped.
const LATIN_PREFIXES: &[&str] = &[
    "see also ", "e.g., ", "e.g. ", "i.e., ", "i.e. ", "as ", "see ", "in ", "by ", "cf. ", "cf ", "and ",
    // Sentence openers that are capitalized and so look like a surname.
    "according to ", "building on ", "consistent with ", "contrary to ", "following ", "unlike ", "like ",
    "while ", "whereas ", "although ", "though ", "recently ", "however ", "moreover ", "similarly ",
    "likewise ", "thus ", "hence ", "therefore ", "indeed ", "notably ", "later ", "earlier ", "both ",
    "also ", "when ", "since ", "after ", "before ", "because ", "but ", "yet ", "here ", "then ",
    "for example ", "for instance ", "in contrast ", "in addition ", "in particular ", "unlike in ",
];
const CHINESE_PREFIXES: &[&str] = &["參考", "根據", "採用", "使用", "利用", "由", "如", "見", "以", "與", "及"];
const CHINESE_LEAD_CHARS: &[char] = &['由', '如', '見', '以', '與', '及'];
const CHINESE_LEAD_WORDS: &[&str] = &["參考", "根據", "採用", "使用", "利用"];

fn clean_latin_prefix(name: &str) -> &str {
    let mut name = name.trim();
    loop {
        let lowered = name.to_lowercase();
        let longest = LATIN_PREFIXES
            .iter()
            // byte offsets only line up for ASCII
            .filter(|p| lowered.starts_with(*p) && name.is_char_boundary(p.len()))
            .max_by_key(|p| p.len());
        match longest {
            Some(p) => name = name[p.len()..].trim(),
            None => return name,
        }
    }
}

fn clean_chinese_prefix(name: &str) -> &str {
    CHINESE_PREFIXES
        .iter()
        .find(|p| name.starts_with(*p) && name.chars().count() > p.chars().count() + 1)
        .map_or(name, |p| &name[p.len()..])
}

/// Latin author candidate: at most five words, an upper-case letter, and a real name token.
fn is_valid_latin_author(name: &str) -> bool {
    let words: Vec<&str> = name.split_whitespace().collect();
    !words.is_empty()
        && words.len() <= 5
        && name.chars().any(char::is_uppercase)
        && words
            .iter()
            .any(|w| w.chars().filter(|c| is_latin_letter(*c)).count() >= 2)
}

/// Merge paragraphs split mid-citation by layout.
///
/// A paragraph is joined to the running buffer while the buffer has an open
/// parenthesis, ends with a dash or a connector, or when the paragraph opens
/// with a parenthesized year and the buffer lacks terminal punctuation. At most
/// `merge_line_cap` paragraphs go into one buffer.
pub fn merge_broken_paragraphs(paragraphs: &[Paragraph]) -> Vec<Paragraph> {
    merge_with_origin(paragraphs, ParsingConfig::default().merge_line_cap())
        .into_iter()
        .map(|(_, p)| p)
        .collect()
}

/// Merged paragraphs tagged with the index of their first source paragraph.
fn merge_with_origin(paragraphs: &[Paragraph], cap: usize) -> Vec<(usize, Paragraph)> {
    let mut merged: Vec<(usize, Paragraph)> = Vec::new();
    let mut lines_in_buffer = 0usize;
    let mut balance = 0i32;

    for (idx, p) in paragraphs.iter().enumerate() {
        let text = normalize_text(&p.text);
        if text.is_empty() {
            continue;
        }
        let joinable = match merged.last() {
            Some((_, current)) if lines_in_buffer < cap => {
                let buffer = current.text.trim_end();
                balance > 0
                    || (YEAR_OPENING_RE.is_match(&text)
                        && buffer
                            .chars()
                            .next_back()
                            .is_some_and(|c| !matches!(c, '.' | '?' | '!' | ';' | '？' | '！')))
                    || buffer.ends_with('-')
                    || CONNECTOR_END_RE.is_match(buffer)
            }
            _ => false,
        };

        match merged.last_mut() {
            Some((_, current)) if joinable => {
                join_paragraph(&mut current.text, &text);
                balance += paren_balance(&text);
                lines_in_buffer += 1;
            }
            _ => {
                balance = paren_balance(&text);
                lines_in_buffer = 1;
                merged.push((idx, Paragraph::new(text, p.page)));
            }
        }
    }
    merged
}

fn join_paragraph(buffer: &mut String, next: &str) {
    if buffer.ends_with('-') {
        let before = buffer[..buffer.len() - 1].chars().next_back();
        if before.is_some_and(char::is_alphabetic) && next.chars().next().is_some_and(char::is_lowercase) {
            buffer.pop();
        }
    } else {
        buffer.push(' ');
    }
    buffer.push_str(next);
}

/// Collects the citations of one paragraph and the spans already claimed.
struct ParagraphScan<'a> {
    text: &'a str,
    paragraph: usize,
    page: u32,
    window: usize,
    claimed: Vec<(usize, usize)>,
    found: Vec<InTextCitation>,
}

impl ParagraphScan<'_> {
    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        language: Language,
        author1: &str,
        author2: Option<&str>,
        year: &str,
        raw: &str,
        span: (usize, usize),
        style: CitationStyle,
    ) {
        let author1 = author1.trim();
        if author1.is_empty() {
            return;
        }
        self.found.push(InTextCitation {
            language,
            author1: author1.to_string(),
            author2: author2.map(str::trim).filter(|a| !a.is_empty()).map(str::to_string),
            year: normalize_year(year),
            raw: raw.trim().to_string(),
            paragraph: self.paragraph,
            context: context_window(self.text, span.0, span.1, self.window),
            page: self.page,
            style,
        });
    }

    fn overlaps_claimed(&self, start: usize, end: usize) -> bool {
        self.claimed.iter().any(|&(s, e)| start >= s && end <= e)
    }

    /// `Smith (2020)`, `Smith and Jones (2020)`, `Smith et al. (2020, p. 4)`.
    fn latin_narrative(&mut self) {
        for (start, caps) in scan_anchored(self.text, &LATIN_OUTSIDE_RE, latin_start) {
            let whole = &caps[0];
            let end = start + whole.len();
            let author1 = clean_latin_prefix(caps["a1"].trim());
            if !is_valid_latin_author(author1) {
                continue;
            }
            let author1 = author1.to_string();
            let author2 = (!ET_AL_RE.is_match(whole))
                .then(|| caps.name("a2").map(|m| m.as_str().to_string()))
                .flatten();
            let year = caps["year"].to_string();
            let raw = whole.to_string();
            self.claimed.push((start, end));
            self.push(
                Language::Latin,
                &author1,
                author2.as_deref(),
                &year,
                &raw,
                (start, end),
                CitationStyle::Narrative,
            );
        }
    }

    /// `王小明(2020)`, `王小明與李大華(2020)`, `王小明等人(2020)`.
    fn chinese_narrative(&mut self) {
        for (start, caps) in scan_anchored(self.text, &CHINESE_OUTSIDE_RE, chinese_start) {
            let a1 = &caps["a1"];
            if a1.starts_with(['與', '及']) {
                continue;
            }
            let end = start + caps[0].len();
            let stripped = a1.trim_end_matches("等人").trim_end_matches('等');
            let author1 = clean_chinese_prefix(stripped).to_string();
            let author2 = caps.name("a2").map(|m| m.as_str().to_string());
            let year = caps["year"].to_string();
            let raw = caps[0].to_string();
            self.claimed.push((start, end));
            self.push(
                Language::Chinese,
                &author1,
                author2.as_deref(),
                &year,
                &raw,
                (start, end),
                CitationStyle::Narrative,
            );
        }
    }

    /// Every parenthesized span as a citation list.
    fn parenthetical(&mut self) {
        let text = self.text;
        for group in PAREN_GROUP_RE.captures_iter(text) {
            let (Some(whole), Some(inner)) = (group.get(0), group.get(1)) else {
                continue;
            };
            let span = (whole.start(), whole.end());
            let body = inner.as_str().trim();
            if body.is_empty() {
                continue;
            }
            for segment in split_group(body) {
                let Some(caps) = SEGMENT_YEAR_RE.captures(&segment) else {
                    continue;
                };
                let authors = caps[1].trim();
                let year = caps[2].to_string();
                match Language::detect(authors) {
                    Language::Latin => {
                        let authors = clean_latin_prefix(authors);
                        if !is_valid_latin_author(authors) {
                            continue;
                        }
                        self.claimed.push(span);
                        let (a1, a2) = if ET_AL_RE.is_match(authors) {
                            (authors.split_whitespace().next().unwrap_or(authors), None)
                        } else if LATIN_CONNECTOR_RE.is_match(authors) {
                            let mut parts = LATIN_CONNECTOR_RE.splitn(authors, 2);
                            let first = parts.next().unwrap_or(authors).trim().trim_end_matches(',');
                            (first, parts.next())
                        } else {
                            (authors, None)
                        };
                        self.push(Language::Latin, a1, a2, &year, &segment, span, CitationStyle::Parenthetical);
                    }
                    Language::Chinese => {
                        self.claimed.push(span);
                        if CHINESE_ET_AL_RE.is_match(authors) {
                            let a1 = CHINESE_ET_AL_RE.replace_all(authors, "");
                            self.push(Language::Chinese, &a1, None, &year, &segment, span, CitationStyle::Parenthetical);
                        } else if CHINESE_LIST_RE.is_match(authors) {
                            let listed = CHINESE_LIST_RE.replace_all(authors, " ");
                            let tokens: Vec<&str> = listed.split_whitespace().collect();
                            if let Some(first) = tokens.first() {
                                let second = (tokens.len() > 1).then(|| tokens[tokens.len() - 1]);
                                self.push(
                                    Language::Chinese,
                                    first,
                                    second,
                                    &year,
                                    &segment,
                                    span,
                                    CitationStyle::Parenthetical,
                                );
                            }
                        } else {
                            self.push(Language::Chinese, authors, None, &year, &segment, span, CitationStyle::Parenthetical);
                        }
                    }
                }
            }
        }
    }

    /// Drop leading words of a multi-word Latin author when the remainder is a
    /// known reference surname with the same year and the full phrase is not.
    fn align_with_known(&mut self, known: &[ReferenceItem]) {
        let known_keys: HashSet<(String, String)> = known
            .iter()
            .filter(|r| r.language == Language::Latin)
            .map(|r| (normalize_author(Language::Latin, reference_surname(r)), normalize_year(&r.year)))
            .collect();
        for citation in self.found.iter_mut().filter(|c| c.language == Language::Latin) {
            let year = citation.year.clone();
            let is_known = |name: &str| known_keys.contains(&(normalize_author(Language::Latin, name), year.clone()));
            if is_known(&citation.author1) {
                continue;
            }
            let words: Vec<&str> = citation.author1.split_whitespace().collect();
            let tail = (1..words.len())
                .map(|skip| words[skip..].join(" "))
                .find(|tail| is_known(tail.as_str()));
            if let Some(tail) = tail {
                tracing::trace!(from = %citation.author1, to = %tail, "author aligned to known reference");
                citation.author1 = tail;
            }
        }
    }

    /// Confirm parenthesized parts against surnames of already-known references.
    ///
    /// Only citations of listed works can be found this way.
    fn reverse_search(&mut self, known: &[ReferenceItem]) {
        let text = self.text;
        if !text.contains('(') {
            return;
        }
        for group in PAREN_GROUP_RE.captures_iter(text) {
            let (Some(whole), Some(inner)) = (group.get(0), group.get(1)) else {
                continue;
            };
            let span = (whole.start(), whole.end());
            if self.overlaps_claimed(span.0, span.1) {
                continue;
            }
            let content = inner.as_str();
            let parts: Vec<&str> = if content.contains(';') {
                content.split(';').collect()
            } else {
                content.split(',').collect()
            };
            for part in parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
                for reference in known {
                    let surname = reference_surname(reference);
                    if surname.chars().count() < 2 {
                        continue;
                    }
                    if part.contains(surname) && part.contains(reference.year.as_str()) {
                        tracing::trace!(surname, year = %reference.year, "reverse search hit");
                        self.push(
                            reference.language,
                            surname,
                            None,
                            &reference.year,
                            part,
                            span,
                            CitationStyle::Recovered,
                        );
                    }
                }
            }
        }
    }
}

/// First-author surname as it would appear in body text.
fn reference_surname(reference: &ReferenceItem) -> &str {
    match reference.language {
        Language::Latin => match reference.author1.split_once(',') {
            Some((head, _)) => head.trim(),
            None => reference.author1.split_whitespace().next().unwrap_or_default(),
        },
        Language::Chinese => reference.author1.as_str(),
    }
}

/// Split a parenthesized citation list into `author, year` segments.
fn split_group(body: &str) -> Vec<String> {
    if body.contains(';') {
        return body.split(';').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }
    if GROUP_YEAR_RE.find_iter(body).count() >= 2 {
        let segments: Vec<String> = AUTHOR_YEAR_SEGMENT_RE
            .find_iter(body)
            .map(|m| m.as_str().trim_matches([' ', ',']).to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !segments.is_empty() {
            return segments;
        }
        return SECONDARY_SEPARATOR_RE
            .split(body)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    vec![body.to_string()]
}

/// A Latin author can start here: a letter not preceded by another letter.
fn latin_start(text: &str, idx: usize) -> bool {
    text[idx..].chars().next().is_some_and(is_latin_letter)
        && !text[..idx].chars().next_back().is_some_and(is_latin_letter)
}

/// A Chinese author can start here: after a non-CJK character or a lead-in
/// such as `由` or `根據`.
fn chinese_start(text: &str, idx: usize) -> bool {
    if !text[idx..].chars().next().is_some_and(is_cjk) {
        return false;
    }
    let before = &text[..idx];
    match before.chars().next_back() {
        None => true,
        Some(c) if !is_cjk(c) => true,
        Some(c) => CHINESE_LEAD_CHARS.contains(&c) || CHINESE_LEAD_WORDS.iter().any(|w| before.ends_with(w)),
    }
}

/// Non-overlapping matches of an `^`-anchored regex at the accepted start positions.
fn scan_anchored<'t>(
    text: &'t str,
    re: &Regex,
    accept: fn(&str, usize) -> bool,
) -> Vec<(usize, regex::Captures<'t>)> {
    let mut hits = Vec::new();
    let mut resume = 0usize;
    for (idx, _) in text.char_indices() {
        if idx < resume || !accept(text, idx) {
            continue;
        }
        if let Some(caps) = re.captures(&text[idx..]) {
            let len = caps.get(0).map_or(0, |m| m.len());
            if len == 0 {
                continue;
            }
            resume = idx + len;
            hits.push((idx, caps));
        }
    }
    hits
}

/// Extract in-text citations from body paragraphs.
///
/// Narrative, parenthetical and (with `known_references`) reverse-search
/// strategies run per merged paragraph; the union is deduplicated on
/// paragraph, normalized first author and normalized year.
pub fn extract_citations(paragraphs: &[Paragraph], known_references: Option<&[ReferenceItem]>) -> Vec<InTextCitation> {
    extract_citations_with_config(paragraphs, known_references, &ParsingConfig::default())
}

pub(crate) fn extract_citations_with_config(
    paragraphs: &[Paragraph],
    known_references: Option<&[ReferenceItem]>,
    config: &ParsingConfig,
) -> Vec<InTextCitation> {
    let merged = merge_with_origin(paragraphs, config.merge_line_cap());
    let mut results = Vec::new();
    let mut seen: HashSet<(usize, String, String)> = HashSet::new();

    for (paragraph, p) in &merged {
        let text = fix_sticky_year_spacing(&p.text);
        let mut scan = ParagraphScan {
            text: &text,
            paragraph: *paragraph,
            page: p.page,
            window: config.context_window(),
            claimed: Vec::new(),
            found: Vec::new(),
        };
        scan.latin_narrative();
        scan.chinese_narrative();
        scan.parenthetical();
        if let Some(known) = known_references.filter(|k| !k.is_empty()) {
            scan.align_with_known(known);
            scan.reverse_search(known);
        }

        for citation in scan.found {
            let key = (
                citation.paragraph,
                normalize_author(citation.language, &citation.author1),
                citation.year.clone(),
            );
            if seen.insert(key) {
                results.push(citation);
            }
        }
    }
    tracing::debug!(
        paragraphs = merged.len(),
        citations = results.len(),
        "in-text citations extracted"
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use citecheck_core::IdentityKey;

    fn body(lines: &[&str]) -> Vec<Paragraph> {
        lines.iter().map(|l| Paragraph::new(*l, 1)).collect()
    }

    fn keys(citations: &[InTextCitation]) -> Vec<String> {
        citations.iter().map(|c| IdentityKey::for_citation(c).key_string()).collect()
    }

    #[test]
    fn test_narrative_and_parenthetical_share_key() {
        let doc = body(&[
            "DiMaggio and Powell (1983) describe isomorphism.",
            "Firms converge (DiMaggio & Powell, 1983).",
        ]);
        let found = extract_citations(&doc, None);
        assert_eq!(found.len(), 2);
        assert_eq!(keys(&found), vec!["dimaggio_1983", "dimaggio_1983"]);
        assert_eq!(found[0].style, CitationStyle::Narrative);
        assert_eq!(found[0].author2.as_deref(), Some("Powell"));
        assert_eq!(found[1].style, CitationStyle::Parenthetical);
        assert_eq!(found[1].author2.as_deref(), Some("Powell"));
    }

    #[test]
    fn test_same_paragraph_duplicates_collapse() {
        let doc = body(&["DiMaggio and Powell (1983) ... (DiMaggio & Powell, 1983)."]);
        let found = extract_citations(&doc, None);
        assert_eq!(keys(&found), vec!["dimaggio_1983"]);
    }

    #[test]
    fn test_semicolon_list() {
        let doc = body(&["Prior work (Baier et al., 2020; Chava, 2014) supports this."]);
        let found = extract_citations(&doc, None);
        assert_eq!(keys(&found), vec!["baier_2020", "chava_2014"]);
        assert_eq!(found[0].author2, None);
    }

    #[test]
    fn test_comma_list_with_several_years() {
        let doc = body(&["Evidence is mixed (Smith, 2019, Jones, 2020)."]);
        assert_eq!(keys(&extract_citations(&doc, None)), vec!["smith_2019", "jones_2020"]);
    }

    #[test]
    fn test_et_al_and_page_locator() {
        let doc = body(&["Lee et al. (2018, p. 12) argue otherwise; see also (Garcia, 2020a, pp. 3-4)."]);
        let found = extract_citations(&doc, None);
        assert_eq!(keys(&found), vec!["lee_2018", "garcia_2020a"]);
        assert_eq!(found[0].author1, "Lee");
    }

    #[test]
    fn test_lead_in_words_are_stripped() {
        let doc = body(&["As Smith (2020) notes, this holds (see Jones, 2019)."]);
        let found = extract_citations(&doc, None);
        assert_eq!(found[0].author1, "Smith");
        assert_eq!(found[1].author1, "Jones");
    }

    #[test]
    fn test_capitalized_sentence_openers_are_stripped() {
        for (sentence, expected) in [
            ("Following Smith (2020), we test this.", "Smith"),
            ("According to Smith (2020) it holds.", "Smith"),
            ("Unlike Smith (2020), we find none.", "Smith"),
            ("Like Smith (2020) we use panels.", "Smith"),
            ("While Smith (2020) disagrees, others agree.", "Smith"),
            ("Recently Smith (2020) revisited it.", "Smith"),
            ("Although Smith and Jones (2020) object, it holds.", "Smith"),
            ("In contrast van Dijk (2020) argues otherwise.", "van Dijk"),
        ] {
            let found = extract_citations(&body(&[sentence]), None);
            assert_eq!(found.len(), 1, "{sentence}");
            assert_eq!(found[0].author1, expected, "{sentence}");
        }
    }

    #[test]
    fn test_lead_in_aligned_with_known_reference() {
        let known = vec![ReferenceItem {
            language: Language::Latin,
            author1: "Smith".into(),
            author2: None,
            year: "2020".into(),
            raw: "Smith, J. (2020). Title.".into(),
            index: 0,
            page: 3,
            title: None,
            source: None,
        }];
        let doc = body(&["Echoing Smith (2020), we test this."]);
        assert_eq!(keys(&extract_citations(&doc, None)), vec!["echoingsmith_2020"]);
        assert_eq!(keys(&extract_citations(&doc, Some(&known))), vec!["smith_2020"]);

        // A compound surname that is itself listed stays whole.
        let compound = vec![ReferenceItem {
            author1: "Garcia Marquez".into(),
            raw: "Garcia Marquez, G. (2020). Title.".into(),
            ..known[0].clone()
        }];
        let doc = body(&["Garcia Marquez (2020) wrote it."]);
        assert_eq!(extract_citations(&doc, Some(&compound))[0].author1, "Garcia Marquez");
    }

    #[test]
    fn test_special_year_tokens() {
        let doc = body(&["Drafts exist (Lee, n.d.; Kim, in press)."]);
        assert_eq!(keys(&extract_citations(&doc, None)), vec!["lee_nd", "kim_inpress"]);
    }

    #[test]
    fn test_lowercase_phrase_is_not_an_author() {
        let doc = body(&["In the period (2019) prices rose, see table (n = 2020)."]);
        assert!(extract_citations(&doc, None).is_empty());
    }

    #[test]
    fn test_chinese_citations() {
        let doc = body(&[
            "根據王小明與李大華(2020)的研究,",
            "企業揭露增加(陳一等人, 2018; 林二、張三, 2019)。",
        ]);
        let found = extract_citations(&doc, None);
        let authors: Vec<&str> = found.iter().map(|c| c.author1.as_str()).collect();
        assert_eq!(authors, vec!["王小明", "陳一", "林二"]);
        assert_eq!(found[0].author2.as_deref(), Some("李大華"));
        assert_eq!(found[2].author2.as_deref(), Some("張三"));
        assert!(found.iter().all(|c| c.language == Language::Chinese));
    }

    #[test]
    fn test_reverse_search_recovers_known_reference() {
        let known = vec![ReferenceItem {
            language: Language::Latin,
            author1: "Hummel".into(),
            author2: Some("Schlick".into()),
            year: "2016".into(),
            raw: "Hummel, K., & Schlick, C. (2016). Title.".into(),
            index: 0,
            page: 9,
            title: None,
            source: None,
        }];
        let doc = body(&["This is documented (cf. the survey by Hummel 2016 and others)."]);
        assert!(extract_citations(&doc, None).is_empty());
        let found = extract_citations(&doc, Some(&known));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].style, CitationStyle::Recovered);
        assert_eq!(keys(&found), vec!["hummel_2016"]);
    }

    #[test]
    fn test_reverse_search_skips_claimed_groups() {
        let known = vec![ReferenceItem {
            language: Language::Latin,
            author1: "Chava".into(),
            author2: None,
            year: "2014".into(),
            raw: "Chava, S. (2014).".into(),
            index: 0,
            page: 1,
            title: None,
            source: None,
        }];
        let doc = body(&["Costs rise (Chava, 2014)."]);
        let found = extract_citations(&doc, Some(&known));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].style, CitationStyle::Parenthetical);
    }

    #[test]
    fn test_context_window_and_page() {
        let doc = vec![Paragraph::new("Intro. Chava (2014) shows it.", 4)];
        let found = extract_citations(&doc, None);
        assert_eq!(found[0].page, 4);
        assert_eq!(found[0].context, "...Intro. Chava (2014) shows it....");
    }

    #[test]
    fn test_merge_broken_paragraphs() {
        let doc = vec![
            Paragraph::new("Prior work (Smith,", 1),
            Paragraph::new("2020) shows", 1),
            Paragraph::new("Results hold for Chava", 2),
            Paragraph::new("(2014) as well.", 2),
            Paragraph::new("A new para-", 2),
            Paragraph::new("graph here.", 3),
            Paragraph::new("Finished.", 3),
            Paragraph::new("(2019) stands alone.", 3),
        ];
        let merged = merge_broken_paragraphs(&doc);
        let texts: Vec<&str> = merged.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Prior work (Smith, 2020) shows",
                "Results hold for Chava (2014) as well.",
                "A new paragraph here.",
                "Finished.",
                "(2019) stands alone.",
            ]
        );
        assert_eq!(merged[2].page, 2);
    }

    #[test]
    fn test_merge_cap() {
        let doc: Vec<Paragraph> = (0..15).map(|i| Paragraph::new(format!("line {i},"), 1)).collect();
        let merged = merge_broken_paragraphs(&doc);
        assert_eq!(merged.len(), 2);
        assert!(merged[0].text.starts_with("line 0, line 1,"));
    }

    #[test]
    fn test_paragraph_index_refers_to_source() {
        let doc = body(&["Start (Smith,", "2020).", "Then (Jones, 2019)."]);
        let found = extract_citations(&doc, None);
        assert_eq!(found[0].paragraph, 0);
        assert_eq!(found[1].paragraph, 2);
    }
}
