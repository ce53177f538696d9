use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static STICKY_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-zA-Z,\.])([12]\d{3})").unwrap());

/// Letters that count as Latin script for language detection: ASCII plus Latin-1 letters.
pub fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || (('\u{00C0}'..='\u{00FF}').contains(&c) && c.is_alphabetic())
}

/// CJK Unified Ideographs block.
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200b}' | '\u{200e}' | '\u{200f}' | '\u{feff}')
        || (c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
}

/// Full-width and typographic punctuation mapped to its ASCII form.
fn half_width(c: char) -> char {
    match c {
        '（' => '(',
        '）' => ')',
        '，' | '‚' | '､' | '¸' => ',',
        '。' | '．' => '.',
        '：' => ':',
        '；' => ';',
        '‐' | '‑' | '‒' | '–' | '—' | '―' | '－' => '-',
        '＆' => '&',
        '‘' | '’' => '\'',
        '“' | '”' | '＂' => '"',
        other => other,
    }
}

/// Canonicalize text before any pattern matching.
///
/// Strips zero-width and control characters, converts full-width punctuation
/// to ASCII, collapses whitespace runs (including newlines) and trims.
/// Idempotent: `normalize_text(&normalize_text(x)) == normalize_text(x)`.
pub fn normalize_text(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .filter(|c| !is_invisible(*c))
        .map(half_width)
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove diacritics: `Müller` → `Muller`, `García` → `Garcia`.
pub fn strip_accents(s: &str) -> String {
    s.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Insert a space between a word and a year glued to it (`Smith2020` → `Smith 2020`).
pub fn fix_sticky_year_spacing(s: &str) -> String {
    STICKY_YEAR_RE.replace_all(s, "$1 $2").into_owned()
}

/// `(` count minus `)` count.
pub fn paren_balance(s: &str) -> i32 {
    s.chars().fold(0, |acc, c| match c {
        '(' => acc + 1,
        ')' => acc - 1,
        _ => acc,
    })
}

/// Text around the byte range `start..end`, widened by `window` characters on
/// each side and wrapped in `...`.
pub fn context_window(text: &str, start: usize, end: usize, window: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(window)
        .last()
        .map_or(start, |(i, _)| i);
    let to = text[end..]
        .char_indices()
        .nth(window)
        .map_or(text.len(), |(i, _)| end + i);
    format!("...{}...", &text[from..to])
}

/// Truncate to at most `max` characters, appending `...` when cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fullwidth_and_whitespace() {
        assert_eq!(
            normalize_text("王小明（2020）指出，\u{3000}企業\n\n規模"),
            "王小明(2020)指出, 企業 規模"
        );
        assert_eq!(normalize_text("Smith\u{200b} &amp;\tJones – 2020"), "Smith &amp; Jones - 2020");
        assert_eq!(normalize_text("O’Brien\u{0007}"), "O'Brien");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "  Hummel, K.,  &  Schlick, C. （2016）.\n The  relationship ",
            "\u{feff}參考文獻：\t王小明、李大華（印刷中）。",
            "",
            "— ‘quoted’ “text” —",
        ];
        for s in samples {
            let once = normalize_text(s);
            assert_eq!(normalize_text(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_strip_accents() {
        assert_eq!(strip_accents("García Müller Øst"), "Garcia Muller Øst");
        assert_eq!(strip_accents("王小明"), "王小明");
    }

    #[test]
    fn test_sticky_year() {
        assert_eq!(fix_sticky_year_spacing("Smith2020"), "Smith 2020");
        assert_eq!(fix_sticky_year_spacing("(Chava,2014)"), "(Chava, 2014)");
        assert_eq!(fix_sticky_year_spacing("(2014)"), "(2014)");
    }

    #[test]
    fn test_context_window_multibyte() {
        let text = "研究指出王小明(2020)的看法";
        let start = text.find('王').unwrap();
        let end = text.find("的").unwrap();
        assert_eq!(context_window(text, start, end, 2), "...指出王小明(2020)的看...");
        assert_eq!(context_window("abc", 0, 3, 50), "...abc...");
    }

    #[test]
    fn test_paren_balance() {
        assert_eq!(paren_balance("(Smith, 2020; (Lee"), 2);
        assert_eq!(paren_balance("a) b)"), -2);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("王小明李大華", 3), "王小明...");
    }
}
