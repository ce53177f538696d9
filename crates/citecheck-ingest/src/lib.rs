use std::path::Path;

use citecheck_core::{AnalysisError, Paragraph};
use serde::Deserialize;
use thiserror::Error;

pub mod service;

// Re-export domain types for convenience
pub use citecheck_core::{AnalysisReport, ReferenceOverride};
pub use service::DocumentService;

/// Page break marker in plain-text input.
const FORM_FEED: char = '\u{0c}';

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("input is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid paragraph JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Supported text-level input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    /// Plain text; form feeds separate pages.
    Text,
    /// Markdown; everything is page 1.
    Markdown,
    /// A JSON array of `{"text": ..., "page": ...}` objects.
    Json,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "txt",
            InputType::Markdown => "md",
            InputType::Json => "json",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('.').to_lowercase().as_str() {
            "txt" | "text" => Some(InputType::Text),
            "md" | "markdown" => Some(InputType::Markdown),
            "json" => Some(InputType::Json),
            _ => None,
        }
    }

    /// The explicit `file_type` wins, then the extension of `filename`.
    pub fn resolve(file_type: Option<&str>, filename: Option<&str>) -> Result<Self, AnalysisError> {
        let explicit = file_type.map(str::trim).filter(|t| !t.is_empty());
        let name = match explicit {
            Some(t) => t.to_string(),
            None => filename
                .and_then(|f| Path::new(f).extension())
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string(),
        };
        Self::from_name(&name).ok_or_else(|| {
            AnalysisError::UnsupportedInputType(if name.is_empty() { "unknown".to_string() } else { name })
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonParagraph {
    Tagged(Paragraph),
    Plain(String),
}

/// Split document text into paragraphs, one per non-empty line.
pub fn load_paragraphs(text: &str, input_type: InputType) -> Result<Vec<Paragraph>, IngestError> {
    let paragraphs = match input_type {
        InputType::Text => text
            .split(FORM_FEED)
            .enumerate()
            .flat_map(|(page, chunk)| lines_as_paragraphs(chunk, page as u32 + 1, str::to_string))
            .collect(),
        InputType::Markdown => lines_as_paragraphs(text, 1, strip_markdown),
        InputType::Json => serde_json::from_str::<Vec<JsonParagraph>>(text)?
            .into_iter()
            .map(|p| match p {
                JsonParagraph::Tagged(p) => p,
                JsonParagraph::Plain(text) => Paragraph::new(text, 0),
            })
            .filter(|p| !p.text.trim().is_empty())
            .collect(),
    };
    tracing::debug!(
        input = input_type.as_str(),
        paragraphs = paragraphs.len(),
        "document loaded"
    );
    Ok(paragraphs)
}

fn lines_as_paragraphs(chunk: &str, page: u32, clean: fn(&str) -> String) -> Vec<Paragraph> {
    chunk
        .lines()
        .map(clean)
        .filter(|line| !line.trim().is_empty())
        .map(|line| Paragraph::new(line, page))
        .collect()
}

/// Drop heading and quote markers so `## References` reads as a heading.
fn strip_markdown(line: &str) -> String {
    let trimmed = line.trim_start();
    let unheaded = trimmed.trim_start_matches('#');
    let unheaded = if unheaded.len() != trimmed.len() { unheaded.trim_start() } else { trimmed };
    unheaded.trim_start_matches("> ").to_string()
}

/// Decode `bytes` as `input_type` and split into paragraphs.
pub fn load_bytes(bytes: &[u8], input_type: InputType) -> Result<Vec<Paragraph>, IngestError> {
    let text = String::from_utf8(bytes.to_vec())?;
    load_paragraphs(&text, input_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_input_type() {
        assert_eq!(InputType::resolve(None, Some("paper.TXT")).unwrap(), InputType::Text);
        assert_eq!(InputType::resolve(Some(".markdown"), Some("x.txt")).unwrap(), InputType::Markdown);
        assert_eq!(InputType::resolve(Some("json"), None).unwrap(), InputType::Json);
        assert_eq!(
            InputType::resolve(None, Some("paper.docx")).unwrap_err(),
            AnalysisError::UnsupportedInputType("docx".into())
        );
        assert_eq!(
            InputType::resolve(None, None).unwrap_err(),
            AnalysisError::UnsupportedInputType("unknown".into())
        );
    }

    #[test]
    fn test_text_pages_follow_form_feeds() {
        let text = "Intro line\n\nBody (Smith, 2020).\u{0c}References\nSmith, J. (2020). Title.";
        let paragraphs = load_paragraphs(text, InputType::Text).unwrap();
        assert_eq!(paragraphs.len(), 4);
        assert_eq!(paragraphs[1].page, 1);
        assert_eq!(paragraphs[2], Paragraph::new("References", 2));
        assert_eq!(paragraphs[3].page, 2);
    }

    #[test]
    fn test_markdown_headings() {
        let text = "# Title\n\nBody text.\n\n## References\n\n> Smith, J. (2020). Title.";
        let paragraphs = load_paragraphs(text, InputType::Markdown).unwrap();
        let texts: Vec<&str> = paragraphs.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["Title", "Body text.", "References", "Smith, J. (2020). Title."]);
        assert!(paragraphs.iter().all(|p| p.page == 1));
    }

    #[test]
    fn test_json_paragraphs() {
        let text = r#"[{"text": "Body (Smith, 2020).", "page": 3}, {"text": "  "}, "References"]"#;
        let paragraphs = load_paragraphs(text, InputType::Json).unwrap();
        assert_eq!(paragraphs, vec![Paragraph::new("Body (Smith, 2020).", 3), Paragraph::new("References", 0)]);
        assert!(matches!(load_paragraphs("{", InputType::Json), Err(IngestError::Json(_))));
    }

    #[test]
    fn test_invalid_utf8() {
        assert!(matches!(load_bytes(&[0xff, 0xfe, 0x00], InputType::Text), Err(IngestError::Utf8(_))));
    }
}
