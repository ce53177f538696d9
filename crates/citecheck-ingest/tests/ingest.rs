use std::io::Write;
use std::sync::Arc;

use citecheck_core::{BoundedCache, MatchType, ReferenceSource};
use citecheck_ingest::{DocumentService, IngestError, ReferenceOverride};
use citecheck_parsing::Analyzer;

const PAPER: &str = "\
Introduction

Firms disclose more when pressed (Hummel & Schlick, 2016).
DiMaggio and Powell (1983) describe isomorphism.
\u{0c}References

DiMaggio, P. J., & Powell, W. W. (1983). The iron cage revisited.
American Sociological Review, 48(2), 147-160.

Hummel, K., & Schlick, C. (2016). The relationship between sustainability performance and sustainability disclosure.
Journal of Accounting and Public Policy, 35, 455-476.

Zhou, Y. (2010). Never cited. Journal, 1, 1-2.
";

fn write_temp(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn analyze_text_file_from_disk() {
    let file = write_temp(PAPER, ".txt");
    let service = DocumentService::default();
    let report = service.analyze_path(file.path(), None, None).unwrap();

    assert_eq!(report.summary.reference_items, 3);
    assert_eq!(report.summary.citations, 2);
    assert_eq!(report.summary.matched, 2);
    assert_eq!(report.summary.missing, 0);
    assert_eq!(report.outcome.uncited.len(), 1);
    assert_eq!(report.outcome.uncited[0].author1, "Zhou");
    for row in &report.outcome.matched {
        assert_eq!(row.match_type, MatchType::Exact);
        assert_eq!(row.citation.page, 1);
        assert_eq!(row.reference_page(), 2);
    }
}

#[test]
fn markdown_heading_is_found() {
    let markdown = PAPER.replace('\u{0c}', "\n## ");
    let file = write_temp(&markdown, ".md");
    let report = DocumentService::default().analyze_path(file.path(), None, None).unwrap();
    assert_eq!(report.summary.reference_items, 3);
    assert_eq!(report.summary.matched, 2);
}

#[test]
fn json_paragraphs_keep_their_pages() {
    let json = r#"[
        {"text": "Costs rise (Chava, 2014).", "page": 4},
        {"text": "References", "page": 9},
        {"text": "Chava, S. (2014). Environmental externalities and cost of capital.", "page": 9}
    ]"#;
    let service = DocumentService::default();
    let report = service
        .analyze_bytes(json.as_bytes(), Some("upload"), Some("json"), None)
        .unwrap();
    assert_eq!(report.summary.matched, 1);
    assert_eq!(report.outcome.matched[0].citation.page, 4);
    assert_eq!(report.outcome.matched[0].reference_page(), 9);
}

#[test]
fn override_is_cached_separately() {
    let service = DocumentService::new(Analyzer::new(), Arc::new(BoundedCache::new(1)));
    let file = write_temp(PAPER, ".txt");
    let items = ReferenceOverride::Items(vec![
        "DiMaggio, P. J., & Powell, W. W. (1983). The iron cage revisited.".into(),
        "Hummel, K., & Schlick, C. (2016). Sustainability disclosure.".into(),
    ]);

    let overridden = service.analyze_path(file.path(), None, Some(&items)).unwrap();
    assert_eq!(overridden.metadata.reference_source, ReferenceSource::UserOverride);
    assert!(overridden.outcome.uncited.is_empty());

    // Capacity 1: the auto run evicts the override run.
    let auto = service.analyze_path(file.path(), None, None).unwrap();
    assert_eq!(auto.metadata.reference_source, ReferenceSource::AutoExtracted);
    assert_eq!(service.cached_results(), 1);
    let again = service.analyze_path(file.path(), None, Some(&items)).unwrap();
    assert!(!Arc::ptr_eq(&overridden, &again));
    assert_eq!(overridden.summary, again.summary);
}

#[test]
fn missing_file_is_io_error() {
    let service = DocumentService::default();
    let err = service
        .analyze_path(std::path::Path::new("/nonexistent/citecheck/paper.txt"), None, None)
        .unwrap_err();
    assert!(matches!(err, IngestError::Io(_)));
}
