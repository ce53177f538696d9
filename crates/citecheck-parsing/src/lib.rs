pub mod analyzer;
pub mod boundary;
pub mod citations;
pub mod config;
pub mod freetext;
pub mod normalize;
mod patterns;
pub mod reference;
pub mod section;
pub mod segment;

pub use analyzer::Analyzer;
pub use citations::{extract_citations, merge_broken_paragraphs};
pub use config::{ListOverride, ParsingConfig, ParsingConfigBuilder};
pub use freetext::{FreeTextReport, check_text};
pub use normalize::{FailedReference, FailureReason, NormalizedReference, NormalizedReferenceList, normalize_references};
pub use reference::{extract_reference_items, parse_reference};
pub use section::{collect_reference_paragraphs, find_reference_section_start};
pub use segment::{SegmentedEntry, segment, segment_entries};
// Re-export domain types from core (canonical definitions live there)
pub use citecheck_core::{
    AnalysisError, AnalysisReport, ExtractionResult, InTextCitation, Paragraph, ReferenceItem, ReferenceOverride,
};
