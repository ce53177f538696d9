use citecheck_core::{
    AnalysisError, AnalysisReport, AnalysisSummary, ExtractionResult, InTextCitation, MatchOutcome, Matcher,
    OverrideMetadata, Paragraph, ParseFailure, ParseStats, ReferenceItem, ReferenceOverride, ReferenceSource,
};

use crate::citations::extract_citations_with_config;
use crate::config::ParsingConfig;
use crate::normalize::{NormalizedReferenceList, normalize_references_with_config};
use crate::reference::{extract_reference_items_with_config, parse_reference};
use crate::section::{collect_reference_paragraphs_with_config, find_reference_section_start_with_config};
use crate::segment::{SegmentedEntry, segment_entries_with_config};

/// The document analysis pipeline.
///
/// Holds a [`ParsingConfig`] and a [`Matcher`] and exposes each stage as a
/// method. [`Analyzer::analyze`] runs them in order: locate the reference
/// section, parse the reference list (or a user override), extract body
/// citations and match the two.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: ParsingConfig,
    matcher: Matcher,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParsingConfig, matcher: Matcher) -> Self {
        Self { config, matcher }
    }

    pub fn config(&self) -> &ParsingConfig {
        &self.config
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Index of the reference-section heading.
    pub fn find_reference_section(&self, paragraphs: &[Paragraph]) -> Option<usize> {
        find_reference_section_start_with_config(paragraphs, &self.config)
    }

    /// Split a raw reference-list blob into entries.
    pub fn segment_entries(&self, raw: &str) -> Vec<SegmentedEntry> {
        segment_entries_with_config(raw, &self.config)
    }

    /// Clean, disambiguate and sort a raw reference list.
    pub fn normalize_references(&self, raw: &str) -> NormalizedReferenceList {
        normalize_references_with_config(raw, &self.config)
    }

    /// Parse the reference list that follows the heading at `start`.
    pub fn extract_references(&self, paragraphs: &[Paragraph], start: usize) -> ExtractionResult {
        let collected = collect_reference_paragraphs_with_config(paragraphs, start, &self.config);
        extract_reference_items_with_config(&collected, &self.config)
    }

    pub fn extract_citations(
        &self,
        body: &[Paragraph],
        known_references: Option<&[ReferenceItem]>,
    ) -> Vec<InTextCitation> {
        extract_citations_with_config(body, known_references, &self.config)
    }

    pub fn match_citations(
        &self,
        citations: &[InTextCitation],
        references: &[ReferenceItem],
        raw_reference_text: &[Paragraph],
    ) -> MatchOutcome {
        self.matcher.match_citations(citations, references, raw_reference_text)
    }

    /// Run the whole pipeline.
    ///
    /// Without a reference heading the analysis fails with
    /// [`AnalysisError::SectionNotFound`] unless `reference_override` yields
    /// at least one parsed entry. An override that is empty or parses to
    /// nothing falls back to the auto-extracted list with a warning.
    pub fn analyze(
        &self,
        paragraphs: &[Paragraph],
        reference_override: Option<&ReferenceOverride>,
    ) -> Result<AnalysisReport, AnalysisError> {
        let requested = reference_override.filter(|o| o.is_requested());
        let start = self.find_reference_section(paragraphs);

        let (body, mut raw_references, mut extraction) = match start {
            Some(start) => (
                &paragraphs[..start],
                paragraphs[start..].to_vec(),
                self.extract_references(paragraphs, start),
            ),
            None if requested.is_some() => (paragraphs, Vec::new(), ExtractionResult::default()),
            None => return Err(AnalysisError::SectionNotFound),
        };

        let mut metadata = OverrideMetadata {
            override_requested: requested.is_some(),
            ..OverrideMetadata::default()
        };
        if let Some(reference_override) = requested {
            match self.override_items(reference_override) {
                Err(reason) => {
                    tracing::warn!(reason, "reference override rejected, using auto-extracted references");
                    metadata.warning = Some(format!("{reason}; using auto-extracted references"));
                }
                Ok(items) => {
                    metadata.override_items = items.len();
                    let parsed = parse_override_items(&items);
                    metadata.override_parse_failures = parsed.stats.failures.len();
                    if parsed.references.is_empty() {
                        tracing::warn!(total = items.len(), "no override entry parsed, using auto-extracted references");
                        metadata.warning =
                            Some("no override entry could be parsed; using auto-extracted references".to_string());
                    } else {
                        if !parsed.stats.failures.is_empty() {
                            tracing::warn!(
                                parsed = parsed.references.len(),
                                total = items.len(),
                                "reference override partially parsed"
                            );
                            metadata.warning = Some(format!(
                                "only {}/{} override entries could be parsed",
                                parsed.references.len(),
                                items.len()
                            ));
                        }
                        raw_references = items.iter().map(|i| Paragraph::new(i.clone(), 0)).collect();
                        extraction = parsed;
                        metadata.reference_source = ReferenceSource::UserOverride;
                    }
                }
            }
        }

        if start.is_none() && extraction.references.is_empty() {
            return Err(AnalysisError::SectionNotFound);
        }

        let references = extraction.references;
        let citations = self.extract_citations(body, Some(&references));
        let outcome = self.match_citations(&citations, &references, &raw_references);

        let summary = AnalysisSummary {
            body_paragraphs: body.len(),
            reference_items: references.len(),
            citations: citations.len(),
            matched: outcome.matched.len(),
            missing: outcome.missing.len(),
            uncited: outcome.uncited.len(),
        };
        tracing::info!(
            body_paragraphs = summary.body_paragraphs,
            references = summary.reference_items,
            citations = summary.citations,
            matched = summary.matched,
            missing = summary.missing,
            uncited = summary.uncited,
            source = ?metadata.reference_source,
            "analysis complete"
        );

        Ok(AnalysisReport {
            summary,
            outcome,
            parse_stats: extraction.stats,
            metadata,
        })
    }

    /// Trimmed, non-empty override entries, or why there are none.
    fn override_items(&self, reference_override: &ReferenceOverride) -> Result<Vec<String>, &'static str> {
        let items: Vec<String> = match reference_override {
            ReferenceOverride::Items(items) => items
                .iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect(),
            ReferenceOverride::Text(text) => segment_entries_with_config(text.trim(), &self.config)
                .into_iter()
                .map(|e| e.text.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        };
        if items.is_empty() {
            return Err("override reference list is empty");
        }
        Ok(items)
    }
}

/// Parse override entries one by one. They carry no page context.
fn parse_override_items(items: &[String]) -> ExtractionResult {
    let mut references = Vec::new();
    let mut failures = Vec::new();
    for (ordinal, item) in items.iter().enumerate() {
        match parse_reference(item, references.len(), 0) {
            Some(reference) => references.push(reference),
            None => failures.push(ParseFailure {
                ordinal,
                text: item.clone(),
            }),
        }
    }
    ExtractionResult {
        stats: ParseStats {
            total_segments: items.len(),
            parsed: references.len(),
            failures,
        },
        references,
    }
}
