use std::path::Path;
use std::sync::Arc;

use citecheck_core::config_file::ConfigFile;
use citecheck_core::{AnalysisReport, BoundedCache, CacheKey, DEFAULT_CACHE_CAPACITY, ReferenceOverride, ResultCache};
use citecheck_parsing::Analyzer;

use crate::{IngestError, InputType, load_bytes};

/// Shared handle to a cached report.
pub type SharedReport = Arc<AnalysisReport>;

/// Runs document analyses through an injected result cache.
pub struct DocumentService {
    analyzer: Analyzer,
    cache: Arc<dyn ResultCache<SharedReport>>,
}

impl Default for DocumentService {
    fn default() -> Self {
        Self::new(Analyzer::default(), Arc::new(BoundedCache::new(DEFAULT_CACHE_CAPACITY)))
    }
}

impl DocumentService {
    pub fn new(analyzer: Analyzer, cache: Arc<dyn ResultCache<SharedReport>>) -> Self {
        Self { analyzer, cache }
    }

    /// LRU-cached service sized from the `[cache]` table, for long-lived embedders.
    pub fn from_config(analyzer: Analyzer, config: &ConfigFile) -> Self {
        let capacity = config.cache_capacity().unwrap_or(DEFAULT_CACHE_CAPACITY);
        Self::new(analyzer, Arc::new(BoundedCache::new(capacity)))
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    /// Analyze an uploaded document.
    ///
    /// The input type comes from `file_type` if given, otherwise from the
    /// extension of `filename`. Identical requests are answered from the cache.
    pub fn analyze_bytes(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        file_type: Option<&str>,
        reference_override: Option<&ReferenceOverride>,
    ) -> Result<SharedReport, IngestError> {
        let input_type = InputType::resolve(file_type, filename)?;
        let key = CacheKey::new(bytes, input_type.as_str(), filename, reference_override);

        if let Some(report) = self.cache.get(&key) {
            tracing::debug!(hash = %key.content_hash, "serving cached report");
            return Ok(report);
        }

        tracing::debug!(hash = %key.content_hash, input = input_type.as_str(), "analyzing document");
        let paragraphs = load_bytes(bytes, input_type)?;
        let report = Arc::new(self.analyzer.analyze(&paragraphs, reference_override)?);
        self.cache.insert(key, Arc::clone(&report));
        Ok(report)
    }

    /// Read `path` and analyze it, using its file name for type detection.
    pub fn analyze_path(
        &self,
        path: &Path,
        file_type: Option<&str>,
        reference_override: Option<&ReferenceOverride>,
    ) -> Result<SharedReport, IngestError> {
        let bytes = std::fs::read(path)?;
        let filename = path.file_name().and_then(|n| n.to_str());
        self.analyze_bytes(&bytes, filename, file_type, reference_override)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citecheck_core::{AnalysisError, NoCache};

    const DOC: &str = "Body text (Chava, 2014).\nReferences\nChava, S. (2014). Environmental externalities.\n";

    #[test]
    fn test_repeat_request_hits_cache() {
        let service = DocumentService::default();
        let first = service.analyze_bytes(DOC.as_bytes(), Some("paper.txt"), None, None).unwrap();
        let second = service.analyze_bytes(DOC.as_bytes(), Some("paper.txt"), None, None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(service.cached_results(), 1);
    }

    #[test]
    fn test_override_changes_cache_key() {
        let service = DocumentService::default();
        let auto = service.analyze_bytes(DOC.as_bytes(), Some("paper.txt"), None, None).unwrap();
        let items = ReferenceOverride::Items(vec!["Chava, S. (2014). Environmental externalities.".into()]);
        let overridden = service
            .analyze_bytes(DOC.as_bytes(), Some("paper.txt"), None, Some(&items))
            .unwrap();
        assert!(!Arc::ptr_eq(&auto, &overridden));
        assert_eq!(service.cached_results(), 2);
    }

    #[test]
    fn test_capacity_from_config() {
        let config = ConfigFile {
            cache: Some(citecheck_core::config_file::CacheConfig { capacity: Some(1) }),
            ..Default::default()
        };
        let service = DocumentService::from_config(Analyzer::new(), &config);
        service.analyze_bytes(DOC.as_bytes(), Some("a.txt"), None, None).unwrap();
        service.analyze_bytes(DOC.as_bytes(), Some("b.txt"), None, None).unwrap();
        assert_eq!(service.cached_results(), 1);
    }

    #[test]
    fn test_no_cache_recomputes() {
        let service = DocumentService::new(Analyzer::new(), Arc::new(NoCache));
        let first = service.analyze_bytes(DOC.as_bytes(), None, Some("txt"), None).unwrap();
        let second = service.analyze_bytes(DOC.as_bytes(), None, Some("txt"), None).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.summary, second.summary);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let service = DocumentService::default();
        let err = service
            .analyze_bytes(b"Only a body paragraph.", Some("paper.txt"), None, None)
            .unwrap_err();
        assert!(matches!(err, IngestError::Analysis(AnalysisError::SectionNotFound)));
        let err = service.analyze_bytes(DOC.as_bytes(), Some("paper.pdf"), None, None).unwrap_err();
        assert!(matches!(err, IngestError::Analysis(AnalysisError::UnsupportedInputType(_))));
        assert_eq!(service.cached_results(), 0);
    }
}
