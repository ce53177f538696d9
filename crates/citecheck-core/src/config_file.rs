use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub engine: Option<EngineConfig>,
    pub cache: Option<CacheConfig>,
    pub headings: Option<HeadingsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub similarity_threshold: Option<f64>,
    pub context_window: Option<usize>,
    pub merge_line_cap: Option<usize>,
    pub relaxed_anchor_span: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadingsConfig {
    /// Extra reference-section headings, appended to the built-in list.
    pub reference: Option<Vec<String>>,
    /// Extra headings that end the reference list.
    pub tail: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `citecheck_parsing=debug`.
    pub level: Option<String>,
}

/// Platform config directory path: `<config_dir>/citecheck/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("citecheck").join("config.toml"))
}

/// Load config by cascading CWD `.citecheck.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".citecheck.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

fn pick<S, T: Clone>(overlay: &Option<S>, base: &Option<S>, field: impl Fn(&S) -> &Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(|s| field(s).clone())
        .or_else(|| base.as_ref().and_then(|s| field(s).clone()))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        engine: Some(EngineConfig {
            similarity_threshold: pick(&overlay.engine, &base.engine, |e| &e.similarity_threshold),
            context_window: pick(&overlay.engine, &base.engine, |e| &e.context_window),
            merge_line_cap: pick(&overlay.engine, &base.engine, |e| &e.merge_line_cap),
            relaxed_anchor_span: pick(&overlay.engine, &base.engine, |e| &e.relaxed_anchor_span),
        }),
        cache: Some(CacheConfig {
            capacity: pick(&overlay.cache, &base.cache, |c| &c.capacity),
        }),
        headings: Some(HeadingsConfig {
            reference: pick(&overlay.headings, &base.headings, |h| &h.reference),
            tail: pick(&overlay.headings, &base.headings, |h| &h.tail),
        }),
        logging: Some(LoggingConfig {
            level: pick(&overlay.logging, &base.logging, |l| &l.level),
        }),
    }
}

impl ConfigFile {
    pub fn similarity_threshold(&self) -> Option<f64> {
        self.engine.as_ref().and_then(|e| e.similarity_threshold)
    }

    pub fn cache_capacity(&self) -> Option<usize> {
        self.cache.as_ref().and_then(|c| c.capacity)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[engine]\nsimilarity_threshold = 0.8\n\n[headings]\nreference = [\"Literatur\"]\n",
        )
        .unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.similarity_threshold(), Some(0.8));
        assert_eq!(
            config.headings.unwrap().reference,
            Some(vec!["Literatur".to_string()])
        );
        assert!(config.cache.is_none());
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from_path(&dir.path().join("absent.toml")).is_none());
        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[engine\nsimilarity_threshold = ").unwrap();
        assert!(load_from_path(&bad).is_none());
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base: ConfigFile = toml::from_str(
            "[engine]\nsimilarity_threshold = 0.7\ncontext_window = 40\n[cache]\ncapacity = 5\n[logging]\nlevel = \"info\"\n",
        )
        .unwrap();
        let overlay: ConfigFile =
            toml::from_str("[engine]\nsimilarity_threshold = 0.9\n[logging]\nlevel = \"debug\"\n").unwrap();

        let merged = merge(base, overlay);
        assert_eq!(merged.similarity_threshold(), Some(0.9));
        assert_eq!(merged.engine.as_ref().unwrap().context_window, Some(40));
        assert_eq!(merged.cache_capacity(), Some(5));
        assert_eq!(merged.log_level(), Some("debug"));
    }
}
