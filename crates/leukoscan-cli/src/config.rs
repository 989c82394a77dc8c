//! Configuration file support for leukoscan.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/leukoscan/config.toml` (lowest priority)
//! - Project-local: `.leukoscan.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pipeline tuning.
    pub pipeline: PipelineConfig,
    /// Hosted detector settings.
    pub detectors: DetectorsConfig,
    /// Classifier backend settings.
    pub classifier: ClassifierConfig,
    /// Retry settings for external calls.
    pub retry: RetryConfig,
    /// Result storage settings.
    pub storage: StorageConfig,
    /// Model settings.
    pub models: ModelsConfig,
    /// Output formatting settings.
    pub output: OutputConfig,
}

/// Pipeline tuning.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum eye detection confidence (0.0-1.0, inclusive).
    pub confidence_threshold: Option<f32>,
    /// Longest side sent to the eye detector.
    pub max_inference_dim: Option<u32>,
    /// Horizontal widening of eye boxes.
    pub eye_scale_w: Option<f32>,
    /// Vertical widening of eye boxes.
    pub eye_scale_h: Option<f32>,
    /// Unsharp mask kernel size.
    pub sharpen_radius: Option<u32>,
    /// Unsharp mask strength.
    pub sharpen_strength: Option<f32>,
}

/// Hosted detector settings.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorsConfig {
    /// Base URL for all three detectors.
    pub api_url: Option<String>,
    /// API key sent with every detector request.
    pub api_key: Option<String>,
    /// Face model id.
    pub face_model: Option<String>,
    /// Eye model id.
    pub eye_model: Option<String>,
    /// Iris model id.
    pub iris_model: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Classifier backend settings.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// "local" or "remote".
    pub backend: Option<String>,
    /// Remote classifier endpoint.
    pub url: Option<String>,
}

/// Longest accepted pause before a retry.
const MAX_BACKOFF_MS: u64 = 10_000;

/// Retry settings.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries per external call (0 or 1).
    pub max_retries: Option<u32>,
    /// Pause before a retry, in milliseconds (at most 10000).
    pub backoff_ms: Option<u64>,
}

/// Result storage settings.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store root directory.
    pub dir: Option<PathBuf>,
    /// Store results when a directory is configured.
    pub enabled: Option<bool>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/leukoscan/config.toml`
    /// 2. Project-local: `.leukoscan.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are reported as
    /// warnings and dropped, so their defaults apply.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        if config.validate().is_err() {
            for problem in config.discard_invalid() {
                eprintln!("warning: {problem}");
            }
        }

        config
    }

    /// Validate configuration values are within acceptable ranges.
    ///
    /// Returns the first problem found.
    fn validate(&self) -> Result<(), String> {
        problems_by_field(self)
            .into_iter()
            .next()
            .map_or(Ok(()), |(_, message)| Err(message))
    }

    /// Clears every invalid value and returns one message per cleared field.
    fn discard_invalid(&mut self) -> Vec<String> {
        let found = problems_by_field(self);
        for (field, _) in &found {
            self.clear(field);
        }
        found.into_iter().map(|(_, message)| message).collect()
    }

    fn clear(&mut self, field: &str) {
        match field {
            "pipeline.confidence_threshold" => self.pipeline.confidence_threshold = None,
            "pipeline.max_inference_dim" => self.pipeline.max_inference_dim = None,
            "pipeline.eye_scale_w" => self.pipeline.eye_scale_w = None,
            "pipeline.eye_scale_h" => self.pipeline.eye_scale_h = None,
            "pipeline.sharpen_strength" => self.pipeline.sharpen_strength = None,
            "detectors.timeout_secs" => self.detectors.timeout_secs = None,
            "classifier.backend" => self.classifier.backend = None,
            "retry.max_retries" => self.retry.max_retries = None,
            "retry.backoff_ms" => self.retry.backoff_ms = None,
            _ => {}
        }
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        // Pipeline
        let p = other.pipeline;
        self.pipeline.confidence_threshold =
            p.confidence_threshold.or(self.pipeline.confidence_threshold);
        self.pipeline.max_inference_dim = p.max_inference_dim.or(self.pipeline.max_inference_dim);
        self.pipeline.eye_scale_w = p.eye_scale_w.or(self.pipeline.eye_scale_w);
        self.pipeline.eye_scale_h = p.eye_scale_h.or(self.pipeline.eye_scale_h);
        self.pipeline.sharpen_radius = p.sharpen_radius.or(self.pipeline.sharpen_radius);
        self.pipeline.sharpen_strength = p.sharpen_strength.or(self.pipeline.sharpen_strength);

        // Detectors
        let d = other.detectors;
        self.detectors.api_url = d.api_url.or_else(|| self.detectors.api_url.take());
        self.detectors.api_key = d.api_key.or_else(|| self.detectors.api_key.take());
        self.detectors.face_model = d.face_model.or_else(|| self.detectors.face_model.take());
        self.detectors.eye_model = d.eye_model.or_else(|| self.detectors.eye_model.take());
        self.detectors.iris_model = d.iris_model.or_else(|| self.detectors.iris_model.take());
        self.detectors.timeout_secs = d.timeout_secs.or(self.detectors.timeout_secs);

        // Classifier
        self.classifier.backend = other
            .classifier
            .backend
            .or_else(|| self.classifier.backend.take());
        self.classifier.url = other.classifier.url.or_else(|| self.classifier.url.take());

        // Retry
        self.retry.max_retries = other.retry.max_retries.or(self.retry.max_retries);
        self.retry.backoff_ms = other.retry.backoff_ms.or(self.retry.backoff_ms);

        // Storage
        self.storage.dir = other.storage.dir.or_else(|| self.storage.dir.take());
        self.storage.enabled = other.storage.enabled.or(self.storage.enabled);

        // Models
        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());

        // Output
        self.output.pretty = other.output.pretty.or(self.output.pretty);
    }
}

fn problems_by_field(config: &AppConfig) -> Vec<(&'static str, String)> {
    let mut problems = Vec::new();
    let p = &config.pipeline;

    if let Some(t) = p.confidence_threshold {
        if !(0.0..=1.0).contains(&t) {
            problems.push((
                "pipeline.confidence_threshold",
                format!("pipeline.confidence_threshold must be 0.0-1.0, got {t}"),
            ));
        }
    }
    if p.max_inference_dim == Some(0) {
        problems.push((
            "pipeline.max_inference_dim",
            "pipeline.max_inference_dim must be positive, got 0".to_string(),
        ));
    }
    for (field, value) in [
        ("pipeline.eye_scale_w", p.eye_scale_w),
        ("pipeline.eye_scale_h", p.eye_scale_h),
    ] {
        if let Some(v) = value {
            if !(v.is_finite() && v > 0.0) {
                problems.push((field, format!("{field} must be positive, got {v}")));
            }
        }
    }
    if let Some(s) = p.sharpen_strength {
        if !(s.is_finite() && s >= 0.0) {
            problems.push((
                "pipeline.sharpen_strength",
                format!("pipeline.sharpen_strength must be non-negative, got {s}"),
            ));
        }
    }
    if config.detectors.timeout_secs == Some(0) {
        problems.push((
            "detectors.timeout_secs",
            "detectors.timeout_secs must be positive, got 0".to_string(),
        ));
    }
    if let Some(ref b) = config.classifier.backend {
        if b != "local" && b != "remote" {
            problems.push((
                "classifier.backend",
                format!("classifier.backend must be 'local' or 'remote', got '{b}'"),
            ));
        }
    }
    if let Some(r) = config.retry.max_retries {
        if r > 1 {
            problems.push((
                "retry.max_retries",
                format!("retry.max_retries must be 0 or 1, got {r}"),
            ));
        }
    }
    if let Some(ms) = config.retry.backoff_ms {
        if ms > MAX_BACKOFF_MS {
            problems.push((
                "retry.backoff_ms",
                format!("retry.backoff_ms must be at most {MAX_BACKOFF_MS}, got {ms}"),
            ));
        }
    }

    problems
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("leukoscan").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.leukoscan.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(".leukoscan.toml");
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.pipeline.confidence_threshold.is_none());
        assert!(config.classifier.backend.is_none());
        assert!(config.storage.dir.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: AppConfig = toml::from_str("").expect("parse empty config");
        assert!(config.detectors.api_url.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r"
[pipeline]
confidence_threshold = 0.8
max_inference_dim = 800
eye_scale_w = 2.5
eye_scale_h = 4.0
sharpen_radius = 3
sharpen_strength = 0.7

[detectors]
api_url = 'http://localhost:9001'
api_key = 'abc'
face_model = 'face/1'
eye_model = 'eyes/2'
iris_model = 'iris/3'
timeout_secs = 10

[classifier]
backend = 'remote'
url = 'http://localhost:8080/predict/'

[retry]
max_retries = 0
backoff_ms = 50

[storage]
dir = '/var/lib/leukoscan'
enabled = true

[models]
dir = '/opt/models'

[output]
pretty = true
";
        let config: AppConfig = toml::from_str(toml).expect("parse full config");

        assert_eq!(config.pipeline.confidence_threshold, Some(0.8));
        assert_eq!(config.pipeline.max_inference_dim, Some(800));
        assert_eq!(config.pipeline.sharpen_radius, Some(3));
        assert_eq!(config.detectors.eye_model.as_deref(), Some("eyes/2"));
        assert_eq!(config.detectors.timeout_secs, Some(10));
        assert_eq!(config.classifier.backend.as_deref(), Some("remote"));
        assert_eq!(config.retry.max_retries, Some(0));
        assert_eq!(config.retry.backoff_ms, Some(50));
        assert_eq!(
            config.storage.dir,
            Some(PathBuf::from("/var/lib/leukoscan"))
        );
        assert_eq!(config.storage.enabled, Some(true));
        assert_eq!(config.models.dir, Some(PathBuf::from("/opt/models")));
        assert_eq!(config.output.pretty, Some(true));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_configs() {
        let mut base: AppConfig = toml::from_str(
            r"
[pipeline]
confidence_threshold = 0.75

[detectors]
api_key = 'xdg-key'
",
        )
        .expect("parse base");

        let override_config: AppConfig = toml::from_str(
            r"
[pipeline]
confidence_threshold = 0.9

[classifier]
backend = 'remote'
",
        )
        .expect("parse override");

        base.merge(override_config);

        assert_eq!(base.pipeline.confidence_threshold, Some(0.9));
        assert_eq!(base.detectors.api_key.as_deref(), Some("xdg-key"));
        assert_eq!(base.classifier.backend.as_deref(), Some("remote"));
    }

    #[test]
    fn test_merge_empty_override_preserves_base() {
        let mut base: AppConfig = toml::from_str(
            r"
[storage]
dir = 'results'
enabled = false
",
        )
        .expect("parse base");

        base.merge(AppConfig::default());

        assert_eq!(base.storage.dir, Some(PathBuf::from("results")));
        assert_eq!(base.storage.enabled, Some(false));
    }

    #[test]
    fn test_invalid_toml_syntax_handled() {
        let result: Result<AppConfig, _> =
            toml::from_str("[pipeline\nconfidence_threshold = 0.5\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_field_type_handled() {
        let result: Result<AppConfig, _> = toml::from_str(
            r#"
[retry]
max_retries = "once"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_ignored() {
        let config: AppConfig = toml::from_str(
            r"
[pipeline]
confidence_threshold = 0.6
unknown_field = 123
",
        )
        .expect("unknown fields are ignored");
        assert_eq!(config.pipeline.confidence_threshold, Some(0.6));
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let mut config = AppConfig::default();
        config.pipeline.confidence_threshold = Some(1.5);

        let err = config.validate().unwrap_err();
        assert!(err.contains("pipeline.confidence_threshold"));
    }

    #[test]
    fn test_validate_backend() {
        let mut config = AppConfig::default();
        config.classifier.backend = Some("gpu".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.contains("classifier.backend"));
    }

    #[test]
    fn test_validate_retries_and_dims() {
        let mut config = AppConfig::default();
        config.retry.max_retries = Some(3);
        assert!(config.validate().unwrap_err().contains("retry.max_retries"));

        let mut config = AppConfig::default();
        config.retry.backoff_ms = Some(86_400_000);
        assert!(config.validate().unwrap_err().contains("retry.backoff_ms"));

        let mut config = AppConfig::default();
        config.retry.backoff_ms = Some(10_000);
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.pipeline.max_inference_dim = Some(0);
        assert!(config
            .validate()
            .unwrap_err()
            .contains("pipeline.max_inference_dim"));

        let mut config = AppConfig::default();
        config.pipeline.eye_scale_h = Some(-1.0);
        assert!(config.validate().unwrap_err().contains("pipeline.eye_scale_h"));
    }

    #[test]
    fn test_discard_invalid_keeps_valid_values() {
        let mut config: AppConfig = toml::from_str(
            r"
[pipeline]
confidence_threshold = 7.0
max_inference_dim = 512

[classifier]
backend = 'cloud'
url = 'http://classifier'
",
        )
        .expect("parse config");

        let problems = config.discard_invalid();

        assert_eq!(problems.len(), 2);
        assert!(config.pipeline.confidence_threshold.is_none());
        assert!(config.classifier.backend.is_none());
        assert_eq!(config.pipeline.max_inference_dim, Some(512));
        assert_eq!(config.classifier.url.as_deref(), Some("http://classifier"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_discard_oversized_backoff() {
        let mut config: AppConfig = toml::from_str(
            r"
[retry]
max_retries = 1
backoff_ms = 86400000
",
        )
        .expect("parse config");

        let problems = config.discard_invalid();

        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("retry.backoff_ms"));
        assert!(config.retry.backoff_ms.is_none());
        assert_eq!(config.retry.max_retries, Some(1));
    }

    #[test]
    fn test_find_config_in_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".leukoscan.toml"), "").unwrap();

        assert_eq!(
            find_config_in_parents(&nested),
            Some(dir.path().join(".leukoscan.toml"))
        );
    }
}
