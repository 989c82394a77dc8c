//! Analyze command - screen one photograph for leukocoria.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use leukoscan_adapters::{
    blocking_client, model_path, set_models_dir, FsResultStore, HostedDetector, RemoteClassifier,
};
use leukoscan_core::ingress::{handle, IngressResponse, ResponseBody};
use leukoscan_core::ports::{LeukocoriaClassifier, ResultStore};
use leukoscan_core::{
    CancellationToken, Capabilities, EnhanceConfig, EyeLocalizerConfig, LocalClassifier,
    Pipeline, PipelineConfig, RetryPolicy,
};
use tracing::{debug, info, warn};

use super::ExitCode;
use crate::config::AppConfig;
use crate::output::JsonOutput;

/// Classifier backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ClassifierBackend {
    /// In-process candle model
    #[default]
    Local,
    /// HTTP prediction service
    Remote,
}

/// Hardcoded defaults.
mod defaults {
    pub const FACE_API_URL: &str = "https://serverless.roboflow.com";
    pub const DETECT_API_URL: &str = "https://detect.roboflow.com";
    pub const FACE_MODEL: &str = "face-detector-v4liw/2";
    pub const EYE_MODEL: &str = "eye-detection-kso3d/3";
    pub const IRIS_MODEL: &str = "iris_120_set/7";
    pub const CLASSIFIER_URL: &str = "http://127.0.0.1:8080/predict/";
    pub const TIMEOUT_SECS: u64 = 30;
    pub const BACKOFF_MS: u64 = 250;
}

/// Parse and validate a threshold value (0.0-1.0).
fn parse_threshold(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 0.0..=1.0"))
    }
}

/// Arguments for screening a photograph.
#[derive(Args, Clone)]
pub struct AnalyzeArgs {
    /// Photograph to screen
    pub image: PathBuf,

    /// Minimum eye detection confidence (0.0-1.0)
    #[arg(long, value_parser = parse_threshold)]
    pub threshold: Option<f32>,

    /// Longest side sent to the eye detector
    #[arg(long, value_name = "PIXELS", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_dim: Option<u32>,

    /// Classifier backend
    #[arg(long, value_enum)]
    pub classifier: Option<ClassifierBackend>,

    /// Remote classifier endpoint
    #[arg(long, value_name = "URL")]
    pub classifier_url: Option<String>,

    /// Base URL for the hosted detectors
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Detector API key
    #[arg(long, env = "LEUKOSCAN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Store images and a record under DIR
    #[arg(long, value_name = "DIR", conflicts_with = "no_store")]
    pub store: Option<PathBuf>,

    /// Do not store anything, even if configured
    #[arg(long)]
    pub no_store: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Retries per external call (0 or 1)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=1))]
    pub retries: Option<u32>,

    /// Request timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: AppConfig,
}

impl AnalyzeArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        args.threshold = args.threshold.or(config.pipeline.confidence_threshold);
        args.max_dim = args.max_dim.or(config.pipeline.max_inference_dim);

        if args.classifier.is_none() {
            args.classifier = config
                .classifier
                .backend
                .as_deref()
                .and_then(|s| match s {
                    "local" => Some(ClassifierBackend::Local),
                    "remote" => Some(ClassifierBackend::Remote),
                    _ => None,
                });
        }
        if args.classifier_url.is_none() {
            args.classifier_url.clone_from(&config.classifier.url);
        }

        if args.api_url.is_none() {
            args.api_url.clone_from(&config.detectors.api_url);
        }
        if args.api_key.is_none() {
            args.api_key.clone_from(&config.detectors.api_key);
        }
        args.timeout_secs = args.timeout_secs.or(config.detectors.timeout_secs);
        args.retries = args.retries.or(config.retry.max_retries);

        // Storage: CLI --no-store wins, then --store, then config.
        if !args.no_store && args.store.is_none() && config.storage.enabled != Some(false) {
            args.store.clone_from(&config.storage.dir);
        }

        if !args.pretty {
            args.pretty = config.output.pretty.unwrap_or(false);
        }

        if args.models_dir.is_none() {
            args.models_dir.clone_from(&config.models.dir);
        }

        args.config = config.clone();
        args
    }

    fn classifier(&self) -> ClassifierBackend {
        self.classifier.unwrap_or_default()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(defaults::TIMEOUT_SECS))
    }

    /// Detector base URL; `--api-url` replaces both hosted endpoints.
    fn detector_url(&self, default: &str) -> String {
        self.api_url.clone().unwrap_or_else(|| default.to_string())
    }

    fn pipeline_config(&self) -> PipelineConfig {
        let pipeline = &self.config.pipeline;
        let eye_defaults = EyeLocalizerConfig::default();
        let enhance_defaults = EnhanceConfig::default();
        let retry_defaults = RetryPolicy::default();

        PipelineConfig {
            eyes: EyeLocalizerConfig {
                confidence_threshold: self
                    .threshold
                    .unwrap_or(eye_defaults.confidence_threshold),
                max_inference_dim: self.max_dim.unwrap_or(eye_defaults.max_inference_dim),
                scale_w: pipeline.eye_scale_w.unwrap_or(eye_defaults.scale_w),
                scale_h: pipeline.eye_scale_h.unwrap_or(eye_defaults.scale_h),
            },
            enhance: EnhanceConfig {
                radius: pipeline.sharpen_radius.unwrap_or(enhance_defaults.radius),
                strength: pipeline
                    .sharpen_strength
                    .unwrap_or(enhance_defaults.strength),
                ..enhance_defaults
            },
            retry: RetryPolicy {
                max_retries: self.retries.unwrap_or(retry_defaults.max_retries),
                backoff: Duration::from_millis(
                    self.config.retry.backoff_ms.unwrap_or(defaults::BACKOFF_MS),
                ),
            },
        }
    }

    fn build_pipeline(&self) -> Result<Pipeline> {
        let client = blocking_client(self.timeout())?;

        let api_key = self.api_key.clone().unwrap_or_else(|| {
            warn!("No detector API key configured (set --api-key or LEUKOSCAN_API_KEY)");
            String::new()
        });
        let detectors = &self.config.detectors;
        let model = |configured: &Option<String>, default: &str| {
            configured.clone().unwrap_or_else(|| default.to_string())
        };

        let face = HostedDetector::new(
            client.clone(),
            &self.detector_url(defaults::FACE_API_URL),
            &model(&detectors.face_model, defaults::FACE_MODEL),
            &api_key,
        );
        let eyes = HostedDetector::new(
            client.clone(),
            &self.detector_url(defaults::DETECT_API_URL),
            &model(&detectors.eye_model, defaults::EYE_MODEL),
            &api_key,
        );
        let iris = HostedDetector::new(
            client.clone(),
            &self.detector_url(defaults::DETECT_API_URL),
            &model(&detectors.iris_model, defaults::IRIS_MODEL),
            &api_key,
        );
        debug!(
            "Detectors: face={} eyes={} iris={}",
            face.endpoint(),
            eyes.endpoint(),
            iris.endpoint()
        );

        let classifier: Arc<dyn LeukocoriaClassifier> = match self.classifier() {
            ClassifierBackend::Local => {
                let path = model_path("leukocoria").context("Unknown model 'leukocoria'")?;
                if !path.exists() {
                    info!(
                        "{} not found; run `leukoscan models fetch` before screening",
                        path.display()
                    );
                }
                Arc::new(LocalClassifier::new(path))
            }
            ClassifierBackend::Remote => {
                let url = self
                    .classifier_url
                    .clone()
                    .unwrap_or_else(|| defaults::CLASSIFIER_URL.to_string());
                debug!("Remote classifier: {url}");
                Arc::new(RemoteClassifier::new(client, &url))
            }
        };

        Ok(Pipeline::new(
            Capabilities {
                face: Arc::new(face),
                eyes: Arc::new(eyes),
                iris: Arc::new(iris),
                classifier,
            },
            self.pipeline_config(),
        ))
    }
}

/// Run the analyze command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub fn run(args: &AnalyzeArgs) -> Result<ExitCode> {
    info!("Screening {}", args.image.display());

    if let Some(ref models_dir) = args.models_dir {
        debug!("Using custom models directory: {}", models_dir.display());
        set_models_dir(Some(models_dir.clone()));
    }

    let pipeline = args.build_pipeline()?;
    let store = args.store.as_ref().map(|dir| {
        debug!("Storing results under {}", dir.display());
        FsResultStore::new(dir)
    });

    let payload = match std::fs::read(&args.image) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Cannot read {}: {e}", args.image.display());
            None
        }
    };

    let response = handle(
        &pipeline,
        payload.as_deref(),
        &original_name(&args.image),
        store.as_ref().map(|s| s as &dyn ResultStore),
        &CancellationToken::new(),
    );

    let output = JsonOutput::stdout();
    output.write(&response.body, args.pretty)?;
    output.flush()?;

    Ok(exit_code(&response))
}

fn original_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned())
}

/// Maps an ingress response to the process exit code.
fn exit_code(response: &IngressResponse) -> ExitCode {
    match &response.body {
        ResponseBody::Screening(screening) => {
            let flagged = screening
                .leukocoria
                .as_ref()
                .is_some_and(|pair| pair.left == Some(true) || pair.right == Some(true));
            if flagged {
                ExitCode::LeukocoriaFound
            } else {
                ExitCode::Success
            }
        }
        ResponseBody::Error(error) => match error.error.as_str() {
            "invalid_input" => ExitCode::InvalidInput,
            "upstream_unavailable" => ExitCode::UpstreamUnavailable,
            "classification_unavailable" => ExitCode::ClassificationUnavailable,
            _ => ExitCode::Error,
        },
    }
}
