// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

use tracing::warn;

use crate::credibility::{AggregationPolicy, ColumnAliases, ConfidenceModel};

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";
pub const ENV_CONFIG_PATH: &str = "NEWS_VERIFY_CONFIG_PATH";
pub const ENV_OCR_ENDPOINT: &str = "OCR_ENDPOINT";
pub const ENV_CLASSIFIER_ENDPOINT: &str = "CLASSIFIER_ENDPOINT";
pub const ENV_DATASET_PATH: &str = "CREDIBILITY_DATASET_PATH";

fn default_ocr_endpoint() -> String {
    "http://127.0.0.1:8884".to_string()
}
fn default_ocr_timeout() -> u64 {
    30
}
fn default_classifier_timeout() -> u64 {
    10
}
fn default_max_upload_bytes() -> usize {
    crate::api::DEFAULT_MAX_UPLOAD_BYTES
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub credibility: CredibilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Base URL of the OCR backend.
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ocr_timeout")]
    pub timeout_secs: u64,
    /// Acquire engines at startup instead of on first request.
    #[serde(default)]
    pub eager_start: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ocr_endpoint(),
            timeout_secs: default_ocr_timeout(),
            eager_start: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            timeout_secs: default_classifier_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilityConfig {
    /// CSV loaded at startup. Without it the service starts with an empty report.
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,
    #[serde(default)]
    pub policy: AggregationPolicy,
    /// Override the accepted URL header names.
    #[serde(default)]
    pub url_columns: Option<Vec<String>>,
    /// Override the accepted label header names.
    #[serde(default)]
    pub label_columns: Option<Vec<String>>,
    /// Request body cap for `POST /credibility/upload`.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for CredibilityConfig {
    fn default() -> Self {
        Self {
            dataset_path: None,
            policy: AggregationPolicy::default(),
            url_columns: None,
            label_columns: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl CredibilityConfig {
    pub fn aliases(&self) -> ColumnAliases {
        let mut a = ColumnAliases::default();
        if let Some(u) = &self.url_columns {
            a.url = u.clone();
        }
        if let Some(l) = &self.label_columns {
            a.label = l.clone();
        }
        a
    }
}

impl AppConfig {
    /// Load from an explicit TOML path, then apply env overrides.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg.finish())
    }

    /// Load using env var + fallbacks:
    /// 1) $NEWS_VERIFY_CONFIG_PATH (must exist)
    /// 2) config/app.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(&default);
        }
        Ok(Self::default().finish())
    }

    fn finish(mut self) -> Self {
        self.apply_env_overrides();
        self.sanitize();
        self
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var(ENV_OCR_ENDPOINT) {
            if !v.trim().is_empty() {
                self.ocr.endpoint = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var(ENV_CLASSIFIER_ENDPOINT) {
            if !v.trim().is_empty() {
                self.classifier.endpoint = v.trim().to_string();
                self.classifier.enabled = true;
            }
        }
        if let Ok(v) = env::var(ENV_DATASET_PATH) {
            if !v.trim().is_empty() {
                self.credibility.dataset_path = Some(PathBuf::from(v.trim()));
            }
        }
    }

    fn sanitize(&mut self) {
        if self.ocr.timeout_secs == 0 {
            self.ocr.timeout_secs = default_ocr_timeout();
        }
        if self.classifier.timeout_secs == 0 {
            self.classifier.timeout_secs = default_classifier_timeout();
        }
        // a zero threshold would admit nothing new; one article is the floor
        if self.credibility.policy.min_articles == 0 {
            self.credibility.policy.min_articles = 1;
        }
        if self.credibility.max_upload_bytes == 0 {
            self.credibility.max_upload_bytes = default_max_upload_bytes();
        }
        if let ConfidenceModel::Wilson { z } = self.credibility.policy.confidence {
            if !(z.is_finite() && z > 0.0) {
                warn!(z, "invalid Wilson z; falling back to step confidence");
                self.credibility.policy.confidence = ConfidenceModel::Step;
            }
        }
    }
}
