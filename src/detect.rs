// src/detect.rs
//! Fake/real classifier forwarding.
//!
//! The verdict itself comes from an external classifier service; this module
//! only shapes the request, validates the response and provides disabled and
//! mock stand-ins.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictLabel {
    Fake,
    Real,
}

/// Classifier answer. `confidence` is on the 0–1 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: VerdictLabel,
    pub confidence: f32,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// What gets sent upstream. Exactly one of the fields is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ClassifyRequest {
    pub fn text(t: impl Into<String>) -> Self {
        Self {
            text: Some(t.into()),
            url: None,
        }
    }

    pub fn url(u: impl Into<String>) -> Self {
        Self {
            text: None,
            url: Some(u.into()),
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, req: &ClassifyRequest) -> Result<Verdict>;
    /// Provider name for diagnostics/headers.
    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn Classifier>;

/// Factory: build a classifier according to config and environment variables.
///
/// * If `CLASSIFIER_TEST_MODE=mock`, returns [`MockClassifier`].
/// * Else if disabled or no endpoint is set, returns [`DisabledClassifier`].
/// * Else builds [`HttpClassifier`].
pub fn build_classifier(cfg: &ClassifierConfig) -> Result<DynClassifier> {
    if std::env::var("CLASSIFIER_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockClassifier));
    }
    if !cfg.enabled || cfg.endpoint.trim().is_empty() {
        return Ok(Arc::new(DisabledClassifier));
    }
    Ok(Arc::new(HttpClassifier::new(
        &cfg.endpoint,
        Duration::from_secs(cfg.timeout_secs),
    )?))
}

/// POSTs `ClassifyRequest` JSON and expects a `Verdict` back.
pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("news-verify/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building classifier http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, req: &ClassifyRequest) -> Result<Verdict> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(req)
            .send()
            .await
            .context("classifier request failed")?;
        if !resp.status().is_success() {
            bail!("classifier returned HTTP {}", resp.status());
        }
        let mut v: Verdict = resp.json().await.context("parsing classifier response")?;
        if !v.confidence.is_finite() {
            return Err(anyhow!("classifier returned non-finite confidence"));
        }
        v.confidence = v.confidence.clamp(0.0, 1.0);
        Ok(v)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Always fails; used when no classifier is configured.
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    async fn classify(&self, _req: &ClassifyRequest) -> Result<Verdict> {
        Err(anyhow!("classifier is disabled"))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic stand-in: flags a handful of clickbait phrases as fake.
pub struct MockClassifier;

const MOCK_FAKE_MARKERS: [&str; 4] = ["shocking", "you won't believe", "miracle", "100% proof"];

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, req: &ClassifyRequest) -> Result<Verdict> {
        let text = req
            .text
            .as_deref()
            .or(req.url.as_deref())
            .unwrap_or_default()
            .to_lowercase();
        let hits: Vec<String> = MOCK_FAKE_MARKERS
            .iter()
            .filter(|m| text.contains(*m))
            .map(|m| format!("matched phrase: {m}"))
            .collect();
        Ok(if hits.is_empty() {
            Verdict {
                label: VerdictLabel::Real,
                confidence: 0.6,
                evidence: Vec::new(),
            }
        } else {
            Verdict {
                label: VerdictLabel::Fake,
                confidence: 0.9,
                evidence: hits,
            }
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_classifier_errors() {
        let c = DisabledClassifier;
        assert!(c.classify(&ClassifyRequest::text("x")).await.is_err());
    }

    #[tokio::test]
    async fn mock_flags_clickbait() {
        let c = MockClassifier;
        let v = c
            .classify(&ClassifyRequest::text("SHOCKING: miracle cure found"))
            .await
            .unwrap();
        assert_eq!(v.label, VerdictLabel::Fake);
        assert_eq!(v.evidence.len(), 2);

        let v = c
            .classify(&ClassifyRequest::text("Council approves budget"))
            .await
            .unwrap();
        assert_eq!(v.label, VerdictLabel::Real);
    }

    #[test]
    fn request_serializes_one_field() {
        let s = serde_json::to_string(&ClassifyRequest::url("https://a.com")).unwrap();
        assert_eq!(s, r#"{"url":"https://a.com"}"#);
    }

    #[test]
    fn disabled_when_not_configured() {
        let cfg = ClassifierConfig::default();
        // only meaningful when the mock env switch is off
        if std::env::var("CLASSIFIER_TEST_MODE").is_err() {
            assert_eq!(build_classifier(&cfg).unwrap().name(), "disabled");
        }
    }
}
