// src/ocr/engine.rs
//! Recognition engines: provider abstraction + concrete providers.
//!
//! An [`EngineProvider`] acquires one [`RecognitionEngine`] per script. The
//! HTTP provider talks to an external OCR backend; the mock provider returns
//! fixed transcriptions for tests and local runs (`OCR_TEST_MODE=mock`).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OcrConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Script an engine is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Latin,
    Malayalic,
}

impl Script {
    /// Language code passed to the OCR backend.
    pub fn lang_code(self) -> &'static str {
        match self {
            Script::Latin => "eng",
            Script::Malayalic => "mal",
        }
    }
}

/// Output of one recognition pass. `confidence` is on the 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    pub confidence: f32,
    pub script: Script,
}

/// A live engine handle for a single script.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<RecognitionResult>;
    /// Release backend resources. Called at most once per handle by the recognizer.
    async fn release(&self) -> Result<()>;
}

/// Acquires engines. Acquisition may be slow and may fail.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    async fn acquire(&self, script: Script) -> Result<Arc<dyn RecognitionEngine>>;
    fn name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynEngineProvider = Arc<dyn EngineProvider>;

/// Factory: build a provider according to config and environment variables.
///
/// * If `OCR_TEST_MODE=mock`, returns a mock provider with fixed English output.
/// * Else builds the HTTP provider for `cfg.endpoint`.
pub fn build_provider(cfg: &OcrConfig) -> DynEngineProvider {
    if std::env::var("OCR_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockEngineProvider::new(
            ("Mock transcription", 92.0),
            ("", 10.0),
        ));
    }
    Arc::new(HttpEngineProvider::new(
        cfg.endpoint.clone(),
        Duration::from_secs(cfg.timeout_secs),
    ))
}

// ------------------------------------------------------------
// HTTP backend
// ------------------------------------------------------------

/// Engines backed by an external OCR service.
///
/// Contract: `GET {base}/health` must succeed for acquisition;
/// `POST {base}/recognize?lang=<code>` with the raw image bytes returns
/// `{ "text": "...", "confidence": 0..100 }`.
pub struct HttpEngineProvider {
    base_url: String,
    timeout: Duration,
}

impl HttpEngineProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl EngineProvider for HttpEngineProvider {
    async fn acquire(&self, script: Script) -> Result<Arc<dyn RecognitionEngine>> {
        let http = reqwest::Client::builder()
            .user_agent("news-verify/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(self.timeout)
            .build()
            .context("building ocr http client")?;

        let health = format!("{}/health", self.base_url);
        http.get(&health)
            .send()
            .await
            .with_context(|| format!("ocr backend unreachable at {health}"))?
            .error_for_status()
            .context("ocr backend health check failed")?;

        debug!(target: "ocr", lang = script.lang_code(), "ocr engine acquired");
        Ok(Arc::new(HttpEngine {
            http,
            url: format!("{}/recognize", self.base_url),
            script,
        }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

struct HttpEngine {
    http: reqwest::Client,
    url: String,
    script: Script,
}

#[derive(Deserialize)]
struct RecognizeResp {
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: f32,
}

#[async_trait]
impl RecognitionEngine for HttpEngine {
    async fn recognize(&self, image: &[u8]) -> Result<RecognitionResult> {
        let resp = self
            .http
            .post(&self.url)
            .query(&[("lang", self.script.lang_code())])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .context("ocr recognize request failed")?
            .error_for_status()
            .context("ocr recognize returned an error status")?;

        let body: RecognizeResp = resp.json().await.context("parsing ocr response")?;
        Ok(RecognitionResult {
            text: body.text,
            confidence: body.confidence.clamp(0.0, 100.0),
            script: self.script,
        })
    }

    async fn release(&self) -> Result<()> {
        // Stateless backend; nothing held remotely.
        Ok(())
    }
}

// ------------------------------------------------------------
// Mock provider
// ------------------------------------------------------------

/// Deterministic provider for tests/local runs. Counts acquisitions and
/// releases so lifecycle behaviour can be asserted.
#[derive(Clone)]
pub struct MockEngineProvider {
    state: Arc<MockState>,
}

struct MockState {
    latin: Mutex<(String, f32)>,
    malayalic: Mutex<(String, f32)>,
    failing: Mutex<Option<Script>>,
    fail_recognize: AtomicBool,
    acquire_delay: Mutex<Duration>,
    acquisitions: AtomicUsize,
    releases: AtomicUsize,
}

impl MockEngineProvider {
    /// `(text, confidence)` returned by the Latin and Malayalic engines.
    pub fn new(latin: (&str, f32), malayalic: (&str, f32)) -> Self {
        Self {
            state: Arc::new(MockState {
                latin: Mutex::new((latin.0.to_string(), latin.1)),
                malayalic: Mutex::new((malayalic.0.to_string(), malayalic.1)),
                failing: Mutex::new(None),
                fail_recognize: AtomicBool::new(false),
                acquire_delay: Mutex::new(Duration::ZERO),
                acquisitions: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            }),
        }
    }

    /// Make acquisition of `script` fail until reset with `None`.
    pub fn set_failing(&self, script: Option<Script>) {
        *lock(&self.state.failing) = script;
    }

    pub fn set_fail_recognize(&self, on: bool) {
        self.state.fail_recognize.store(on, Ordering::SeqCst);
    }

    pub fn set_acquire_delay(&self, delay: Duration) {
        *lock(&self.state.acquire_delay) = delay;
    }

    pub fn set_output(&self, script: Script, text: &str, confidence: f32) {
        let slot = match script {
            Script::Latin => &self.state.latin,
            Script::Malayalic => &self.state.malayalic,
        };
        *lock(slot) = (text.to_string(), confidence);
    }

    /// Successful engine acquisitions so far.
    pub fn acquisitions(&self) -> usize {
        self.state.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineProvider for MockEngineProvider {
    async fn acquire(&self, script: Script) -> Result<Arc<dyn RecognitionEngine>> {
        let delay = *lock(&self.state.acquire_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *lock(&self.state.failing) == Some(script) {
            return Err(anyhow!("mock acquisition failure for {:?}", script));
        }
        self.state.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockEngine {
            state: self.state.clone(),
            script,
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct MockEngine {
    state: Arc<MockState>,
    script: Script,
}

#[async_trait]
impl RecognitionEngine for MockEngine {
    async fn recognize(&self, _image: &[u8]) -> Result<RecognitionResult> {
        if self.state.fail_recognize.load(Ordering::SeqCst) {
            return Err(anyhow!("mock recognition failure"));
        }
        let (text, confidence) = match self.script {
            Script::Latin => lock(&self.state.latin).clone(),
            Script::Malayalic => lock(&self.state.malayalic).clone(),
        };
        Ok(RecognitionResult {
            text,
            confidence,
            script: self.script,
        })
    }

    async fn release(&self) -> Result<()> {
        self.state.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poison) => poison.into_inner(),
    }
}
