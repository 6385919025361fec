// src/ocr/mod.rs
//! Dual-script text recognition.
//!
//! [`TextRecognizer`] owns one Latin and one Malayalic engine handle. Engines
//! are acquired lazily on first use; concurrent first callers share a single
//! in-flight acquisition. Detection runs both engines on the same image and
//! keeps the better transcription (see [`arbitrate`]).
//!
//! Failures never reach the caller of [`TextRecognizer::detect_text`]: they are
//! logged and the zero-confidence empty outcome is returned instead.

pub mod arbitrate;
pub mod engine;
pub mod image;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use crate::ocr::arbitrate::{arbitrate, ArbitrationOutcome};
pub use crate::ocr::engine::{
    build_provider, DynEngineProvider, EngineProvider, HttpEngineProvider, MockEngineProvider,
    RecognitionEngine, RecognitionResult, Script,
};
pub use crate::ocr::image::ImageInput;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcrError {
    #[error("recognition engines unavailable")]
    EngineUnavailable,
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("recognition failed: {0}")]
    Recognition(String),
}

/// Both engine handles; present together or not at all.
#[derive(Clone)]
struct Engines {
    latin: Arc<dyn RecognitionEngine>,
    malayalic: Arc<dyn RecognitionEngine>,
}

type PendingAcquire = Shared<BoxFuture<'static, Option<Engines>>>;

enum Slot {
    Empty,
    Acquiring {
        generation: u64,
        pending: PendingAcquire,
    },
    Ready(Engines),
}

struct SlotState {
    slot: Slot,
    generation: u64,
}

/// Explicit owner of the two recognition engines.
pub struct TextRecognizer {
    provider: DynEngineProvider,
    state: Mutex<SlotState>,
}

impl TextRecognizer {
    /// Engines are not touched until the first `ensure_ready` / `detect_text`.
    pub fn new(provider: DynEngineProvider) -> Self {
        Self {
            provider,
            state: Mutex::new(SlotState {
                slot: Slot::Empty,
                generation: 0,
            }),
        }
    }

    /// Build and eagerly acquire. Acquisition failure is logged, not returned.
    pub async fn start(provider: DynEngineProvider) -> Self {
        let rec = Self::new(provider);
        rec.ensure_ready().await;
        rec
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// True once both engines are held.
    pub fn is_ready(&self) -> bool {
        matches!(self.lock().slot, Slot::Ready(_))
    }

    /// Acquire both engines unless already held. Callers arriving while an
    /// acquisition is in flight await that same acquisition. Returns whether
    /// the engines are ready afterwards.
    pub async fn ensure_ready(&self) -> bool {
        self.engines().await.is_some()
    }

    async fn engines(&self) -> Option<Engines> {
        let (generation, pending) = {
            let mut st = self.lock();
            let in_flight = match &st.slot {
                Slot::Ready(e) => return Some(e.clone()),
                Slot::Acquiring {
                    generation,
                    pending,
                } => Some((*generation, pending.clone())),
                Slot::Empty => None,
            };
            match in_flight {
                Some(p) => p,
                None => {
                    st.generation += 1;
                    let generation = st.generation;
                    let pending = acquire_pair(self.provider.clone()).boxed().shared();
                    st.slot = Slot::Acquiring {
                        generation,
                        pending: pending.clone(),
                    };
                    (generation, pending)
                }
            }
        };

        let engines = pending.await;

        let mut st = self.lock();
        let current = matches!(
            &st.slot,
            Slot::Acquiring { generation: g, .. } if *g == generation
        );
        if current {
            st.slot = match &engines {
                Some(e) => Slot::Ready(e.clone()),
                None => Slot::Empty,
            };
        }
        engines
    }

    /// Recognize text, degrading every failure to the empty outcome.
    pub async fn detect_text(&self, image: &ImageInput) -> ArbitrationOutcome {
        match self.try_detect_text(image).await {
            Ok(out) => out,
            Err(e) => {
                warn!(target: "ocr", error = %e, "text detection degraded to empty result");
                ArbitrationOutcome::empty()
            }
        }
    }

    /// Same as [`detect_text`](Self::detect_text) but tells callers why nothing was found.
    pub async fn try_detect_text(&self, image: &ImageInput) -> Result<ArbitrationOutcome, OcrError> {
        let t0 = Instant::now();
        counter!("ocr_requests_total").increment(1);

        let bytes = image.to_bytes()?;
        let id = crate::anon_hash(&bytes);

        let Some(engines) = self.engines().await else {
            counter!("ocr_unavailable_total").increment(1);
            return Err(OcrError::EngineUnavailable);
        };

        let (latin, malayalic) = tokio::join!(
            engines.latin.recognize(&bytes),
            engines.malayalic.recognize(&bytes)
        );
        let (latin, malayalic) = match (latin, malayalic) {
            (Ok(l), Ok(m)) => (l, m),
            (Err(e), _) | (_, Err(e)) => {
                counter!("ocr_recognition_errors_total").increment(1);
                return Err(OcrError::Recognition(format!("{e:#}")));
            }
        };
        debug!(
            target: "ocr",
            %id,
            latin_conf = latin.confidence,
            malayalic_conf = malayalic.confidence,
            "both passes finished"
        );

        let out = arbitrate(latin, malayalic);
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ocr_detect_ms").record(ms);
        info!(
            target: "ocr",
            %id,
            script = ?out.chosen_script,
            confidence = out.confidence,
            chars = out.text.chars().count(),
            "text detected"
        );
        Ok(out)
    }

    /// Release both engines if held. Safe to call repeatedly; release errors are swallowed.
    pub async fn terminate(&self) {
        let taken = {
            let mut st = self.lock();
            st.generation += 1;
            std::mem::replace(&mut st.slot, Slot::Empty)
        };
        if let Slot::Ready(e) = taken {
            let (l, m) = tokio::join!(e.latin.release(), e.malayalic.release());
            for (script, res) in [(Script::Latin, l), (Script::Malayalic, m)] {
                if let Err(err) = res {
                    debug!(target: "ocr", ?script, error = %err, "engine release failed");
                }
            }
            info!(target: "ocr", "recognition engines released");
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

/// Acquire both engines. If either fails, the other is released and `None` returned.
async fn acquire_pair(provider: DynEngineProvider) -> Option<Engines> {
    let t0 = Instant::now();
    let (latin, malayalic) = tokio::join!(
        provider.acquire(Script::Latin),
        provider.acquire(Script::Malayalic)
    );

    match (latin, malayalic) {
        (Ok(latin), Ok(malayalic)) => {
            info!(
                target: "ocr",
                provider = provider.name(),
                ms = t0.elapsed().as_millis() as u64,
                "recognition engines acquired"
            );
            Some(Engines { latin, malayalic })
        }
        (l, m) => {
            for (script, res) in [(Script::Latin, l), (Script::Malayalic, m)] {
                match res {
                    Ok(engine) => {
                        let _ = engine.release().await;
                    }
                    Err(e) => {
                        warn!(target: "ocr", ?script, error = %format!("{e:#}"), "engine acquisition failed");
                    }
                }
            }
            counter!("ocr_engine_acquire_failures_total").increment(1);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn png() -> ImageInput {
        ImageInput::Bytes(vec![0x89, b'P', b'N', b'G'])
    }

    #[tokio::test]
    async fn concurrent_first_use_acquires_once() {
        let mock = MockEngineProvider::new(("hello world", 80.0), ("", 5.0));
        mock.set_acquire_delay(Duration::from_millis(50));
        let rec = Arc::new(TextRecognizer::new(Arc::new(mock.clone())));

        let a = rec.clone();
        let b = rec.clone();
        let (ra, rb) = tokio::join!(
            async move { a.detect_text(&png()).await },
            async move { b.detect_text(&png()).await }
        );
        assert_eq!(ra.text, "hello world");
        assert_eq!(rb.text, "hello world");
        assert_eq!(mock.acquisitions(), 2, "one acquisition per script");
        assert!(rec.is_ready());
    }

    #[tokio::test]
    async fn failed_acquisition_resets_and_retries() {
        let mock = MockEngineProvider::new(("text", 70.0), ("", 0.0));
        mock.set_failing(Some(Script::Malayalic));
        let rec = TextRecognizer::new(Arc::new(mock.clone()));

        let out = rec.detect_text(&png()).await;
        assert!(out.is_empty());
        assert!(!rec.is_ready());
        // the Latin engine acquired alongside the failed one is released
        assert_eq!(mock.releases(), 1);
        assert_eq!(
            rec.try_detect_text(&png()).await,
            Err(OcrError::EngineUnavailable)
        );

        mock.set_failing(None);
        let out = rec.detect_text(&png()).await;
        assert_eq!(out.text, "text");
        assert!(rec.is_ready());
    }

    #[tokio::test]
    async fn recognition_error_degrades_to_empty() {
        let mock = MockEngineProvider::new(("text", 70.0), ("", 0.0));
        mock.set_fail_recognize(true);
        let rec = TextRecognizer::start(Arc::new(mock.clone())).await;
        assert!(rec.detect_text(&png()).await.is_empty());
        // engines stay acquired
        assert!(rec.is_ready());
    }

    #[tokio::test]
    async fn invalid_image_is_reported() {
        let mock = MockEngineProvider::new(("text", 70.0), ("", 0.0));
        let rec = TextRecognizer::new(Arc::new(mock.clone()));
        let err = rec
            .try_detect_text(&ImageInput::from_text("data:image/png;base64,@@"))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidImage(_)));
        assert_eq!(mock.acquisitions(), 0);
    }

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let mock = MockEngineProvider::new(("x", 60.0), ("", 0.0));
        let rec = TextRecognizer::new(Arc::new(mock.clone()));
        rec.terminate().await; // nothing acquired yet

        assert!(rec.ensure_ready().await);
        rec.terminate().await;
        rec.terminate().await;
        assert_eq!(mock.releases(), 2);
        assert!(!rec.is_ready());

        // next use re-acquires
        assert_eq!(rec.detect_text(&png()).await.text, "x");
        assert_eq!(mock.acquisitions(), 4);
    }

    #[tokio::test]
    async fn picks_malayalam_when_script_confirmed() {
        let mock = MockEngineProvider::new(("noise", 90.0), ("വാർത്ത\nസത്യം", 40.0));
        let rec = TextRecognizer::new(Arc::new(mock));
        let out = rec.detect_text(&png()).await;
        assert_eq!(out.chosen_script, Script::Malayalic);
        assert_eq!(out.text, "വാർത്ത സത്യം");
    }
}
