// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod credibility;
pub mod detect;
pub mod metrics;
pub mod ocr;

// Router builder reachable as both `api::router` and `router`.
pub use crate::api::{router, AppState};
pub use crate::ocr::{ArbitrationOutcome, TextRecognizer};

use axum::Router;
use tracing::info;

/// Env switch that mounts `/metrics` on the app router.
pub const ENV_METRICS_ROUTE: &str = "METRICS_ROUTE";

/// Build the full in-process app: config → state → router (+ `/metrics` when
/// `METRICS_ROUTE=1`). Used by the binary and by integration tests.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = config::AppConfig::load_default()?;
    let state = AppState::from_config(&cfg).await?;
    app_with_state(state)
}

/// Same as [`app`] but with caller-provided state.
pub fn app_with_state(state: AppState) -> anyhow::Result<Router> {
    let mut router = api::router(state);
    if std::env::var(ENV_METRICS_ROUTE).ok().as_deref() == Some("1") {
        let m = crate::metrics::Metrics::global()?;
        router = router.merge(m.router());
        info!("metrics route enabled");
    }
    Ok(router)
}

/// Short SHA-256 prefix used to correlate log lines without logging payloads.
pub(crate) fn anon_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
