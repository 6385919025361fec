//! news-verify: Binary Entrypoint
//! Boots the Axum HTTP server, wiring config, shared state, and middleware.

use news_verify::{app_with_state, config::AppConfig, AppState};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - NEWS_VERIFY_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("NEWS_VERIFY_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ocr=info,credibility=info,news_verify=info,warn"));

    // The runtime may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    // Initialize dev tracing early (no-op in production).
    enable_dev_tracing();

    let cfg = AppConfig::load_default()?;
    let state = AppState::from_config(&cfg).await?;

    // Release OCR engines on shutdown.
    let recognizer = state.recognizer();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            recognizer.terminate().await;
        }
    });

    let router = app_with_state(state)?;
    Ok(router.into())
}
