// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

// Build full in-process app (includes /metrics when gated via env).
async fn build_app() -> Router {
    news_verify::app()
        .await
        .expect("app() should build Router in tests")
}

// Ensure the metrics route is mounted and engines are mocked for this process.
fn set_metrics_env() {
    std::env::set_var("METRICS_ROUTE", "1");
    std::env::set_var("OCR_TEST_MODE", "mock");
    std::env::set_var("CLASSIFIER_TEST_MODE", "mock");
}

async fn scrape(app: &Router) -> String {
    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    String::from_utf8(body.to_vec()).unwrap()
}

#[serial_test::serial]
#[tokio::test]
async fn metrics_endpoint_contains_domain_gauge() {
    set_metrics_env();
    let app = build_app().await;
    let text = scrape(&app).await;
    assert!(
        text.contains("credibility_domains"),
        "metrics exposition missing 'credibility_domains'\n{text}"
    );
}

#[serial_test::serial]
#[tokio::test]
async fn ocr_and_classifier_calls_are_counted() {
    set_metrics_env();
    let app = build_app().await;

    let r = app
        .clone()
        .oneshot(
            Request::post("/analyze/image")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"image":"data:image/png;base64,iVBORw0K"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(r.status(), StatusCode::OK);

    let text = scrape(&app).await;
    for needle in [
        "ocr_requests_total",
        "ocr_detect_ms",
        "classifier_requests_total",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
