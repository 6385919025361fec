use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::credibility::{
    self, extract_registrable_domain, AggregationPolicy, ColumnAliases, CredibilityReport,
    DatasetError, DomainCredibility, SortKey, SortOrder,
};
use crate::detect::{build_classifier, ClassifyRequest, DynClassifier, Verdict};
use crate::ocr::{build_provider, ArbitrationOutcome, ImageInput, OcrError, TextRecognizer};

#[derive(Clone)]
pub struct AppState {
    recognizer: Arc<TextRecognizer>,
    classifier: DynClassifier,
    report: Arc<RwLock<CredibilityReport>>,
    aliases: Arc<ColumnAliases>,
    policy: AggregationPolicy,
    max_upload_bytes: usize,
}

/// Upload cap when none is configured.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

impl AppState {
    pub fn new(
        recognizer: Arc<TextRecognizer>,
        classifier: DynClassifier,
        report: CredibilityReport,
        aliases: ColumnAliases,
    ) -> Self {
        let policy = *report.policy();
        gauge!("credibility_domains").set(report.domains.len() as f64);
        Self {
            recognizer,
            classifier,
            report: Arc::new(RwLock::new(report)),
            aliases: Arc::new(aliases),
            policy,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Override the request body cap for dataset uploads.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Wire everything from config. A broken startup dataset is logged and
    /// replaced by an empty report rather than failing the boot.
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let recognizer = Arc::new(TextRecognizer::new(build_provider(&cfg.ocr)));
        if cfg.ocr.eager_start && !recognizer.ensure_ready().await {
            warn!(target: "ocr", "eager engine start failed; will retry on first request");
        }

        let classifier = build_classifier(&cfg.classifier)?;
        let aliases = cfg.credibility.aliases();
        let policy = cfg.credibility.policy;

        let report = match &cfg.credibility.dataset_path {
            Some(path) => match credibility::report_from_path(path, &aliases, &policy) {
                Ok(r) => r,
                Err(e) => {
                    warn!(target: "credibility", path = %path.display(), error = %e, "startup dataset not loaded");
                    CredibilityReport::empty(policy)
                }
            },
            None => CredibilityReport::empty(policy),
        };

        info!(
            ocr = recognizer.provider_name(),
            classifier = classifier.name(),
            domains = report.domains.len(),
            "app state ready"
        );
        Ok(Self::new(recognizer, classifier, report, aliases)
            .with_max_upload_bytes(cfg.credibility.max_upload_bytes))
    }

    pub fn recognizer(&self) -> Arc<TextRecognizer> {
        self.recognizer.clone()
    }

    fn read_report(&self) -> RwLockReadGuard<'_, CredibilityReport> {
        match self.report.read() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    fn write_report(&self) -> RwLockWriteGuard<'_, CredibilityReport> {
        match self.report.write() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ocr", post(ocr))
        .route("/analyze/text", post(analyze_text))
        .route("/analyze/url", post(analyze_url))
        .route("/analyze/image", post(analyze_image))
        .route("/credibility", get(credibility_report))
        .route(
            "/credibility/upload",
            post(credibility_upload).layer(upload_limit),
        )
        .route("/credibility/articles", post(credibility_add_article))
        .route("/credibility/domain", get(credibility_domain))
        .route("/admin/ocr/release", post(admin_ocr_release))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: msg.into() })).into_response()
}

// ------------------------------------------------------------
// OCR
// ------------------------------------------------------------

#[derive(Deserialize)]
struct ImageReq {
    image: String,
}

#[derive(Serialize)]
struct OcrResp {
    #[serde(flatten)]
    outcome: ArbitrationOutcome,
    /// Why the outcome is empty, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    degraded: Option<String>,
}

async fn run_ocr(state: &AppState, image: &str) -> OcrResp {
    let input = ImageInput::from_text(image);
    match state.recognizer.try_detect_text(&input).await {
        Ok(outcome) => OcrResp {
            outcome,
            degraded: None,
        },
        Err(e) => {
            warn!(target: "ocr", error = %e, "ocr request degraded");
            OcrResp {
                outcome: ArbitrationOutcome::empty(),
                degraded: Some(degraded_reason(&e).to_string()),
            }
        }
    }
}

fn degraded_reason(e: &OcrError) -> &'static str {
    match e {
        OcrError::EngineUnavailable => "engine_unavailable",
        OcrError::InvalidImage(_) => "invalid_image",
        OcrError::Recognition(_) => "recognition_failed",
    }
}

async fn ocr(State(state): State<AppState>, Json(body): Json<ImageReq>) -> Json<OcrResp> {
    Json(run_ocr(&state, &body.image).await)
}

// ------------------------------------------------------------
// Classifier forwarding
// ------------------------------------------------------------

#[derive(Deserialize)]
struct TextReq {
    text: String,
}

#[derive(Deserialize)]
struct UrlReq {
    url: String,
}

#[derive(Serialize)]
struct AnalyzeResp {
    verdict: Verdict,
    classifier: &'static str,
}

#[derive(Serialize)]
struct AnalyzeUrlResp {
    verdict: Verdict,
    classifier: &'static str,
    domain: String,
    credibility: Option<DomainCredibility>,
}

#[derive(Serialize)]
struct AnalyzeImageResp {
    ocr: OcrResp,
    verdict: Option<Verdict>,
    classifier: &'static str,
}

async fn classify(state: &AppState, req: &ClassifyRequest) -> Result<Verdict, Response> {
    counter!("classifier_requests_total").increment(1);
    state.classifier.classify(req).await.map_err(|e| {
        counter!("classifier_errors_total").increment(1);
        warn!(classifier = state.classifier.name(), error = %format!("{e:#}"), "classifier call failed");
        error_response(StatusCode::BAD_GATEWAY, format!("classifier unavailable: {e}"))
    })
}

async fn analyze_text(State(state): State<AppState>, Json(body): Json<TextReq>) -> Response {
    let text = body.text.trim();
    if text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "text must not be empty");
    }
    match classify(&state, &ClassifyRequest::text(text)).await {
        Ok(verdict) => Json(AnalyzeResp {
            verdict,
            classifier: state.classifier.name(),
        })
        .into_response(),
        Err(resp) => resp,
    }
}

async fn analyze_url(State(state): State<AppState>, Json(body): Json<UrlReq>) -> Response {
    let domain = extract_registrable_domain(Some(&body.url));
    if credibility::domain::is_sentinel(&domain) {
        return error_response(StatusCode::BAD_REQUEST, format!("unusable url ({domain})"));
    }
    let credibility = state.read_report().domain(&domain).cloned();
    match classify(&state, &ClassifyRequest::url(body.url.trim())).await {
        Ok(verdict) => Json(AnalyzeUrlResp {
            verdict,
            classifier: state.classifier.name(),
            domain,
            credibility,
        })
        .into_response(),
        Err(resp) => resp,
    }
}

async fn analyze_image(State(state): State<AppState>, Json(body): Json<ImageReq>) -> Response {
    let ocr = run_ocr(&state, &body.image).await;
    if ocr.outcome.text.is_empty() {
        return Json(AnalyzeImageResp {
            ocr,
            verdict: None,
            classifier: state.classifier.name(),
        })
        .into_response();
    }
    match classify(&state, &ClassifyRequest::text(ocr.outcome.text.clone())).await {
        Ok(verdict) => Json(AnalyzeImageResp {
            ocr,
            verdict: Some(verdict),
            classifier: state.classifier.name(),
        })
        .into_response(),
        Err(resp) => resp,
    }
}

// ------------------------------------------------------------
// Credibility
// ------------------------------------------------------------

#[derive(Deserialize)]
struct SortQuery {
    #[serde(default)]
    sort: Option<SortKey>,
    #[serde(default)]
    order: Option<SortOrder>,
}

async fn credibility_report(
    State(state): State<AppState>,
    Query(q): Query<SortQuery>,
) -> Json<CredibilityReport> {
    let mut report = state.read_report().clone();
    report.sort_by(
        q.sort.unwrap_or(SortKey::RealPercentage),
        q.order.unwrap_or_default(),
    );
    Json(report)
}

fn dataset_error_response(e: &DatasetError) -> Response {
    let status = match e {
        DatasetError::MissingColumns(_) | DatasetError::Empty | DatasetError::Csv(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        DatasetError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

/// Replace the current report with one built from the posted CSV.
async fn credibility_upload(State(state): State<AppState>, body: String) -> Response {
    match credibility::report_from_reader(body.as_bytes(), &state.aliases, &state.policy) {
        Ok(report) => {
            gauge!("credibility_domains").set(report.domains.len() as f64);
            *state.write_report() = report.clone();
            Json(report).into_response()
        }
        Err(e) => {
            warn!(target: "credibility", error = %e, "dataset upload rejected");
            dataset_error_response(&e)
        }
    }
}

#[derive(Deserialize)]
struct AddArticleReq {
    url: String,
    is_real: bool,
}

#[derive(Serialize)]
struct AddArticleResp {
    domain: DomainCredibility,
    visible: bool,
    real_news: u64,
    fake_news: u64,
    total_articles: u64,
}

async fn credibility_add_article(
    State(state): State<AppState>,
    Json(body): Json<AddArticleReq>,
) -> Response {
    let mut report = state.write_report();
    let Some(domain) = report.add_article(&body.url, body.is_real) else {
        return error_response(StatusCode::BAD_REQUEST, "url does not contain a usable domain");
    };
    gauge!("credibility_domains").set(report.domains.len() as f64);
    let visible = report.domain(&domain.domain).is_some();
    Json(AddArticleResp {
        visible,
        real_news: report.real_news,
        fake_news: report.fake_news,
        total_articles: report.total_articles,
        domain,
    })
    .into_response()
}

#[derive(Serialize)]
struct DomainLookup {
    domain: String,
    credibility: Option<DomainCredibility>,
}

async fn credibility_domain(
    State(state): State<AppState>,
    Query(q): Query<UrlReq>,
) -> Json<DomainLookup> {
    let domain = extract_registrable_domain(Some(&q.url));
    let credibility = state.read_report().domain(&domain).cloned();
    Json(DomainLookup {
        domain,
        credibility,
    })
}

async fn admin_ocr_release(State(state): State<AppState>) -> &'static str {
    state.recognizer.terminate().await;
    "released"
}
