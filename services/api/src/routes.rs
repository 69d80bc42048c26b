use crate::infra::{deserialize_optional_mode, AppState};
use crate::reporting::DashboardPayload;
use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use refi_ready::error::AppError;
use refi_ready::workflows::ingest::RawSources;
use refi_ready::workflows::refinance::{
    ClassificationMode, DataQualityReport, EligibilityEngine, ResolveError, ResolveRequest,
    ResolvedAudience,
};
use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DashboardQuery {
    #[serde(default)]
    pub(crate) top_n: Option<usize>,
    #[serde(default)]
    pub(crate) force_raw: bool,
    #[serde(default, deserialize_with = "deserialize_optional_mode")]
    pub(crate) mode: Option<ClassificationMode>,
}

/// The four raw tables supplied inline as CSV text.
#[derive(Debug, Deserialize)]
pub(crate) struct EvaluateRequest {
    pub(crate) borrower_information: String,
    pub(crate) loan_information: String,
    pub(crate) market_equity: String,
    pub(crate) borrower_engagement: String,
    #[serde(default)]
    pub(crate) top_n: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_optional_mode")]
    pub(crate) mode: Option<ClassificationMode>,
}

pub(crate) fn router() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/dashboard", get(dashboard_endpoint))
        .route("/api/v1/dashboard/evaluate", post(evaluate_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn validate_top_n(requested: Option<usize>, default: usize) -> Result<usize, AppError> {
    match requested {
        Some(0) => Err(AppError::InvalidRequest(
            "top_n must be at least 1".to_string(),
        )),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

/// Resolves the audience off the async runtime. A fetch that outlives the
/// configured timeout is reported as unavailable data.
pub(crate) async fn dashboard_endpoint(
    Extension(state): Extension<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardPayload>, AppError> {
    let top_n = validate_top_n(query.top_n, state.top_n)?;
    let request = ResolveRequest {
        mode: query.mode.unwrap_or_default(),
        force_raw: query.force_raw,
    };

    let resolver = state.resolver.clone();
    let task = tokio::task::spawn_blocking(move || resolver.resolve(request));

    let resolved = match tokio::time::timeout(state.fetch_timeout, task).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_error)) => return Err(AppError::Internal(join_error.to_string())),
        Err(_) => {
            warn!(timeout_secs = state.fetch_timeout.as_secs(), "audience fetch timed out");
            return Err(ResolveError::timed_out(state.fetch_timeout).into());
        }
    };

    info!(
        data_source = resolved.provenance.label(),
        audience = resolved.audience.len(),
        "dashboard served"
    );
    Ok(Json(DashboardPayload::build(&resolved, top_n, Utc::now())))
}

pub(crate) async fn evaluate_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<EvaluateRequest>,
) -> Result<Json<DashboardPayload>, AppError> {
    let EvaluateRequest {
        borrower_information,
        loan_information,
        market_equity,
        borrower_engagement,
        top_n,
        mode,
    } = payload;
    let top_n = validate_top_n(top_n, state.top_n)?;

    let mut quality = DataQualityReport::new();
    let sources = RawSources::from_readers(
        Cursor::new(borrower_information.into_bytes()),
        Cursor::new(loan_information.into_bytes()),
        Cursor::new(market_equity.into_bytes()),
        Cursor::new(borrower_engagement.into_bytes()),
        &mut quality,
    )?;

    let resolved = ResolvedAudience::from_inline(
        &sources,
        &EligibilityEngine::default(),
        mode.unwrap_or_default(),
        quality,
    );
    Ok(Json(DashboardPayload::build(&resolved, top_n, Utc::now())))
}
