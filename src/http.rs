//! HTTP surface: routes, handlers, and response shaping.

use crate::error::ConvertError;
use crate::request::{ConversionRequest, ConvertRequestBody};
use crate::service::{ConversionService, RenderedPdf, Stats};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversionService>,
}

impl AppState {
    pub fn new(service: Arc<ConversionService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub stats: Stats,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Worst-case growth of content once JSON-encoded (`\u0001` for one byte).
const JSON_ESCAPE_FACTOR: u64 = 6;

/// Slack for the rest of the JSON body (field names, options).
const REQUEST_BODY_OVERHEAD: u64 = 1024 * 1024;

/// Largest HTTP body accepted for a given content limit.
///
/// Any content up to `max_file_size` fits in a body of this size however it
/// is escaped, so the orchestrator's exact check decides.
pub fn request_body_limit(max_file_size: u64) -> usize {
    let limit = max_file_size
        .saturating_mul(JSON_ESCAPE_FACTOR)
        .saturating_add(REQUEST_BODY_OVERHEAD);
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// Builds the application router.
///
/// The request body limit is derived from the service's `max_file_size`.
pub fn build_router(state: AppState) -> Router {
    let body_limit = request_body_limit(state.service.limits().max_file_size);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ]);

    let api = Router::new()
        .route("/convert-to-pdf", post(convert_to_pdf))
        .route("/convert-markdown-to-pdf", post(convert_markdown_to_pdf))
        .route("/stats", get(stats));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unwraps the JSON body. A body cut off by the size limit is reported as
/// `PayloadTooLarge`, everything else as `BadRequest`.
fn parse_body(
    body: Result<Json<ConvertRequestBody>, JsonRejection>,
    max_file_size: u64,
) -> Result<ConvertRequestBody, ConvertError> {
    body.map(|Json(body)| body).map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ConvertError::PayloadTooLarge {
                size: None,
                limit: max_file_size,
            }
        } else {
            ConvertError::BadRequest(format!("Invalid request format: {}", rejection.body_text()))
        }
    })
}

/// Converts markdown or Typst content.
async fn convert_to_pdf(
    State(state): State<AppState>,
    body: Result<Json<ConvertRequestBody>, JsonRejection>,
) -> Result<Response, ConvertError> {
    let max_file_size = state.service.limits().max_file_size;
    let request = ConversionRequest::from_body(parse_body(body, max_file_size)?)?;
    let pdf = state.service.convert(request).await?;
    Ok(pdf_response(pdf))
}

/// Converts markdown content only.
async fn convert_markdown_to_pdf(
    State(state): State<AppState>,
    body: Result<Json<ConvertRequestBody>, JsonRejection>,
) -> Result<Response, ConvertError> {
    let max_file_size = state.service.limits().max_file_size;
    let request = ConversionRequest::markdown_from_body(parse_body(body, max_file_size)?)?;
    let pdf = state.service.convert(request).await?;
    Ok(pdf_response(pdf))
}

fn pdf_response(pdf: RenderedPdf) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", pdf.filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"document.pdf\""));
    let length = pdf.bytes.len();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        pdf.bytes,
    )
        .into_response()
}

async fn stats(State(state): State<AppState>) -> Json<Stats> {
    Json(state.service.stats())
}

/// Canary render; 503 when the renderer is broken.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let report = state.service.health_check().await;
    let (status, label) = if report.healthy {
        (StatusCode::OK, "healthy")
    } else {
        tracing::warn!("Health check failed: {}", report.message);
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let body = HealthResponse {
        status: label,
        stats: state.service.stats(),
        timestamp: Utc::now().to_rfc3339(),
        message: Some(report.message),
    };
    (status, Json(body))
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "Markdown to PDF Service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "convert": "POST /api/convert-to-pdf",
            "convert-md": "POST /api/convert-markdown-to-pdf",
            "health": "GET /health",
            "stats": "GET /api/stats",
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_body_limit() {
        assert_eq!(request_body_limit(10), 60 + 1024 * 1024);
        assert_eq!(request_body_limit(u64::MAX), usize::MAX);
    }
}
