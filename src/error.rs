//! Conversion error taxonomy and its HTTP mapping.

use crate::template::TemplateError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Failures of a single render invocation.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Typst compilation failed: {0}")]
    Failed(String),

    #[error("Generated PDF is empty")]
    EmptyOutput,

    #[error("PDF generation did not finish within {}ms", .after.as_millis())]
    Cancelled { after: Duration },
}

/// Everything that can end a conversion request.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{0}")]
    BadRequest(String),

    /// `size` is unknown when the HTTP body was cut off before parsing.
    #[error("Content exceeds maximum file size limit of {limit} bytes")]
    PayloadTooLarge { size: Option<usize>, limit: u64 },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ConvertError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Render(RenderError::Cancelled { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_client_error() {
            tracing::warn!(status = status.as_u16(), "Conversion rejected: {}", self);
        } else {
            tracing::error!(status = status.as_u16(), "Conversion failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ConvertError::BadRequest("missing".into()), StatusCode::BAD_REQUEST),
            (
                ConvertError::PayloadTooLarge {
                    size: Some(11),
                    limit: 10,
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                ConvertError::Template(TemplateError::MissingPlaceholder),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                RenderError::Failed("boom".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (RenderError::EmptyOutput.into(), StatusCode::INTERNAL_SERVER_ERROR),
            (
                RenderError::Cancelled {
                    after: Duration::from_secs(30),
                }
                .into(),
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{error}");
        }
    }

    #[test]
    fn test_client_errors() {
        assert!(ConvertError::BadRequest("x".into()).is_client_error());
        assert!(!ConvertError::from(RenderError::EmptyOutput).is_client_error());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ConvertError::from(RenderError::Failed("unknown variable".into())).to_string(),
            "Typst compilation failed: unknown variable"
        );
        assert_eq!(
            ConvertError::from(TemplateError::MissingPlaceholder).to_string(),
            "skeleton template must contain {{Placeholder Markdown}} placeholder"
        );
    }
}
