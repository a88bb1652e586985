use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::mail::MailError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Short label used for the `error.kind` metric attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Store(_) => "store",
            AppError::File(_) => "file",
            AppError::Csv(_) => "csv",
            AppError::Mail(_) => "mail",
            AppError::Config(_) => "config",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub(crate) fn current_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::Validation(msg) => msg.clone(),
            other => {
                tracing::error!(error = %other, error.kind = other.kind(), "Report invocation failed");
                "Internal server error".to_string()
            }
        };

        let body = if let Some(trace_id) = current_trace_id() {
            json!({
                "error": error_message,
                "status": status.as_u16(),
                "trace_id": trace_id,
            })
        } else {
            json!({
                "error": error_message,
                "status": status.as_u16(),
            })
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = AppError::Validation("email.to must not be empty".to_string());
        assert_eq!(
            error.to_string(),
            "Validation error: email.to must not be empty"
        );
        assert_eq!(error.kind(), "validation");
    }

    #[test]
    fn test_store_error_wraps_source() {
        let error: AppError = StoreError::Pagination("cursor did not advance".into()).into();
        assert_eq!(
            error.to_string(),
            "Store error: pagination failed: cursor did not advance"
        );
    }

    #[test]
    fn test_mail_error_wraps_source() {
        let error: AppError = MailError::Smtp("554 rejected".into()).into();
        assert_eq!(error.to_string(), "Mail error: SMTP error: 554 rejected");
        assert_eq!(error.kind(), "mail");
    }

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (
                AppError::Validation("test".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Store(StoreError::Pagination("test".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::File(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Mail(MailError::Build("test".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Config("test".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            assert_eq!(error.status_code(), expected_status);
            assert_eq!(error.into_response().status(), expected_status);
        }
    }
}
