use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::ingest::IngestError;
use crate::workflows::refinance::ResolveError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Serialization(serde_json::Error),
    Resolve(ResolveError),
    Ingest(IngestError),
    InvalidRequest(String),
    Internal(String),
    Verification(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Serialization(err) => write!(f, "serialization error: {}", err),
            AppError::Resolve(err) => write!(f, "{}", err),
            AppError::Ingest(err) => write!(f, "invalid input: {}", err),
            AppError::InvalidRequest(detail) => write!(f, "invalid request: {}", detail),
            AppError::Internal(detail) => write!(f, "internal error: {}", detail),
            AppError::Verification(detail) => write!(f, "verification failed: {}", detail),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Serialization(err) => Some(err),
            AppError::Resolve(err) => Some(err),
            AppError::Ingest(err) => Some(err),
            AppError::InvalidRequest(_) | AppError::Internal(_) | AppError::Verification(_) => {
                None
            }
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Resolve(ResolveError::DataUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Ingest(_) | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Serialization(_)
            | AppError::Internal(_)
            | AppError::Verification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<ResolveError> for AppError {
    fn from(value: ResolveError) -> Self {
        Self::Resolve(value)
    }
}

impl From<IngestError> for AppError {
    fn from(value: IngestError) -> Self {
        Self::Ingest(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::refinance::domain::RawTable;
    use std::time::Duration;

    #[test]
    fn data_unavailable_maps_to_service_unavailable() {
        let error = AppError::from(ResolveError::timed_out(Duration::from_secs(3)));
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            error.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn bad_input_maps_to_bad_request() {
        let error = AppError::from(IngestError::MissingColumn {
            table: RawTable::LoanInformation,
            column: "borrower_id",
        });
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().contains("loan information"));
        assert_eq!(
            AppError::Internal("worker panicked".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
