use crate::audit::export::ExportError;
use crate::audit::{AccessorError, OrchestratorError, PerformanceError, ReportError};
use crate::config::ConfigError;
use crate::placeholder::PlaceholderError;
use crate::telemetry::TelemetryError;
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
    Content(AccessorError),
    Performance(PerformanceError),
    Audit(OrchestratorError),
    Report(ReportError),
    Export(ExportError),
    Placeholder(PlaceholderError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Content(err) => write!(f, "content error: {}", err),
            AppError::Performance(err) => write!(f, "performance client error: {}", err),
            AppError::Audit(err) => write!(f, "audit error: {}", err),
            AppError::Report(err) => write!(f, "report error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
            AppError::Placeholder(err) => write!(f, "placeholder error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Content(err) => Some(err),
            AppError::Performance(err) => Some(err),
            AppError::Audit(err) => Some(err),
            AppError::Report(err) => Some(err),
            AppError::Export(err) => Some(err),
            AppError::Placeholder(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Placeholder(_) | AppError::Report(ReportError::Comparison(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Audit(OrchestratorError::RunConflict { .. }) => StatusCode::CONFLICT,
            AppError::Audit(
                OrchestratorError::RunNotFound(_) | OrchestratorError::RequestNotFound(_),
            ) => StatusCode::NOT_FOUND,
            AppError::Content(_) | AppError::Performance(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Audit(_)
            | AppError::Report(_)
            | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

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

impl From<AccessorError> for AppError {
    fn from(value: AccessorError) -> Self {
        Self::Content(value)
    }
}

impl From<PerformanceError> for AppError {
    fn from(value: PerformanceError) -> Self {
        Self::Performance(value)
    }
}

impl From<OrchestratorError> for AppError {
    fn from(value: OrchestratorError) -> Self {
        Self::Audit(value)
    }
}

impl From<ReportError> for AppError {
    fn from(value: ReportError) -> Self {
        Self::Report(value)
    }
}

impl From<ExportError> for AppError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

impl From<PlaceholderError> for AppError {
    fn from(value: PlaceholderError) -> Self {
        Self::Placeholder(value)
    }
}
