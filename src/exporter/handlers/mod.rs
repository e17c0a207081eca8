use crate::diagnostics::DiagnosticsError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tokio::task::JoinError;

mod health;
mod heapdump;
mod jvmdiagnostics;
mod metrics;

pub use self::health::health;
pub use self::heapdump::{heapdump, heapdump_live, trigger};
pub use self::jvmdiagnostics::{class_histogram, class_histogram_json, thread_dump};
pub use self::metrics::metrics;

pub const HEAPDUMP_UNSUPPORTED: &str = "Heapdumping is not supported in this environment.";
pub const HEAPDUMP_IN_PROGRESS: &str = "Only a single heapdump can be requested at a time.";
pub const NO_HANDLERS: &str = "No handlers defined.";
pub const HEAPDUMP_TRIGGERED: &str = "Heapdump triggered.";
pub const DIAGNOSTICS_UNSUPPORTED: &str =
    "JVM diagnostics is not supported for the target process. jcmd from a JDK 8+ is required.";

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    let text: String = text.into();
    (status, Json(json!({ "message": text }))).into_response()
}

fn heapdump_error(error: &DiagnosticsError) -> Response {
    match error {
        DiagnosticsError::Unsupported => message(StatusCode::NOT_FOUND, HEAPDUMP_UNSUPPORTED),
        DiagnosticsError::Conflict => message(StatusCode::TOO_MANY_REQUESTS, HEAPDUMP_IN_PROGRESS),
        DiagnosticsError::NotConfigured => message(StatusCode::NOT_FOUND, NO_HANDLERS),
        other => message(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

fn diagnostics_error(error: &DiagnosticsError) -> Response {
    match error {
        DiagnosticsError::Unsupported => message(StatusCode::NOT_FOUND, DIAGNOSTICS_UNSUPPORTED),
        other => message(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

/// Fold a panicked or cancelled blocking task into the diagnostics error.
fn joined<T>(
    result: Result<Result<T, DiagnosticsError>, JoinError>,
) -> Result<T, DiagnosticsError> {
    result.unwrap_or_else(|e| Err(DiagnosticsError::capture(format!("task failed: {e}"))))
}
