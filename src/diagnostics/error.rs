use thiserror::Error;

/// Failures of heap captures and diagnostic commands.
///
/// None of these are retried inside the crate; the HTTP layer maps each one to
/// a status code.
#[derive(Debug, Error)]
pub enum DiagnosticsError {
    /// The diagnostic facility is absent. Permanent for the process lifetime.
    #[error("diagnostic facility is not available")]
    Unsupported,

    /// Another heap dump holds the lock. Transient.
    #[error("a heap dump is already in progress")]
    Conflict,

    /// Trigger mode was requested but no handlers are registered.
    #[error("no heap dump handlers registered")]
    NotConfigured,

    #[error("malformed diagnostic output at line {line}: {reason}")]
    MalformedDiagnosticOutput { line: usize, reason: String },

    #[error("heap capture failed: {message}")]
    CaptureFailure { message: String },

    #[error("failed to stream heap dump: {0}")]
    StreamFailure(#[source] std::io::Error),

    #[error("diagnostic command {command} failed: {message}")]
    CommandFailure {
        command: &'static str,
        message: String,
    },

    #[error("heap dump handlers failed: {}", failed.join(", "))]
    HandlerFailure { failed: Vec<String> },
}

impl DiagnosticsError {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::Conflict => "conflict",
            Self::NotConfigured => "not_configured",
            Self::MalformedDiagnosticOutput { .. } => "malformed_output",
            Self::CaptureFailure { .. } => "capture_failure",
            Self::StreamFailure(_) => "stream_failure",
            Self::CommandFailure { .. } => "command_failure",
            Self::HandlerFailure { .. } => "handler_failure",
        }
    }

    pub(crate) fn capture(message: impl Into<String>) -> Self {
        Self::CaptureFailure {
            message: message.into(),
        }
    }
}
