use super::{diagnostics_error, joined};
use crate::{
    diagnostics::{CommandRunner, DiagnosticCommand},
    exporter::DiagnosticsMetrics,
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use tokio::task;
use tracing::{debug, warn};

pub async fn class_histogram(
    Extension(commands): Extension<CommandRunner>,
    Extension(metrics): Extension<DiagnosticsMetrics>,
) -> Response {
    plain_text(commands, metrics, DiagnosticCommand::ClassHistogram).await
}

pub async fn thread_dump(
    Extension(commands): Extension<CommandRunner>,
    Extension(metrics): Extension<DiagnosticsMetrics>,
) -> Response {
    plain_text(commands, metrics, DiagnosticCommand::ThreadPrint).await
}

pub async fn class_histogram_json(
    Extension(commands): Extension<CommandRunner>,
    Extension(metrics): Extension<DiagnosticsMetrics>,
) -> Response {
    let result = joined(task::spawn_blocking(move || commands.class_histogram()).await);
    metrics.observe_command(DiagnosticCommand::ClassHistogram, &result);

    match result {
        Ok(report) => {
            debug!(records = report.records.len(), "Class histogram parsed");
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => {
            warn!("Class histogram failed: {e}");
            diagnostics_error(&e)
        }
    }
}

async fn plain_text(
    commands: CommandRunner,
    metrics: DiagnosticsMetrics,
    command: DiagnosticCommand,
) -> Response {
    let result = joined(task::spawn_blocking(move || commands.run(command)).await);
    metrics.observe_command(command, &result);

    match result {
        Ok(output) => (
            StatusCode::OK,
            [(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )],
            output,
        )
            .into_response(),
        Err(e) => {
            warn!(%command, "Diagnostic command failed: {e}");
            diagnostics_error(&e)
        }
    }
}
