use super::{HEAPDUMP_TRIGGERED, heapdump_error, joined, message};
use crate::{
    diagnostics::{ArtifactSink, DiagnosticsError, DumpCoordinator, DumpMode},
    exporter::DiagnosticsMetrics,
};
use axum::{
    body::{Body, Bytes},
    extract::{Extension, Query},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures::stream;
use serde::Deserialize;
use std::{
    io::{self, Write},
    sync::Arc,
};
use tokio::{
    sync::{mpsc, oneshot},
    task,
};
use tracing::{info, warn};

/// Compressed chunks buffered between the capture thread and the client.
const CHUNK_BUFFER: usize = 16;

type Chunk = Result<Bytes, io::Error>;

/// Bridges the blocking compressor to an HTTP body.
///
/// The artifact name goes out on `head` when streaming begins, so the handler
/// can still answer with an error status for anything that fails earlier.
struct ResponseSink {
    head: Option<oneshot::Sender<String>>,
    chunks: mpsc::Sender<Chunk>,
}

impl ResponseSink {
    fn new(head: oneshot::Sender<String>, chunks: mpsc::Sender<Chunk>) -> Self {
        Self {
            head: Some(head),
            chunks,
        }
    }

    /// Make the body fail instead of ending cleanly on a truncated artifact.
    fn abort(&self, error: &DiagnosticsError) {
        if self.head.is_none() {
            let _ = self.chunks.blocking_send(Err(io::Error::other(error.to_string())));
        }
    }
}

fn client_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")
}

impl Write for ResponseSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.chunks
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| client_gone())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ArtifactSink for ResponseSink {
    fn begin(&mut self, artifact_name: &str) -> io::Result<()> {
        let head = self
            .head
            .take()
            .ok_or_else(|| io::Error::other("artifact already started"))?;
        head.send(artifact_name.to_string())
            .map_err(|_| client_gone())
    }
}

pub async fn heapdump(
    Extension(coordinator): Extension<Arc<DumpCoordinator>>,
    Extension(metrics): Extension<DiagnosticsMetrics>,
) -> Response {
    download(coordinator, metrics, DumpMode::Full).await
}

pub async fn heapdump_live(
    Extension(coordinator): Extension<Arc<DumpCoordinator>>,
    Extension(metrics): Extension<DiagnosticsMetrics>,
) -> Response {
    download(coordinator, metrics, DumpMode::LiveOnly).await
}

async fn download(
    coordinator: Arc<DumpCoordinator>,
    metrics: DiagnosticsMetrics,
    mode: DumpMode,
) -> Response {
    let (head_tx, head_rx) = oneshot::channel();
    let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_BUFFER);

    let capture = task::spawn_blocking(move || {
        let mut sink = ResponseSink::new(head_tx, chunk_tx);
        let result = coordinator.download(mode, &mut sink);
        if let Err(e) = &result {
            sink.abort(e);
        }
        result
    });

    let Ok(artifact) = head_rx.await else {
        // the sink went away before streaming began
        let result = joined(capture.await);
        metrics.observe_heapdump("download", mode, &result);
        return match result {
            Ok(_) => message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "heap dump finished without producing an artifact",
            ),
            Err(e) => {
                warn!(%mode, "Heap dump download failed: {e}");
                heapdump_error(&e)
            }
        };
    };

    tokio::spawn(async move {
        let result = joined(capture.await);
        metrics.observe_heapdump("download", mode, &result);
        match result {
            Ok(bytes) => info!(%mode, bytes, "Heap dump downloaded"),
            Err(e) => warn!(%mode, "Heap dump download aborted: {e}"),
        }
    });

    let body = Body::from_stream(stream::unfold(chunk_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }));

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{artifact}\"")) {
        headers.insert(CONTENT_DISPOSITION, value);
    }

    (StatusCode::OK, headers, body).into_response()
}

#[derive(Debug, Deserialize)]
pub struct TriggerParams {
    live: bool,
}

pub async fn trigger(
    Extension(coordinator): Extension<Arc<DumpCoordinator>>,
    Extension(metrics): Extension<DiagnosticsMetrics>,
    Query(params): Query<TriggerParams>,
) -> Response {
    let mode = DumpMode::from_live(params.live);

    let result = joined(task::spawn_blocking(move || coordinator.trigger(mode)).await);
    metrics.observe_heapdump("trigger", mode, &result);

    match result {
        Ok(()) => {
            info!(%mode, "Heap dump handed to handlers");
            message(StatusCode::OK, HEAPDUMP_TRIGGERED)
        }
        Err(e) => {
            warn!(%mode, "Heap dump trigger failed: {e}");
            heapdump_error(&e)
        }
    }
}
