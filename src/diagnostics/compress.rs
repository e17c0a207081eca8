use crate::diagnostics::DiagnosticsError;
use flate2::{Compression, write::GzEncoder};
use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};
use tracing::{debug, warn};

/// Destination of a compressed artifact.
///
/// `begin` is called exactly once, with the artifact's file name, before the
/// first byte is written.
pub trait ArtifactSink: Write {
    /// # Errors
    ///
    /// Returns an error if the sink can no longer accept the artifact.
    fn begin(&mut self, artifact_name: &str) -> io::Result<()>;
}

impl ArtifactSink for Vec<u8> {
    fn begin(&mut self, _artifact_name: &str) -> io::Result<()> {
        Ok(())
    }
}

impl ArtifactSink for File {
    fn begin(&mut self, _artifact_name: &str) -> io::Result<()> {
        Ok(())
    }
}

impl<S: ArtifactSink + ?Sized> ArtifactSink for &mut S {
    fn begin(&mut self, artifact_name: &str) -> io::Result<()> {
        (**self).begin(artifact_name)
    }
}

/// Copy `source` through gzip into `sink`.
///
/// Both ends are closed on every path. When the copy itself fails, errors
/// raised while closing are logged and the copy error is returned.
///
/// # Errors
///
/// Returns `StreamFailure` if reading, compressing or writing fails.
pub fn stream_gzip<S: ArtifactSink>(
    source: &Path,
    artifact_name: &str,
    mut sink: S,
) -> Result<u64, DiagnosticsError> {
    let mut input = File::open(source).map_err(DiagnosticsError::StreamFailure)?;

    sink.begin(artifact_name)
        .map_err(DiagnosticsError::StreamFailure)?;

    let mut encoder = GzEncoder::new(sink, Compression::default());

    let copied = io::copy(&mut input, &mut encoder);
    drop(input);

    match copied {
        Ok(bytes) => {
            let mut sink = encoder.finish().map_err(DiagnosticsError::StreamFailure)?;
            sink.flush().map_err(DiagnosticsError::StreamFailure)?;
            debug!(bytes, artifact = artifact_name, "artifact streamed");
            Ok(bytes)
        }
        Err(e) => {
            if let Err(close) = encoder.try_finish() {
                warn!(artifact = artifact_name, "failed to close compressed stream: {close}");
            }
            Err(DiagnosticsError::StreamFailure(e))
        }
    }
}
