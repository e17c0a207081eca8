//! Single-flight heap dump orchestration.
//!
//! One [`DumpCoordinator`] exists per process. Every dump, whether streamed
//! to a client or handed to the registered handlers, goes through its lock:
//!
//! ```text
//! Idle -> Locked -> Capturing -> Streaming   -> Idle
//!                             \-> Dispatching -> Idle
//! ```
//!
//! The lock is only ever tried, never waited on. A caller arriving while a
//! dump is in flight gets `Conflict` straight away. The temporary dump file is
//! removed before the lock is released, on every exit path.

use crate::diagnostics::{
    ArtifactSink, CapabilityProbe, DiagnosticFacility, DiagnosticsError, DumpMode,
    HandlerRegistry, compress::stream_gzip, config::DEFAULT_FILE_PREFIX,
};
use chrono::Local;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, TryLockError},
    time::Instant,
};
use tracing::{debug, info, instrument, warn};

pub struct DumpCoordinator {
    probe: Arc<CapabilityProbe>,
    handlers: HandlerRegistry,
    lock: Mutex<()>,
    file_prefix: String,
    dump_dir: PathBuf,
}

impl DumpCoordinator {
    #[must_use]
    pub fn new(probe: Arc<CapabilityProbe>, handlers: HandlerRegistry) -> Self {
        Self {
            probe,
            handlers,
            lock: Mutex::new(()),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            dump_dir: std::env::temp_dir(),
        }
    }

    #[must_use]
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_dump_dir(mut self, dir: PathBuf) -> Self {
        self.dump_dir = dir;
        self
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.probe.is_available()
    }

    #[must_use]
    pub const fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Capture a heap dump and stream it gzip-compressed into `sink`.
    ///
    /// The sink learns the artifact name (`<dump file>.gz`) before any byte.
    ///
    /// # Errors
    ///
    /// `Unsupported` without touching the lock, `Conflict` if another dump is
    /// in flight, `CaptureFailure` or `StreamFailure` otherwise.
    #[instrument(skip_all, fields(mode = %mode, operation = "download"))]
    pub fn download<S: ArtifactSink>(
        &self,
        mode: DumpMode,
        sink: S,
    ) -> Result<u64, DiagnosticsError> {
        let facility = self.probe.probe().facility()?;
        let _guard = self.try_lock()?;

        let dump = self.capture(facility.as_ref(), mode)?;
        let artifact = dump.artifact_name();

        stream_gzip(dump.path(), &artifact, sink)
    }

    /// Capture a heap dump and hand it to every registered handler.
    ///
    /// # Errors
    ///
    /// `Unsupported` or `NotConfigured` without touching the lock, `Conflict`
    /// if another dump is in flight, `CaptureFailure` or `HandlerFailure`
    /// otherwise.
    #[instrument(skip_all, fields(mode = %mode, operation = "trigger"))]
    pub fn trigger(&self, mode: DumpMode) -> Result<(), DiagnosticsError> {
        let facility = self.probe.probe().facility()?;

        if self.handlers.is_empty() {
            return Err(DiagnosticsError::NotConfigured);
        }

        let _guard = self.try_lock()?;

        let dump = self.capture(facility.as_ref(), mode)?;

        debug!(handlers = self.handlers.len(), "Dispatching heap dump");

        self.handlers.dispatch(dump.path(), mode)
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, ()>, DiagnosticsError> {
        match self.lock.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => {
                debug!("Heap dump already in progress");
                Err(DiagnosticsError::Conflict)
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("Heap dump lock was poisoned, recovering");
                let guard = poisoned.into_inner();
                self.lock.clear_poison();
                Ok(guard)
            }
        }
    }

    fn capture(
        &self,
        facility: &dyn DiagnosticFacility,
        mode: DumpMode,
    ) -> Result<DumpFile, DiagnosticsError> {
        let dump = DumpFile::allocate(&self.dump_dir, &self.file_prefix, mode)?;

        info!(path = %dump.path().display(), "Capturing heap dump");
        let started = Instant::now();

        facility.dump_heap(dump.path(), mode)?;

        if !dump.path().exists() {
            return Err(DiagnosticsError::capture(format!(
                "no heap dump written to {}",
                dump.path().display()
            )));
        }

        info!(
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Heap dump captured"
        );

        Ok(dump)
    }
}

/// Temporary capture target, removed when dropped.
struct DumpFile {
    path: PathBuf,
}

impl DumpFile {
    /// Reserve a unique `<prefix><yyyy-MM-dd-HH-mm>-[live-]<random>.hprof` name.
    ///
    /// The runtime refuses to overwrite, so the reserved placeholder is
    /// removed again before the path is handed out.
    fn allocate(dir: &Path, prefix: &str, mode: DumpMode) -> Result<Self, DiagnosticsError> {
        let stem = format!(
            "{prefix}{}-{}",
            Local::now().format("%Y-%m-%d-%H-%M"),
            if mode.is_live() { "live-" } else { "" }
        );

        let placeholder = tempfile::Builder::new()
            .prefix(&stem)
            .suffix(".hprof")
            .tempfile_in(dir)
            .map_err(|e| {
                DiagnosticsError::capture(format!(
                    "failed to create dump file in {}: {e}",
                    dir.display()
                ))
            })?;

        let (file, path) = placeholder.keep().map_err(|e| {
            DiagnosticsError::capture(format!("failed to reserve dump file: {e}"))
        })?;
        drop(file);

        let dump = Self { path };
        fs::remove_file(&dump.path).map_err(|e| {
            DiagnosticsError::capture(format!(
                "failed to clear placeholder {}: {e}",
                dump.path.display()
            ))
        })?;

        Ok(dump)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn artifact_name(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "heapdump.hprof".to_string());
        format!("{name}.gz")
    }
}

impl Drop for DumpFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed heap dump file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove heap dump file: {e}"),
        }
    }
}
