use crate::diagnostics::{DiagnosticCommand, DiagnosticsError, DumpMode};
use anyhow::Result;
use once_cell::sync::OnceCell;
use std::{fmt, path::Path, sync::Arc};
use tracing::{info, warn};

/// Optional platform facility able to capture heaps and run diagnostic commands.
pub trait DiagnosticFacility: Send + Sync {
    /// Write a heap capture to `path`. The path must not exist beforehand.
    ///
    /// # Errors
    ///
    /// Returns `CaptureFailure` if the runtime refuses or fails the capture.
    fn dump_heap(&self, path: &Path, mode: DumpMode) -> Result<(), DiagnosticsError>;

    /// Run a textual diagnostic command and return its raw output.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailure` if the command cannot be run.
    fn execute(&self, command: DiagnosticCommand) -> Result<String, DiagnosticsError>;
}

/// Outcome of a capability probe, immutable once resolved.
#[derive(Clone, Default)]
pub struct CapabilityHandle {
    facility: Option<Arc<dyn DiagnosticFacility>>,
}

impl CapabilityHandle {
    #[must_use]
    pub fn available(facility: Arc<dyn DiagnosticFacility>) -> Self {
        Self {
            facility: Some(facility),
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.facility.is_some()
    }

    /// The bound facility, or `Unsupported` when the probe failed.
    ///
    /// # Errors
    ///
    /// Returns `DiagnosticsError::Unsupported` if no facility was detected.
    pub fn facility(&self) -> Result<&Arc<dyn DiagnosticFacility>, DiagnosticsError> {
        self.facility.as_ref().ok_or(DiagnosticsError::Unsupported)
    }
}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("available", &self.is_available())
            .finish()
    }
}

type Detector = Box<dyn Fn() -> Result<Arc<dyn DiagnosticFacility>> + Send + Sync>;

/// Detects the diagnostic facility at most once and caches the answer.
///
/// Detection is assumed static for the process lifetime: a failed probe is
/// never retried.
pub struct CapabilityProbe {
    detector: Detector,
    handle: OnceCell<CapabilityHandle>,
}

impl CapabilityProbe {
    pub fn new<F>(detector: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn DiagnosticFacility>> + Send + Sync + 'static,
    {
        Self {
            detector: Box::new(detector),
            handle: OnceCell::new(),
        }
    }

    /// A probe whose answer is already known.
    #[must_use]
    pub fn resolved(handle: CapabilityHandle) -> Self {
        Self {
            detector: Box::new(|| Err(anyhow::anyhow!("probe already resolved"))),
            handle: OnceCell::with_value(handle),
        }
    }

    /// Resolve the capability, running the detector on first use only.
    ///
    /// Blocks while another thread runs the detector.
    pub fn probe(&self) -> &CapabilityHandle {
        self.handle.get_or_init(|| match (self.detector)() {
            Ok(facility) => {
                info!("Diagnostic facility detected");
                CapabilityHandle::available(facility)
            }
            Err(e) => {
                warn!("Diagnostic facility not available: {e:#}");
                CapabilityHandle::unavailable()
            }
        })
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.probe().is_available()
    }

    /// The cached answer, or `None` while detection has not finished.
    #[must_use]
    pub fn peek(&self) -> Option<&CapabilityHandle> {
        self.handle.get()
    }
}

impl fmt::Debug for CapabilityProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityProbe")
            .field("handle", &self.handle.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopFacility;

    impl DiagnosticFacility for NoopFacility {
        fn dump_heap(&self, _path: &Path, _mode: DumpMode) -> Result<(), DiagnosticsError> {
            Ok(())
        }

        fn execute(&self, _command: DiagnosticCommand) -> Result<String, DiagnosticsError> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_probe_runs_detector_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let probe = CapabilityProbe::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NoopFacility) as Arc<dyn DiagnosticFacility>)
        });

        assert!(probe.is_available());
        assert!(probe.is_available());
        assert!(probe.probe().is_available());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_probe_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let probe = CapabilityProbe::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("jcmd not found"))
        });

        for _ in 0..5 {
            assert!(!probe.is_available());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            probe.probe().facility(),
            Err(DiagnosticsError::Unsupported)
        ));
    }

    #[test]
    fn test_probe_is_consistent_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let probe = Arc::new(CapabilityProbe::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NoopFacility) as Arc<dyn DiagnosticFacility>)
        }));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let probe = Arc::clone(&probe);
                std::thread::spawn(move || probe.is_available())
            })
            .collect();

        for t in threads {
            assert!(t.join().unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_peek_waits_for_nothing() {
        let probe =
            CapabilityProbe::new(|| Ok(Arc::new(NoopFacility) as Arc<dyn DiagnosticFacility>));

        assert!(probe.peek().is_none());
        assert!(probe.is_available());
        assert!(probe.peek().is_some_and(CapabilityHandle::is_available));
    }

    #[test]
    fn test_resolved_probe() {
        let probe = CapabilityProbe::resolved(CapabilityHandle::unavailable());
        assert!(!probe.is_available());

        let probe = CapabilityProbe::resolved(CapabilityHandle::available(Arc::new(NoopFacility)));
        assert!(probe.is_available());
        assert!(probe.probe().facility().is_ok());
    }
}
