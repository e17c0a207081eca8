use crate::diagnostics::{
    CapabilityHandle, CapabilityProbe, DiagnosticCommand, DiagnosticsError, HistogramReport,
    parse_histogram,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Textual diagnostic commands against the target JVM.
///
/// Unlike heap dumps these are cheap enough to run concurrently and take no
/// lock.
#[derive(Clone, Debug)]
pub struct CommandRunner {
    probe: Arc<CapabilityProbe>,
}

impl CommandRunner {
    #[must_use]
    pub const fn new(probe: Arc<CapabilityProbe>) -> Self {
        Self { probe }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.probe.is_available()
    }

    /// Availability without waiting on a detection still in progress.
    #[must_use]
    pub fn attach_state(&self) -> Option<bool> {
        self.probe.peek().map(CapabilityHandle::is_available)
    }

    /// # Errors
    ///
    /// `Unsupported` if the facility is absent, `CommandFailure` if it fails.
    #[instrument(skip(self))]
    pub fn run(&self, command: DiagnosticCommand) -> Result<String, DiagnosticsError> {
        let facility = self.probe.probe().facility()?;
        let output = facility.execute(command)?;
        debug!(bytes = output.len(), "Diagnostic command completed");
        Ok(output)
    }

    /// # Errors
    ///
    /// As [`Self::run`], plus `MalformedDiagnosticOutput` if the histogram
    /// cannot be parsed.
    pub fn class_histogram(&self) -> Result<HistogramReport, DiagnosticsError> {
        let raw = self.run(DiagnosticCommand::ClassHistogram)?;
        parse_histogram(&raw)
    }
}
