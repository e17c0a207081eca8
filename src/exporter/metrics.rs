use crate::diagnostics::{DiagnosticCommand, DiagnosticsError, DumpMode};
use anyhow::Result;
use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for every diagnostic request the exporter served.
#[derive(Clone)]
pub struct DiagnosticsMetrics {
    registry: Registry,
    heapdumps: IntCounterVec,
    commands: IntCounterVec,
}

impl DiagnosticsMetrics {
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let heapdumps = IntCounterVec::new(
            Opts::new(
                "jvm_diag_exporter_heapdumps_total",
                "Heap dump requests by operation, mode and outcome.",
            ),
            &["operation", "mode", "outcome"],
        )?;

        let commands = IntCounterVec::new(
            Opts::new(
                "jvm_diag_exporter_diagnostic_commands_total",
                "Diagnostic command requests by command and outcome.",
            ),
            &["command", "outcome"],
        )?;

        registry.register(Box::new(heapdumps.clone()))?;
        registry.register(Box::new(commands.clone()))?;

        Ok(Self {
            registry,
            heapdumps,
            commands,
        })
    }

    pub fn observe_heapdump<T>(
        &self,
        operation: &str,
        mode: DumpMode,
        result: &Result<T, DiagnosticsError>,
    ) {
        self.heapdumps
            .with_label_values(&[operation, mode.as_str(), outcome(result)])
            .inc();
    }

    pub fn observe_command<T>(
        &self,
        command: DiagnosticCommand,
        result: &Result<T, DiagnosticsError>,
    ) {
        self.commands
            .with_label_values(&[command.label(), outcome(result)])
            .inc();
    }

    /// Prometheus text exposition of every counter.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn render(&self) -> Result<String> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

fn outcome<T>(result: &Result<T, DiagnosticsError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}
