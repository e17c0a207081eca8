use crate::diagnostics::{DiagnosticsConfig, DiagnosticsError, DumpMode};
use anyhow::Result;
use std::{path::Path, sync::Arc};
use tracing::{debug, warn};

mod archive;
mod command;

pub use self::archive::ArchiveHandler;
pub use self::command::CommandHandler;

/// Observer invoked with a freshly captured heap dump.
///
/// The dump file is deleted as soon as every handler has returned, so a
/// handler that wants to keep it must copy it.
pub trait HeapDumpHandler: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns an error if the handler could not process the dump.
    fn handle(&self, dump: &Path, mode: DumpMode) -> Result<()>;
}

/// Handlers registered at startup; read-only once traffic starts.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn HeapDumpHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in handlers `config` enables.
    #[must_use]
    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        let mut registry = Self::new();

        if let Some(dir) = &config.archive_dir {
            registry.register(Arc::new(ArchiveHandler::new(dir.clone())));
        }

        if let Some(program) = &config.on_heapdump {
            registry.register(Arc::new(CommandHandler::new(
                program.clone(),
                config.on_heapdump_args.clone(),
            )));
        }

        registry
    }

    pub fn register(&mut self, handler: Arc<dyn HeapDumpHandler>) {
        debug!("Registered heap dump handler '{}'", handler.name());
        self.handlers.push(handler);
    }

    #[must_use]
    pub fn with(mut self, handler: Arc<dyn HeapDumpHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn HeapDumpHandler>> {
        self.handlers.iter()
    }

    #[must_use]
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Run every handler in turn. A failing handler does not stop the rest.
    ///
    /// # Errors
    ///
    /// Returns `HandlerFailure` naming every handler that failed.
    pub fn dispatch(&self, dump: &Path, mode: DumpMode) -> Result<(), DiagnosticsError> {
        let mut failed = Vec::new();

        for handler in self.all() {
            match handler.handle(dump, mode) {
                Ok(()) => debug!("Heap dump handler '{}' completed", handler.name()),
                Err(e) => {
                    warn!("Heap dump handler '{}' failed: {e:#}", handler.name());
                    failed.push(handler.name().to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(DiagnosticsError::HandlerFailure { failed })
        }
    }
}
