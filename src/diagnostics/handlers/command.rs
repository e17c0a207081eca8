use crate::diagnostics::{DumpMode, handlers::HeapDumpHandler};
use anyhow::{Context, Result, bail};
use std::{
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info};

/// Runs an external program as `<program> [args..] <dump path> <full|live>`.
///
/// The program runs synchronously while the dump lock is held; it should copy
/// or upload the dump and exit.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandHandler {
    #[must_use]
    pub const fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl HeapDumpHandler for CommandHandler {
    fn name(&self) -> &str {
        "command"
    }

    fn handle(&self, dump: &Path, mode: DumpMode) -> Result<()> {
        debug!(program = %self.program.display(), "Running heap dump hook");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(dump)
            .arg(mode.as_str())
            .output()
            .with_context(|| format!("failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        info!(program = %self.program.display(), %mode, "Heap dump hook completed");

        Ok(())
    }
}
