use crate::diagnostics::{DumpMode, compress::stream_gzip, handlers::HeapDumpHandler};
use anyhow::{Context, Result, anyhow};
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Keeps a gzip-compressed copy of every triggered dump in a directory.
#[derive(Clone, Debug)]
pub struct ArchiveHandler {
    dir: PathBuf,
}

impl ArchiveHandler {
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl HeapDumpHandler for ArchiveHandler {
    fn name(&self) -> &str {
        "archive"
    }

    fn handle(&self, dump: &Path, mode: DumpMode) -> Result<()> {
        let file_name = dump
            .file_name()
            .ok_or_else(|| anyhow!("dump path {} has no file name", dump.display()))?;
        let artifact = format!("{}.gz", file_name.to_string_lossy());

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let target = self.dir.join(&artifact);
        let file = File::create(&target)
            .with_context(|| format!("failed to create {}", target.display()))?;

        if let Err(e) = stream_gzip(dump, &artifact, file) {
            discard_partial(&target);
            return Err(e).with_context(|| format!("failed to archive to {}", target.display()));
        }

        info!(%mode, archive = %target.display(), "Heap dump archived");

        Ok(())
    }
}

fn discard_partial(target: &Path) {
    match fs::remove_file(target) {
        Ok(()) => debug!(archive = %target.display(), "Removed partial archive"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(archive = %target.display(), "Failed to remove partial archive: {e}"),
    }
}
