//! Heap capture and diagnostic command plumbing for a single target JVM.
//!
//! Everything in here is synchronous and blocking; callers on an async
//! runtime are expected to go through `spawn_blocking`.

use std::fmt;

pub mod capability;
pub mod commands;
pub mod compress;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod histogram;
pub mod jcmd;

pub use self::capability::{CapabilityHandle, CapabilityProbe, DiagnosticFacility};
pub use self::commands::CommandRunner;
pub use self::compress::ArtifactSink;
pub use self::config::DiagnosticsConfig;
pub use self::coordinator::DumpCoordinator;
pub use self::error::DiagnosticsError;
pub use self::handlers::{HandlerRegistry, HeapDumpHandler};
pub use self::histogram::{HistogramRecord, HistogramReport, parse_histogram};

/// Which objects end up in a heap capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DumpMode {
    /// Every object on the heap, reachable or not.
    Full,
    /// Only objects reachable from GC roots; forces a full GC first.
    LiveOnly,
}

impl DumpMode {
    #[must_use]
    pub const fn from_live(live: bool) -> Self {
        if live { Self::LiveOnly } else { Self::Full }
    }

    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::LiveOnly)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::LiveOnly => "live",
        }
    }
}

impl fmt::Display for DumpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Textual diagnostic commands the target runtime can answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticCommand {
    ClassHistogram,
    ThreadPrint,
}

impl DiagnosticCommand {
    /// Command name as understood by `jcmd`.
    #[must_use]
    pub const fn jcmd_name(self) -> &'static str {
        match self {
            Self::ClassHistogram => "GC.class_histogram",
            Self::ThreadPrint => "Thread.print",
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ClassHistogram => "class_histogram",
            Self::ThreadPrint => "thread_print",
        }
    }
}

impl fmt::Display for DiagnosticCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jcmd_name())
    }
}
