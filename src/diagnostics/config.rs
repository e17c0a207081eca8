use std::path::PathBuf;

pub const DEFAULT_FILE_PREFIX: &str = "heapdump";

/// Runtime settings for the diagnostics endpoints, built once at startup.
#[derive(Clone, Debug)]
pub struct DiagnosticsConfig {
    /// PID of the JVM to diagnose.
    pub pid: u32,
    /// JDK whose `bin/jcmd` is preferred over the one on `PATH`.
    pub java_home: Option<PathBuf>,
    /// Prefix of temporary dump file names.
    pub file_prefix: String,
    /// Directory for temporary dumps. Must be writable by the target JVM.
    pub dump_dir: PathBuf,
    /// Enables the `archive` handler.
    pub archive_dir: Option<PathBuf>,
    /// Enables the `command` handler.
    pub on_heapdump: Option<PathBuf>,
    /// Leading arguments for the `command` handler.
    pub on_heapdump_args: Vec<String>,
    pub heapdump_enabled: bool,
    pub jvmdiagnostics_enabled: bool,
}

impl DiagnosticsConfig {
    /// Config for `pid` with every optional setting at its default
    #[must_use]
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            java_home: None,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            dump_dir: std::env::temp_dir(),
            archive_dir: None,
            on_heapdump: None,
            on_heapdump_args: Vec::new(),
            heapdump_enabled: true,
            jvmdiagnostics_enabled: true,
        }
    }

    #[must_use]
    pub fn with_java_home(mut self, java_home: Option<PathBuf>) -> Self {
        self.java_home = java_home;
        self
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
    pub fn with_archive_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.archive_dir = dir;
        self
    }

    #[must_use]
    pub fn with_on_heapdump(mut self, program: Option<PathBuf>, args: Vec<String>) -> Self {
        self.on_heapdump = program;
        self.on_heapdump_args = args;
        self
    }

    #[must_use]
    pub const fn with_endpoints(mut self, heapdump: bool, jvmdiagnostics: bool) -> Self {
        self.heapdump_enabled = heapdump;
        self.jvmdiagnostics_enabled = jvmdiagnostics;
        self
    }
}
