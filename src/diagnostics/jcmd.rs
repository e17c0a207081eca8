//! `jcmd` backed diagnostic facility.
//!
//! `jcmd` ships with every JDK 8+ and talks to the target JVM over the attach
//! API, so the exporter must run as the same user as the JVM and share its
//! filesystem for heap dumps to be readable.

use crate::diagnostics::{DiagnosticCommand, DiagnosticFacility, DiagnosticsError, DumpMode};
use anyhow::{Context, Result, anyhow, bail};
use std::{
    env,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Command, Output},
};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info};

const JCMD: &str = if cfg!(windows) { "jcmd.exe" } else { "jcmd" };

#[derive(Clone, Debug)]
pub struct JcmdFacility {
    jcmd: PathBuf,
    pid: u32,
}

impl JcmdFacility {
    /// Check that `pid` is alive and answers `jcmd <pid> VM.version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process is gone, `jcmd` cannot be found, or the
    /// JVM refuses the attach.
    pub fn detect(pid: u32, java_home: Option<&Path>) -> Result<Self> {
        ensure_process_exists(pid)?;

        let jcmd = locate_jcmd(java_home, env::var_os("PATH"))?;
        let facility = Self { jcmd, pid };

        let output = facility
            .run([OsStr::new("VM.version")])
            .with_context(|| format!("failed to run {}", facility.jcmd.display()))?;

        if !output.status.success() {
            bail!(
                "{} {pid} VM.version exited with {}: {}",
                facility.jcmd.display(),
                output.status,
                failure_detail(&output)
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = strip_banner(&stdout, pid);
        info!(
            pid,
            jcmd = %facility.jcmd.display(),
            "Attached to {}",
            version.lines().next().unwrap_or("JVM").trim()
        );

        Ok(facility)
    }

    fn run<I, S>(&self, args: I) -> std::io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Command::new(&self.jcmd)
            .arg(self.pid.to_string())
            .args(args)
            .output()
    }
}

impl DiagnosticFacility for JcmdFacility {
    fn dump_heap(&self, path: &Path, mode: DumpMode) -> Result<(), DiagnosticsError> {
        let output = self
            .run(heap_dump_args(path, mode))
            .map_err(|e| DiagnosticsError::capture(format!("failed to run jcmd: {e}")))?;

        if !output.status.success() {
            return Err(DiagnosticsError::capture(format!(
                "jcmd exited with {}: {}",
                output.status,
                failure_detail(&output)
            )));
        }

        debug!(
            output = %String::from_utf8_lossy(&output.stdout).trim(),
            "GC.heap_dump finished"
        );

        Ok(())
    }

    fn execute(&self, command: DiagnosticCommand) -> Result<String, DiagnosticsError> {
        let failure = |message: String| DiagnosticsError::CommandFailure {
            command: command.jcmd_name(),
            message,
        };

        let output = self
            .run([command.jcmd_name()])
            .map_err(|e| failure(format!("failed to run jcmd: {e}")))?;

        if !output.status.success() {
            return Err(failure(format!(
                "jcmd exited with {}: {}",
                output.status,
                failure_detail(&output)
            )));
        }

        Ok(strip_banner(&String::from_utf8_lossy(&output.stdout), self.pid).to_string())
    }
}

/// `GC.heap_dump` dumps live objects unless `-all` is given.
fn heap_dump_args(path: &Path, mode: DumpMode) -> Vec<OsString> {
    let mut args = vec![OsString::from("GC.heap_dump")];
    if mode == DumpMode::Full {
        args.push(OsString::from("-all"));
    }
    args.push(path.as_os_str().to_owned());
    args
}

/// Drop the `<pid>:` line jcmd prints ahead of the command output.
fn strip_banner(output: &str, pid: u32) -> &str {
    let banner = format!("{pid}:");
    match output.split_once('\n') {
        Some((first, rest)) if first.trim() == banner => rest,
        None if output.trim() == banner => "",
        _ => output,
    }
}

fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };
    detail.trim().to_string()
}

fn ensure_process_exists(pid: u32) -> Result<()> {
    let target = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);

    let process = system
        .process(target)
        .ok_or_else(|| anyhow!("process {pid} not found"))?;

    debug!(pid, name = ?process.name(), "Found target process");

    Ok(())
}

/// Prefer `$JAVA_HOME/bin/jcmd`, then the first `jcmd` on the search path.
fn locate_jcmd(java_home: Option<&Path>, search_path: Option<OsString>) -> Result<PathBuf> {
    if let Some(home) = java_home {
        let candidate = home.join("bin").join(JCMD);
        if candidate.is_file() {
            return Ok(candidate);
        }
        debug!("No {JCMD} under {}", home.display());
    }

    search_path
        .as_deref()
        .and_then(|paths| {
            env::split_paths(paths)
                .map(|dir| dir.join(JCMD))
                .find(|candidate| candidate.is_file())
        })
        .ok_or_else(|| anyhow!("{JCMD} not found in JAVA_HOME or PATH"))
}
