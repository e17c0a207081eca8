use crate::{
    cli::{actions::Action, commands::ENDPOINT_GROUPS},
    diagnostics::DiagnosticsConfig,
};
use anyhow::{Result, anyhow};
use clap::ArgMatches;
use std::path::PathBuf;
use tracing::info;

pub fn handler(matches: &ArgMatches) -> Result<Action> {
    // Get the port or return an error
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .ok_or_else(|| anyhow!("Port is required. Please provide it using the --port flag."))?;

    // Get the listen address (None means auto-detect)
    let listen = matches.get_one::<String>("listen").cloned();

    let config = diagnostics_config(matches)?;

    info!(
        pid = config.pid,
        heapdump = config.heapdump_enabled,
        jvmdiagnostics = config.jvmdiagnostics_enabled,
        "Diagnostics configured"
    );

    Ok(Action::Run {
        port,
        listen,
        config,
    })
}

fn diagnostics_config(matches: &ArgMatches) -> Result<DiagnosticsConfig> {
    let pid = matches
        .get_one::<u32>("pid")
        .copied()
        .ok_or_else(|| anyhow!("PID is required. Please provide it using the --pid flag."))?;

    let mut config = DiagnosticsConfig::new(pid)
        .with_java_home(matches.get_one::<PathBuf>("java-home").cloned())
        .with_archive_dir(matches.get_one::<PathBuf>("archive-dir").cloned())
        .with_on_heapdump(
            matches.get_one::<PathBuf>("on-heapdump").cloned(),
            matches
                .get_many::<String>("on-heapdump-arg")
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default(),
        );

    if let Some(prefix) = matches.get_one::<String>("file-prefix") {
        config = config.with_file_prefix(prefix.trim());
    }

    if let Some(dir) = matches.get_one::<PathBuf>("dump-dir") {
        config = config.with_dump_dir(dir.clone());
    }

    let enabled = get_enabled_endpoints(matches);

    Ok(config.with_endpoints(
        enabled.contains(&"heapdump"),
        enabled.contains(&"jvmdiagnostics"),
    ))
}

pub fn get_enabled_endpoints(matches: &ArgMatches) -> Vec<&'static str> {
    ENDPOINT_GROUPS
        .iter()
        .filter(|group| {
            // the later of --endpoint.X / --no-endpoint.X wins
            if matches.get_flag(group.disable_flag) {
                return false;
            }

            if matches.get_flag(group.enable_flag) {
                return true;
            }

            group.enabled_by_default
        })
        .map(|group| group.name)
        .collect()
}
