use anyhow::Result;
use std::path::PathBuf;

use jvm_diag_exporter::cli::{actions::Action, commands, dispatch};

const ENV_VARS: [&str; 8] = [
    "JVM_DIAG_EXPORTER_PORT",
    "JVM_DIAG_EXPORTER_LISTEN",
    "JVM_DIAG_EXPORTER_PID",
    "JVM_DIAG_EXPORTER_FILE_PREFIX",
    "JVM_DIAG_EXPORTER_DUMP_DIR",
    "JVM_DIAG_EXPORTER_ARCHIVE_DIR",
    "JVM_DIAG_EXPORTER_ON_HEAPDUMP",
    "JAVA_HOME",
];

fn action_from(args: &[&str]) -> Result<Action> {
    temp_env::with_vars_unset(ENV_VARS, || {
        let mut argv = vec!["jvm_diag_exporter"];
        argv.extend_from_slice(args);
        let matches = commands::new().get_matches_from(argv);
        dispatch::handler(&matches)
    })
}

#[test]
fn test_handler_happy_path_returns_action() -> Result<()> {
    let Action::Run {
        port,
        listen,
        config,
    } = action_from(&[
        "--port",
        "9898",
        "--listen",
        "0.0.0.0",
        "--pid",
        "31337",
        "--java-home",
        "/usr/lib/jvm/temurin-21",
        "--archive-dir",
        "/srv/heapdumps",
    ])?;

    assert_eq!(port, 9898);
    assert_eq!(listen.as_deref(), Some("0.0.0.0"));
    assert_eq!(config.pid, 31337);
    assert_eq!(
        config.java_home,
        Some(PathBuf::from("/usr/lib/jvm/temurin-21"))
    );
    assert_eq!(config.archive_dir, Some(PathBuf::from("/srv/heapdumps")));
    assert!(config.on_heapdump.is_none());
    assert!(config.heapdump_enabled);
    assert!(config.jvmdiagnostics_enabled);

    Ok(())
}

#[test]
fn test_handler_reads_environment() -> Result<()> {
    let action = temp_env::with_vars(
        [
            ("JVM_DIAG_EXPORTER_PID", Some("99")),
            ("JVM_DIAG_EXPORTER_FILE_PREFIX", Some("billing-")),
            ("JVM_DIAG_EXPORTER_DUMP_DIR", Some("/dumps")),
            ("JVM_DIAG_EXPORTER_ON_HEAPDUMP", Some("/opt/hooks/upload")),
        ],
        || {
            let matches = commands::new().get_matches_from(vec!["jvm_diag_exporter"]);
            dispatch::handler(&matches)
        },
    )?;

    let Action::Run { config, .. } = action;

    assert_eq!(config.pid, 99);
    assert_eq!(config.file_prefix, "billing-");
    assert_eq!(config.dump_dir, PathBuf::from("/dumps"));
    assert_eq!(config.on_heapdump, Some(PathBuf::from("/opt/hooks/upload")));
    assert!(config.on_heapdump_args.is_empty());

    Ok(())
}

#[test]
fn test_handler_disables_endpoint_groups() -> Result<()> {
    let Action::Run { config, .. } = action_from(&[
        "--pid",
        "1",
        "--no-endpoint.heapdump",
        "--no-endpoint.jvmdiagnostics",
    ])?;

    assert!(!config.heapdump_enabled);
    assert!(!config.jvmdiagnostics_enabled);

    Ok(())
}

#[test]
fn test_handler_hook_arguments_keep_order() -> Result<()> {
    let Action::Run { config, .. } = action_from(&[
        "--pid",
        "1",
        "--on-heapdump",
        "/usr/bin/env",
        "--on-heapdump-arg",
        "uploader",
        "--on-heapdump-arg",
        "--verbose",
    ])?;

    assert_eq!(config.on_heapdump, Some(PathBuf::from("/usr/bin/env")));
    assert_eq!(config.on_heapdump_args, vec!["uploader", "--verbose"]);

    Ok(())
}
