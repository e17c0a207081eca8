use crate::exporter::GIT_COMMIT_HASH;
use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

mod endpoints;

pub use self::endpoints::{ENDPOINT_GROUPS, EndpointGroup};

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let cmd = Command::new("jvm_diag_exporter")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(GIT_COMMIT_HASH)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("9441")
                .env("JVM_DIAG_EXPORTER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("listen")
                .long("listen")
                .help("IP address to bind, defaults to :: falling back to 0.0.0.0")
                .env("JVM_DIAG_EXPORTER_LISTEN")
                .value_name("IP"),
        )
        .arg(
            Arg::new("pid")
                .long("pid")
                .help("PID of the JVM to diagnose")
                .env("JVM_DIAG_EXPORTER_PID")
                .required(true)
                .value_name("PID")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("java-home")
                .long("java-home")
                .help("JDK used to locate jcmd, PATH is searched otherwise")
                .env("JAVA_HOME")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("file-prefix")
                .long("file-prefix")
                .help("Prefix of heap dump file names")
                .default_value("heapdump")
                .env("JVM_DIAG_EXPORTER_FILE_PREFIX"),
        )
        .arg(
            Arg::new("dump-dir")
                .long("dump-dir")
                .help("Directory for temporary heap dumps, must be writable by the JVM [default: system temp dir]")
                .env("JVM_DIAG_EXPORTER_DUMP_DIR")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("archive-dir")
                .long("archive-dir")
                .help("Keep a gzip copy of every triggered heap dump in this directory")
                .env("JVM_DIAG_EXPORTER_ARCHIVE_DIR")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("on-heapdump")
                .long("on-heapdump")
                .help("Program run with <dump path> <full|live> for every triggered heap dump")
                .env("JVM_DIAG_EXPORTER_ON_HEAPDUMP")
                .value_name("PROGRAM")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("on-heapdump-arg")
                .long("on-heapdump-arg")
                .help("Argument passed to --on-heapdump ahead of the dump path, repeatable")
                .value_name("ARG")
                .allow_hyphen_values(true)
                .requires("on-heapdump")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity, -vv for debug")
                .action(ArgAction::Count),
        );

    endpoints::add_endpoint_args(cmd)
}
