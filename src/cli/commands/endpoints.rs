use clap::{Arg, ArgAction, Command};

/// Endpoint groups that can be switched off, with their flag names.
pub const ENDPOINT_GROUPS: &[EndpointGroup] = &[
    EndpointGroup {
        name: "heapdump",
        enable_flag: "endpoint.heapdump",
        disable_flag: "no-endpoint.heapdump",
        help: "/heapdump, /heapdump/live and /heapdump/trigger",
        enabled_by_default: true,
    },
    EndpointGroup {
        name: "jvmdiagnostics",
        enable_flag: "endpoint.jvmdiagnostics",
        disable_flag: "no-endpoint.jvmdiagnostics",
        help: "/jvmdiagnostics/jmap-histo[.json] and /jvmdiagnostics/jstack",
        enabled_by_default: true,
    },
];

#[derive(Debug)]
pub struct EndpointGroup {
    pub name: &'static str,
    pub enable_flag: &'static str,
    pub disable_flag: &'static str,
    help: &'static str,
    pub enabled_by_default: bool,
}

pub fn add_endpoint_args(mut cmd: Command) -> Command {
    for group in ENDPOINT_GROUPS {
        cmd = cmd
            .arg(
                Arg::new(group.enable_flag)
                    .long(group.enable_flag)
                    .help(format!(
                        "Serve {} [default: {}]",
                        group.help,
                        if group.enabled_by_default { "enabled" } else { "disabled" }
                    ))
                    .action(ArgAction::SetTrue)
                    .default_value(if group.enabled_by_default { "true" } else { "false" })
                    .overrides_with(group.disable_flag),
            )
            .arg(
                Arg::new(group.disable_flag)
                    .long(group.disable_flag)
                    .help(format!("Do not serve the {} endpoints", group.name))
                    .action(ArgAction::SetTrue)
                    .overrides_with(group.enable_flag),
            );
    }
    cmd
}
