pub mod run;

use crate::diagnostics::DiagnosticsConfig;

#[derive(Debug)]
pub enum Action {
    Run {
        port: u16,
        listen: Option<String>,
        config: DiagnosticsConfig,
    },
}
