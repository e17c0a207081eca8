pub mod cli;
pub mod diagnostics;
pub mod exporter;
