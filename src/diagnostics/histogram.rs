//! Parser for class histogram output (`jmap -histo` / `GC.class_histogram`).
//!
//! Grammar:
//!
//! ```text
//!  num     #instances         #bytes  class name      <- line 0, ignored
//! ----------------------------------------------      <- line 1, ignored
//!    1:        194776       25070408  [C              <- record, exactly 4 tokens
//! Total        557183       35111760                  <- summary, first token `Total`
//! ```
//!
//! Any other line is skipped. A record or summary line with a non-numeric
//! count fails the whole parse.

use crate::diagnostics::DiagnosticsError;
use serde::Serialize;
use tracing::trace;

/// Number of leading lines (column labels and separator) that never carry data.
const HEADER_LINES: usize = 2;

const TOTAL_TOKEN: &str = "Total";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_instances: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    pub records: Vec<HistogramRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistogramRecord {
    #[serde(rename = "class")]
    pub class_name: String,
    pub instances: u64,
    pub bytes: u64,
}

/// Parse raw class histogram text into a [`HistogramReport`].
///
/// # Errors
///
/// Returns `MalformedDiagnosticOutput` if a record or `Total` line carries a
/// count that is not an unsigned integer. No partial report is returned.
pub fn parse_histogram(output: &str) -> Result<HistogramReport, DiagnosticsError> {
    let mut report = HistogramReport::default();

    for (index, line) in output.lines().enumerate().skip(HEADER_LINES) {
        let line_number = index + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();

        match fields.as_slice() {
            [TOTAL_TOKEN, instances, bytes, ..] => {
                report.total_instances = Some(parse_count(instances, line_number)?);
                report.total_bytes = Some(parse_count(bytes, line_number)?);
            }
            [_index, instances, bytes, class_name] => {
                report.records.push(HistogramRecord {
                    class_name: (*class_name).to_string(),
                    instances: parse_count(instances, line_number)?,
                    bytes: parse_count(bytes, line_number)?,
                });
            }
            _ => trace!(line = line_number, "skipping histogram line"),
        }
    }

    Ok(report)
}

fn parse_count(field: &str, line: usize) -> Result<u64, DiagnosticsError> {
    field
        .parse()
        .map_err(|e| DiagnosticsError::MalformedDiagnosticOutput {
            line,
            reason: format!("invalid count {field:?}: {e}"),
        })
}
