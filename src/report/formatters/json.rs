use crate::report::FieldReport;

/// JSON formatter for field reports
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format report as pretty-printed JSON
    pub fn format(report: &FieldReport) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(report)
    }

    /// Format report as compact JSON (no whitespace)
    pub fn format_compact(report: &FieldReport) -> Result<String, serde_json::Error> {
        serde_json::to_string(report)
    }
}
