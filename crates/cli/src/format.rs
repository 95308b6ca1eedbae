//! Output → human/json string formatting.

use pasta_engine::Report;
use serde_json::{json, Value};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format a checker report.
pub fn format_report(report: &Report, mode: OutputMode) -> String {
    match mode {
        OutputMode::Human => report.to_string(),
        OutputMode::Json => report
            .to_json()
            .unwrap_or_else(|e| format_error(&e.to_string(), mode)),
    }
}

/// Format a list of names, e.g. design documents written.
pub fn format_names(label: &str, names: &[String], mode: OutputMode) -> String {
    match mode {
        OutputMode::Human if names.is_empty() => format!("{}: (none)", label),
        OutputMode::Human => format!("{}: {}", label, names.join(", ")),
        OutputMode::Json => pretty(&json!({ label: names })),
    }
}

/// Format revision snapshots, oldest first.
pub fn format_history(history: &[(String, Value)], mode: OutputMode) -> String {
    match mode {
        OutputMode::Human if history.is_empty() => "(no revisions)".to_string(),
        OutputMode::Human => history
            .iter()
            .map(|(name, snapshot)| format!("{} {}", name, snapshot))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputMode::Json => {
            let map: serde_json::Map<String, Value> = history.iter().cloned().collect();
            pretty(&Value::Object(map))
        }
    }
}

/// Format an error.
pub fn format_error(message: &str, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&json!({ "error": message })),
        OutputMode::Human => format!("(error) {}", message),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
