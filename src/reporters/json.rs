//! JSON reporter
//!
//! Outputs the full report as pretty-printed JSON.
//! Useful for machine consumption, piping to jq, or re-rendering later
//! with `repo-health report --metrics`.

use super::Report;
use anyhow::Result;

/// Render report as JSON
pub fn render(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Render report as compact JSON (single line)
pub fn render_compact(report: &Report) -> Result<String> {
    Ok(serde_json::to_string(report)?)
}
