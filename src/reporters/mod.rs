//! Output reporters for repo-health results
//!
//! Supports multiple output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON, re-readable by `repo-health report`
//! - `markdown` - GitHub-flavored Markdown
//! - `html` - Standalone HTML page with score bars

mod html;
mod json;
mod markdown;
mod text;

use crate::analysis::AnalysisReport;
use crate::compare::ComparisonReport;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Markdown,
    Html,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" | "htm" => Ok(OutputFormat::Html),
            _ => Err(anyhow!(
                "Unknown format '{}'. Valid formats: text, json, markdown, html",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Html => write!(f, "html"),
        }
    }
}

/// Anything a reporter can render.
///
/// Serialized untagged, so a saved JSON report reads back as whichever
/// shape it was written from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Comparison(Box<ComparisonReport>),
    Single(Box<AnalysisReport>),
}

impl From<AnalysisReport> for Report {
    fn from(report: AnalysisReport) -> Self {
        Report::Single(Box::new(report))
    }
}

impl From<ComparisonReport> for Report {
    fn from(report: ComparisonReport) -> Self {
        Report::Comparison(Box::new(report))
    }
}

/// Read a report previously written with `--format json`.
pub fn load_report(path: &Path) -> Result<Report> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a repo-health JSON report", path.display()))
}

/// Render a report in the specified format
pub fn report(report: &Report, format: &str) -> Result<String> {
    let fmt = OutputFormat::from_str(format)?;
    report_with_format(report, fmt)
}

/// Render a report using an OutputFormat enum
pub fn report_with_format(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render(report),
        OutputFormat::Json => json::render(report),
        OutputFormat::Markdown => markdown::render(report),
        OutputFormat::Html => html::render(report),
    }
}

/// Single-line JSON, for piping.
pub fn report_compact_json(report: &Report) -> Result<String> {
    json::render_compact(report)
}

/// Color band of a 0-10 score: good, fair or poor.
pub(crate) fn score_band(score: f64) -> ScoreBand {
    if score >= 8.0 {
        ScoreBand::Good
    } else if score >= 6.0 {
        ScoreBand::Fair
    } else {
        ScoreBand::Poor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScoreBand {
    Good,
    Fair,
    Poor,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::{DataQuality, RepositoryMetadata};
    use crate::compare::compare_reports;
    use crate::config::ScoringConfig;
    use crate::fork::{AuthorCount, ForkAttribution, RepositoryRole};
    use crate::metrics::CategoryMetrics;
    use crate::scoring::{HealthScorer, ScoringMode};

    /// A small but fully populated single-repository report
    pub(crate) fn test_report(name: &str, role: RepositoryRole) -> AnalysisReport {
        let mut metrics = CategoryMetrics::default();
        metrics.contributor.has_data = true;
        metrics.contributor.total_contributors = 120;
        metrics.contributor.bus_factor = 12;
        metrics.contributor.contributor_gini = 0.81;
        metrics.commit.has_data = true;
        metrics.commit.total_commits = 900;
        metrics.commit.commits_per_day = 2.5;
        metrics.commit.score = 7.0;
        metrics.ci_cd.has_data = true;
        metrics.ci_cd.has_ci = true;
        metrics.ci_cd.ci_systems = vec!["GitHub Actions".into()];
        metrics.ci_cd.workflow_success_rate = 0.9;
        metrics.ci_cd.score = 9.5;

        let fork = (role == RepositoryRole::Fork).then(|| ForkAttribution {
            original_commit_count: 30,
            upstream_merged_commit_count: 870,
            original_bus_factor: 1,
            original_gini: 0.9,
            top_original_contributors: vec![AuthorCount {
                author: "luke-jr".into(),
                count: 28,
            }],
            ..Default::default()
        });

        let health = HealthScorer::new(&ScoringConfig::default()).calculate(&metrics, ScoringMode::Standard);
        AnalysisReport {
            repository: RepositoryMetadata {
                name: name.into(),
                role,
                period_months: 12,
                stars: 1000,
                ..Default::default()
            },
            metrics,
            fork,
            health,
            data_quality: DataQuality {
                failed_sources: vec!["forge: issues: HTTP 502".into()],
                ..Default::default()
            },
        }
    }

    pub(crate) fn test_comparison() -> ComparisonReport {
        compare_reports(
            test_report("bitcoin/bitcoin", RepositoryRole::Upstream),
            test_report("bitcoinknots/bitcoin", RepositoryRole::Fork),
            true,
        )
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str("md").unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!(OutputFormat::from_str("HTML").unwrap(), OutputFormat::Html);
        assert!(OutputFormat::from_str("sarif").is_err());
    }

    #[test]
    fn test_load_report_detects_shape() {
        let dir = tempfile::tempdir().unwrap();

        let single_path = dir.path().join("single.json");
        let single: Report = test_report("bitcoin/bitcoin", RepositoryRole::Upstream).into();
        std::fs::write(&single_path, report(&single, "json").unwrap()).unwrap();
        assert!(matches!(load_report(&single_path).unwrap(), Report::Single(_)));

        let cmp_path = dir.path().join("cmp.json");
        let cmp: Report = test_comparison().into();
        std::fs::write(&cmp_path, report(&cmp, "json").unwrap()).unwrap();
        match load_report(&cmp_path).unwrap() {
            Report::Comparison(loaded) => {
                assert!(loaded.fight_mode);
                assert_eq!(loaded.repo2.repository.name, "bitcoinknots/bitcoin");
                assert_eq!(loaded.repo2.fork.as_ref().map(|f| f.original_bus_factor), Some(1));
            }
            Report::Single(_) => panic!("comparison read back as a single report"),
        }

        std::fs::write(dir.path().join("bad.json"), "[1, 2").unwrap();
        assert!(load_report(&dir.path().join("bad.json")).is_err());
    }
}
