//! Rendering and writing reports

use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::reporters::{self, load_report, OutputFormat, Report};

/// Output flags shared by every command that produces a report.
#[derive(Debug, Clone)]
pub(super) struct OutputOptions {
    format: OutputFormat,
    path: Option<PathBuf>,
    compact: bool,
}

impl OutputOptions {
    pub(super) fn new(format: &str, path: Option<PathBuf>, compact: bool) -> Result<Self> {
        Ok(Self {
            format: OutputFormat::from_str(format)?,
            path,
            compact,
        })
    }

    fn render(&self, report: &Report) -> Result<String> {
        if self.compact && self.format == OutputFormat::Json {
            reporters::report_compact_json(report)
        } else {
            reporters::report_with_format(report, self.format)
        }
    }

    /// Print to stdout, or write to `--output` when given.
    pub(super) fn emit(&self, report: &Report) -> Result<()> {
        let output = self.render(report)?;
        match &self.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                std::fs::write(path, &output)
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                // stderr keeps stdout clean for piping
                eprintln!(
                    "\n{}Report written to: {}",
                    style("📄 ").bold(),
                    style(path.display()).cyan()
                );
            }
            None => {
                if self.format != OutputFormat::Json {
                    println!();
                }
                println!("{}", output);
            }
        }
        Ok(())
    }
}

/// `report --metrics`: re-render a saved JSON report.
pub(super) fn run_report(metrics: &Path, out: &OutputOptions) -> Result<()> {
    let report = load_report(metrics)?;
    out.emit(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisReport;

    #[test]
    fn test_emit_to_file_and_rerender() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("out").join("report.json");
        let mut report = AnalysisReport::default();
        report.repository.name = "bitcoin/bitcoin".into();

        let json = OutputOptions::new("json", Some(json_path.clone()), true).unwrap();
        json.emit(&Report::from(report)).unwrap();
        let written = std::fs::read_to_string(&json_path).unwrap();
        assert!(!written.contains('\n'));

        let md_path = dir.path().join("report.md");
        let md = OutputOptions::new("md", Some(md_path.clone()), false).unwrap();
        run_report(&json_path, &md).unwrap();
        let rendered = std::fs::read_to_string(&md_path).unwrap();
        assert!(rendered.contains("Repository Health Report: bitcoin/bitcoin"));

        let html_path = dir.path().join("report.html");
        let html = OutputOptions::new("html", Some(html_path.clone()), false).unwrap();
        run_report(&json_path, &html).unwrap();
        let page = std::fs::read_to_string(&html_path).unwrap();
        assert!(page.contains("<title>Repository Health: bitcoin/bitcoin</title>"));
    }

    #[test]
    fn test_invalid_format() {
        assert!(OutputFormat::from_str("sarif").is_err());
        assert!(OutputOptions::new("pdf", None, false).is_err());
        assert!(OutputOptions::new("html", None, false).is_ok());
    }
}
