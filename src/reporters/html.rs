//! HTML reporter with embedded styles
//!
//! Generates a standalone HTML page that can be viewed in any browser.
//! Includes:
//! - Overall grade and score
//! - Category score bars, side by side for comparisons
//! - Fork attribution with the top original contributors
//! - Recommendations for the trailing repository of a comparison

use super::{score_band, Report, ScoreBand};
use crate::analysis::{AnalysisReport, DataQuality};
use crate::compare::ComparisonReport;
use crate::fork::ForkAttribution;
use crate::scoring::Category;
use anyhow::Result;
use chrono::Local;

const MAX_TOP_CONTRIBUTORS: usize = 10;

/// Render report as standalone HTML
pub fn render(report: &Report) -> Result<String> {
    let (title, body) = match report {
        Report::Single(single) => (
            format!("Repository Health: {}", single.repository.name),
            render_single(single),
        ),
        Report::Comparison(cmp) => (
            format!("{} vs {}", cmp.repo1.repository.name, cmp.repo2.repository.name),
            render_comparison(cmp),
        ),
    };

    let mut html = render_head(&title);
    html.push_str("<body>\n<div class=\"container\">\n");
    html.push_str(&render_header(&title));
    html.push_str("<div class=\"content\">\n");
    html.push_str(&body);
    html.push_str("</div>\n");
    html.push_str(&render_footer());
    html.push_str("</div>\n</body>\n</html>\n");
    Ok(html)
}

fn render_head(title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>
{CSS}
    </style>
</head>
"#,
        html_escape(title)
    )
}

fn render_header(title: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!(
        r#"<div class="header">
    <h1>{}</h1>
    <p class="timestamp">Generated {}</p>
</div>
"#,
        html_escape(title),
        timestamp
    )
}

fn render_single(report: &AnalysisReport) -> String {
    let mut html = render_grade_section(report);
    html.push_str(&render_category_scores(report));
    html.push_str(&render_key_metrics(report));
    if let Some(fork) = &report.fork {
        html.push_str(&render_fork(&report.repository.name, fork));
    }
    html.push_str(&render_quality(&report.data_quality));
    html
}

fn render_grade_section(report: &AnalysisReport) -> String {
    let grade = &report.health.grade;
    format!(
        r#"<div class="grade-section">
    <div class="grade-badge grade-{}">{}</div>
    <div class="score">Overall Score: {:.1}/10</div>
    <p class="grade-description">{} scoring, {} role, last {} months</p>
</div>
"#,
        grade,
        grade,
        report.health.overall_score,
        report.health.mode,
        report.repository.role,
        report.repository.period_months
    )
}

fn render_bar(score: f64) -> String {
    format!(
        r#"<div class="metric-bar"><div class="metric-bar-fill {}" style="width: {:.0}%"></div></div>"#,
        bar_class(score),
        (score * 10.0).clamp(0.0, 100.0)
    )
}

fn render_category_scores(report: &AnalysisReport) -> String {
    let mut html = String::from(
        "<div class=\"section\">\n    <h2 class=\"section-title\">Category Scores</h2>\n    <div class=\"metrics-grid\">\n",
    );
    for cat in &report.health.categories {
        let value = if cat.has_data {
            format!("{:.1}", cat.score)
        } else {
            "no data".to_string()
        };
        html.push_str(&format!(
            r#"        <div class="metric-card">
            <h3>{} ({:.0}%)</h3>
            <div class="metric-value">{}</div>
            {}
        </div>
"#,
            cat.category.title(),
            cat.weight * 100.0,
            value,
            render_bar(cat.score)
        ));
    }
    html.push_str("    </div>\n</div>\n");
    html
}

fn stat(value: impl std::fmt::Display, label: &str) -> String {
    format!(
        "        <div class=\"stat-item\"><div class=\"stat-value\">{}</div><div class=\"stat-label\">{}</div></div>\n",
        value, label
    )
}

fn render_key_metrics(report: &AnalysisReport) -> String {
    let m = &report.metrics;
    let mut html = String::from(
        "<div class=\"section\">\n    <h2 class=\"section-title\">Key Metrics</h2>\n    <div class=\"stats-grid\">\n",
    );
    html.push_str(&stat(m.contributor.total_contributors, "Contributors"));
    html.push_str(&stat(m.contributor.bus_factor, "Bus factor"));
    html.push_str(&stat(format!("{:.2}", m.contributor.contributor_gini), "Gini"));
    html.push_str(&stat(m.commit.total_commits, "Commits"));
    html.push_str(&stat(m.pull_request.total_prs, "Pull requests"));
    html.push_str(&stat(format!("{:.0}%", m.code_review.self_merged_ratio * 100.0), "Self-merged"));
    html.push_str(&stat(format!("{:.0}%", m.ci_cd.workflow_success_rate * 100.0), "CI success"));
    html.push_str(&stat(m.issue.total_issues, "Issues"));
    html.push_str(&stat(m.test.test_files_count, "Test files"));
    html.push_str("    </div>\n</div>\n");
    html
}

fn render_fork(name: &str, fork: &ForkAttribution) -> String {
    let mut html = format!(
        r#"<div class="section">
    <h2 class="section-title">Fork Attribution: {}</h2>
    <div class="stats-grid">
"#,
        html_escape(name)
    );
    html.push_str(&stat(fork.original_commit_count, "Original commits"));
    html.push_str(&stat(fork.upstream_merged_commit_count, "Upstream-merged commits"));
    html.push_str(&stat(format!("{:.0}%", fork.original_ratio() * 100.0), "Original share"));
    html.push_str(&stat(fork.original_bus_factor, "Original bus factor"));
    html.push_str(&stat(format!("{:.2}", fork.original_gini), "Original Gini"));
    html.push_str("    </div>\n");

    if !fork.top_original_contributors.is_empty() {
        html.push_str("    <table>\n        <tr><th>Author</th><th>Original commits</th></tr>\n");
        for a in fork.top_original_contributors.iter().take(MAX_TOP_CONTRIBUTORS) {
            html.push_str(&format!(
                "        <tr><td>{}</td><td>{}</td></tr>\n",
                html_escape(&a.author),
                a.count
            ));
        }
        html.push_str("    </table>\n");
    }
    html.push_str("</div>\n");
    html
}

fn render_quality(quality: &DataQuality) -> String {
    if quality.is_clean() {
        return String::new();
    }
    let mut html = String::from("<div class=\"section\">\n    <h2 class=\"section-title\">Data Quality</h2>\n    <ul>\n");
    html.push_str(&format!(
        "        <li>Malformed records skipped: {}</li>\n        <li>Commits without author identity: {}</li>\n        <li>Failed merge-commit lookups: {} of {}</li>\n        <li>Merged PRs not checked for self-merge: {}</li>\n",
        quality.skipped.total(),
        quality.dropped_identities,
        quality.self_merge_lookup_failures,
        quality.self_merge_lookups,
        quality.self_merge_unchecked
    ));
    for failure in &quality.failed_sources {
        html.push_str(&format!("        <li>Unavailable: <code>{}</code></li>\n", html_escape(failure)));
    }
    html.push_str("    </ul>\n</div>\n");
    html
}

fn render_comparison(cmp: &ComparisonReport) -> String {
    let (a, b) = (&cmp.repo1, &cmp.repo2);
    let mut html = format!(
        r#"<div class="grade-section">
    <div class="versus">
        <div><div class="grade-badge grade-{}">{}</div><div class="score">{:.1}/10</div><p>{}</p></div>
        <div><div class="grade-badge grade-{}">{}</div><div class="score">{:.1}/10</div><p>{}</p></div>
    </div>
    <p class="grade-description">{}last {} months</p>
</div>
"#,
        a.health.grade,
        a.health.grade,
        a.health.overall_score,
        html_escape(&a.repository.name),
        b.health.grade,
        b.health.grade,
        b.health.overall_score,
        html_escape(&b.repository.name),
        if cmp.fight_mode {
            "Fight mode: fork-aware weights, the fork's bus factor counts original commits only. "
        } else {
            ""
        },
        cmp.period_months
    );

    html.push_str(&format!(
        "<div class=\"section\">\n    <h2 class=\"section-title\">Category Scores</h2>\n    <table>\n        <tr><th>Category</th><th>{}</th><th>{}</th><th>Difference</th></tr>\n",
        html_escape(&a.repository.name),
        html_escape(&b.repository.name)
    ));
    for category in Category::ALL {
        let (sa, sb) = (a.health.score_of(category), b.health.score_of(category));
        html.push_str(&format!(
            "        <tr><td>{}</td><td>{:.1} {}</td><td>{:.1} {}</td><td>{:+.1}</td></tr>\n",
            category.title(),
            sa,
            render_bar(sa),
            sb,
            render_bar(sb),
            sa - sb
        ));
    }
    html.push_str(&format!(
        "        <tr><th>Overall</th><th>{:.1}</th><th>{:.1}</th><th>{:+.1}</th></tr>\n    </table>\n</div>\n",
        a.health.overall_score, b.health.overall_score, cmp.comparison.health_score_difference
    ));

    for report in [a, b] {
        if let Some(fork) = &report.fork {
            html.push_str(&render_fork(&report.repository.name, fork));
        }
    }

    let verdict = match cmp.leader() {
        Some(name) => format!("Healthier overall: <strong>{}</strong>", html_escape(name)),
        None => "Result: tie".to_string(),
    };
    html.push_str(&format!("<div class=\"section\"><p class=\"verdict\">{}</p></div>\n", verdict));

    let recs = &cmp.recommendations;
    html.push_str("<div class=\"section\">\n    <h2 class=\"section-title\">Recommendations</h2>\n");
    if recs.items.is_empty() {
        html.push_str("    <p>No specific recommendations identified.</p>\n");
    } else {
        html.push_str(&format!(
            "    <p>For <strong>{}</strong>, compared with {}:</p>\n    <ul>\n",
            html_escape(&recs.target),
            html_escape(&recs.reference)
        ));
        for item in &recs.items {
            html.push_str(&format!(
                "        <li class=\"recommendation\"><strong>{}</strong>: {}</li>\n",
                item.title(),
                html_escape(&item.advice(&recs.reference))
            ));
        }
        html.push_str("    </ul>\n");
    }
    html.push_str("</div>\n");
    html
}

fn render_footer() -> String {
    r#"<div class="footer">
    <p>Generated by repo-health. Scores are heuristics over public forge data, not audits.</p>
</div>
"#
    .to_string()
}

fn bar_class(score: f64) -> &'static str {
    match score_band(score) {
        ScoreBand::Good => "bar-good",
        ScoreBand::Fair => "bar-moderate",
        ScoreBand::Poor => "bar-poor",
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const CSS: &str = r#"
:root {
    --primary-color: #f7931a;
    --background-color: #f8fafc;
    --text-color: #1e293b;
    --border-color: #e2e8f0;
}

* { margin: 0; padding: 0; box-sizing: border-box; }

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    line-height: 1.6;
    color: var(--text-color);
    background: var(--background-color);
    padding: 2rem;
}

.container {
    max-width: 1100px;
    margin: 0 auto;
    background: white;
    border-radius: 12px;
    box-shadow: 0 4px 6px -1px rgba(0,0,0,0.1);
    overflow: hidden;
}

.header {
    background: linear-gradient(135deg, #f7931a 0%, #c2410c 100%);
    color: white;
    padding: 2.5rem 2rem;
    text-align: center;
}

.header h1 { font-size: 2rem; margin-bottom: 0.5rem; }
.header .timestamp { opacity: 0.9; font-size: 0.95rem; }

.content { padding: 2rem; }

.grade-section {
    text-align: center;
    padding: 2rem;
    background: #f1f5f9;
    border-radius: 8px;
    margin-bottom: 2rem;
}

.versus { display: flex; justify-content: space-around; gap: 2rem; }

.grade-badge {
    display: inline-block;
    font-size: 3rem;
    font-weight: bold;
    width: 100px;
    height: 100px;
    line-height: 100px;
    border-radius: 50%;
    margin-bottom: 1rem;
    color: white;
}

.grade-A { background: #10b981; }
.grade-B { background: #22c55e; }
.grade-C { background: #eab308; }
.grade-D { background: #f97316; }
.grade-F { background: #ef4444; }

.score { font-size: 1.5rem; color: #64748b; margin-bottom: 0.5rem; }
.grade-description { color: #64748b; font-style: italic; }

.section { margin-bottom: 2rem; }
.section-title {
    font-size: 1.5rem;
    margin-bottom: 1rem;
    padding-bottom: 0.5rem;
    border-bottom: 2px solid var(--border-color);
}

.metrics-grid, .stats-grid {
    display: grid;
    grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
    gap: 1rem;
    margin-bottom: 1rem;
}

.metric-card, .stat-item {
    border: 1px solid var(--border-color);
    border-radius: 8px;
    padding: 1.25rem;
}

.metric-card h3 { font-size: 0.875rem; color: #64748b; margin-bottom: 0.5rem; text-transform: uppercase; }
.metric-value, .stat-value { font-size: 1.75rem; font-weight: bold; margin-bottom: 0.5rem; }
.stat-item { text-align: center; }
.stat-label { font-size: 0.875rem; color: #64748b; }

.metric-bar { height: 8px; background: #e2e8f0; border-radius: 4px; overflow: hidden; min-width: 80px; }
.metric-bar-fill { height: 100%; border-radius: 4px; }
.bar-good { background: #10b981; }
.bar-moderate { background: #f59e0b; }
.bar-poor { background: #ef4444; }

table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { text-align: left; padding: 0.75rem; border-bottom: 1px solid var(--border-color); }
th { background: #f2f2f2; }

ul { padding-left: 1.5rem; }
.recommendation { margin-bottom: 0.5rem; }
.verdict { font-size: 1.25rem; text-align: center; }
code { background: #f0f0f0; padding: 2px 4px; border-radius: 4px; }

.footer {
    text-align: center;
    padding: 2rem;
    color: #64748b;
    border-top: 1px solid var(--border-color);
}

@media (max-width: 768px) {
    body { padding: 1rem; }
    .versus { flex-direction: column; }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fork::RepositoryRole;
    use crate::reporters::tests::{test_comparison, test_report};

    #[test]
    fn test_html_single() {
        let report: Report = test_report("bitcoinknots/bitcoin", RepositoryRole::Fork).into();
        let html = render(&report).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Repository Health: bitcoinknots/bitcoin</title>"));
        assert!(html.contains("Fork Attribution: bitcoinknots/bitcoin"));
        assert!(html.contains("<td>luke-jr</td><td>28</td>"));
        assert!(html.contains("CI/CD"));
        assert!(html.contains("width: 95%"));
        assert!(html.ends_with("</html>\n"));
    }

    #[test]
    fn test_html_comparison() {
        let html = render(&test_comparison().into()).unwrap();
        assert!(html.contains("bitcoin/bitcoin vs bitcoinknots/bitcoin"));
        assert!(html.contains("Fight mode"));
        assert!(html.contains("Result: tie"));
        assert!(html.contains("<strong>Increase bus factor</strong>"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
