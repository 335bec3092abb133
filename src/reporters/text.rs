//! Text (terminal) reporter with colors and formatting

use super::{score_band, Report, ScoreBand};
use crate::analysis::{AnalysisReport, DataQuality};
use crate::compare::ComparisonReport;
use crate::fork::ForkAttribution;
use crate::metrics::CategoryMetrics;
use crate::scoring::Category;
use anyhow::Result;

/// Grade colors (ANSI escape codes)
fn grade_color(grade: &str) -> &'static str {
    match grade {
        "A" => "\x1b[32m", // Green
        "B" => "\x1b[92m", // Light green
        "C" => "\x1b[33m", // Yellow
        "D" => "\x1b[91m", // Light red
        "F" => "\x1b[31m", // Red
        _ => "\x1b[0m",
    }
}

/// Reset ANSI color
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RULE: &str = "──────────────────────────────────────────────────";

/// Render report as formatted terminal output
pub fn render(report: &Report) -> Result<String> {
    Ok(match report {
        Report::Single(single) => render_single(single),
        Report::Comparison(cmp) => render_comparison(cmp),
    })
}

fn render_single(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let repo = &report.repository;
    let health = &report.health;

    // Header
    let grade_c = grade_color(&health.grade);
    out.push_str(&format!("\n{BOLD}Repository Health: {}{RESET}\n", repo.name));
    out.push_str(&format!("{DIM}{RULE}{RESET}\n"));
    out.push_str(&format!(
        "Score: {BOLD}{:.1}/10{RESET}  Grade: {grade_c}{BOLD}{}{RESET}  Scoring: {}\n",
        health.overall_score, health.grade, health.mode
    ));
    out.push_str(&format!(
        "{DIM}Role: {}  Period: {} months  Stars: {}  Forks: {}{}{RESET}\n\n",
        repo.role,
        repo.period_months,
        repo.stars,
        repo.forks,
        repo.language
            .as_deref()
            .map(|l| format!("  Language: {}", l))
            .unwrap_or_default()
    ));

    // Category scores
    out.push_str(&format!("{BOLD}SCORES{RESET}\n"));
    for cat in &health.categories {
        let note = if cat.has_data {
            String::new()
        } else {
            format!("  {DIM}no data{RESET}")
        };
        out.push_str(&format!(
            "  {:<15} {}  {DIM}({:>2.0}%){RESET}{}\n",
            cat.category.title(),
            format_score(cat.score),
            cat.weight * 100.0,
            note
        ));
    }
    out.push('\n');

    out.push_str(&format!("{BOLD}KEY METRICS{RESET}\n"));
    for line in metric_lines(&report.metrics) {
        out.push_str(&format!("  {}\n", line));
    }
    out.push('\n');

    if let Some(fork) = &report.fork {
        out.push_str(&render_fork(fork));
    }

    out.push_str(&render_quality(&report.data_quality));
    out
}

fn metric_lines(m: &CategoryMetrics) -> Vec<String> {
    let mut lines = Vec::new();
    if m.contributor.has_data {
        lines.push(format!(
            "Contributors: {} total, {} active, bus factor {}, gini {:.3}",
            m.contributor.total_contributors,
            m.contributor.active_contributors,
            m.contributor.bus_factor,
            m.contributor.contributor_gini
        ));
    }
    if m.commit.has_data {
        lines.push(format!(
            "Commits: {} ({:.2}/day), merge ratio {:.2}, message quality {:.1}",
            m.commit.total_commits,
            m.commit.commits_per_day,
            m.commit.merge_commit_ratio,
            m.commit.message_quality.quality_score
        ));
    }
    if m.pull_request.has_data {
        lines.push(format!(
            "Pull requests: {} total, {:.0}% merged, {:.1}h to merge",
            m.pull_request.total_prs,
            m.pull_request.merged_ratio * 100.0,
            m.pull_request.avg_time_to_merge
        ));
    }
    if m.code_review.has_data {
        lines.push(format!(
            "Code review: {:.1} reviews/PR, {:.1} comments/PR, {:.0}% self-merged",
            m.code_review.reviews_per_pr,
            m.code_review.comments_per_pr,
            m.code_review.self_merged_ratio * 100.0
        ));
    }
    if m.ci_cd.has_ci {
        lines.push(format!(
            "CI/CD: {}, {:.0}% success",
            if m.ci_cd.ci_systems.is_empty() {
                "workflow runs".to_string()
            } else {
                m.ci_cd.ci_systems.join(", ")
            },
            m.ci_cd.workflow_success_rate * 100.0
        ));
    }
    if m.issue.has_data {
        lines.push(format!(
            "Issues: {} total, {:.0}% stale, {:.1}h to first response",
            m.issue.total_issues,
            m.issue.stale_issue_ratio * 100.0,
            m.issue.avg_time_to_first_response
        ));
    }
    if m.test.has_tests {
        lines.push(format!(
            "Testing: {} test files, practice score {:.1}",
            m.test.test_files_count, m.test.practice_score
        ));
    }
    if lines.is_empty() {
        lines.push(format!("{DIM}No data collected{RESET}"));
    }
    lines
}

fn render_fork(fork: &ForkAttribution) -> String {
    let mut out = format!("{BOLD}FORK ATTRIBUTION{RESET}\n");
    out.push_str(&format!(
        "  Original commits: {} ({:.1}%)  Upstream-merged: {}\n",
        fork.original_commit_count,
        fork.original_ratio() * 100.0,
        fork.upstream_merged_commit_count
    ));
    out.push_str(&format!(
        "  Original bus factor: {}  Original gini: {:.3}  Merge-only contributors: {}\n",
        fork.original_bus_factor, fork.original_gini, fork.merge_only_contributors
    ));
    if !fork.top_original_contributors.is_empty() {
        let top: Vec<String> = fork
            .top_original_contributors
            .iter()
            .take(5)
            .map(|a| format!("{} ({})", a.author, a.count))
            .collect();
        out.push_str(&format!("  Top original: {}\n", top.join(", ")));
    }
    out.push('\n');
    out
}

fn render_quality(quality: &DataQuality) -> String {
    if quality.is_clean() {
        return String::new();
    }
    let mut out = format!("{BOLD}DATA QUALITY{RESET}\n");
    let skipped = quality.skipped.total();
    if skipped > 0 {
        out.push_str(&format!("  {} malformed records skipped\n", skipped));
    }
    if quality.dropped_identities > 0 {
        out.push_str(&format!(
            "  {} commits without author identity\n",
            quality.dropped_identities
        ));
    }
    if quality.self_merge_lookup_failures > 0 {
        out.push_str(&format!(
            "  {} of {} merge-commit lookups failed\n",
            quality.self_merge_lookup_failures, quality.self_merge_lookups
        ));
    }
    if quality.self_merge_unchecked > 0 {
        out.push_str(&format!(
            "  {} merged PRs not checked for self-merge (lookup cap)\n",
            quality.self_merge_unchecked
        ));
    }
    for failure in &quality.failed_sources {
        out.push_str(&format!("  {DIM}unavailable:{RESET} {}\n", failure));
    }
    out.push('\n');
    out
}

fn render_comparison(cmp: &ComparisonReport) -> String {
    let mut out = String::new();
    let (a, b) = (&cmp.repo1, &cmp.repo2);

    out.push_str(&format!(
        "\n{BOLD}{} vs {}{RESET}{}  {DIM}last {} months{RESET}\n",
        a.repository.name,
        b.repository.name,
        if cmp.fight_mode { "  [fight mode]" } else { "" },
        cmp.period_months
    ));
    out.push_str(&format!("{DIM}{RULE}{RESET}\n"));
    out.push_str(&format!(
        "{DIM}  {:<15} {:>7} {:>7} {:>7}{RESET}\n",
        "CATEGORY", "REPO 1", "REPO 2", "DIFF"
    ));
    for category in Category::ALL {
        let (sa, sb) = (a.health.score_of(category), b.health.score_of(category));
        out.push_str(&format!(
            "  {:<15} {}    {}    {:>+5.1}\n",
            category.title(),
            format_score(sa),
            format_score(sb),
            sa - sb
        ));
    }
    out.push_str(&format!(
        "  {BOLD}{:<15}{RESET} {}    {}    {BOLD}{:>+5.1}{RESET}\n\n",
        "Overall",
        format_score(a.health.overall_score),
        format_score(b.health.overall_score),
        cmp.comparison.health_score_difference
    ));

    let c = &cmp.comparison;
    out.push_str(&format!("{BOLD}KEY DIFFERENCES{RESET} {DIM}(repo 1 - repo 2){RESET}\n"));
    out.push_str(&format!(
        "  Bus factor {:+}  Contributors {:+}  Gini {:+.3}\n",
        c.contributor.bus_factor_difference,
        c.contributor.total_contributors_difference,
        c.contributor.contributor_gini_difference
    ));
    out.push_str(&format!(
        "  Commits/day {:+.2}  PRs {:+}  Merged ratio {:+.2}\n",
        c.commit.commits_per_day_difference,
        c.pull_request.total_prs_difference,
        c.pull_request.merged_ratio_difference
    ));
    out.push_str(&format!(
        "  Reviews/PR {:+.2}  Self-merged ratio {:+.2}  CI success {:+.2}\n\n",
        c.code_review.reviews_per_pr_difference,
        c.code_review.self_merged_ratio_difference,
        c.ci_cd.workflow_success_rate_difference
    ));

    for fork in [&a.fork, &b.fork].into_iter().flatten() {
        out.push_str(&render_fork(fork));
    }

    match cmp.leader() {
        Some(name) => out.push_str(&format!("{BOLD}Healthier: {}{RESET}\n", name)),
        None => out.push_str(&format!("{DIM}Both repositories score the same.{RESET}\n")),
    }

    let recs = &cmp.recommendations;
    if !recs.items.is_empty() {
        out.push_str(&format!("\n{BOLD}RECOMMENDATIONS FOR {}{RESET}\n", recs.target));
        for item in &recs.items {
            out.push_str(&format!("  - {}: {}\n", item.title(), item.advice(&recs.reference)));
        }
    }
    out
}

fn format_score(score: f64) -> String {
    let color = match score_band(score) {
        ScoreBand::Good => "\x1b[32m",
        ScoreBand::Fair => "\x1b[33m",
        ScoreBand::Poor => "\x1b[31m",
    };
    format!("{color}{:>4.1}{RESET}", score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fork::RepositoryRole;
    use crate::reporters::tests::{test_comparison, test_report};

    #[test]
    fn test_text_single() {
        let report: Report = test_report("bitcoinknots/bitcoin", RepositoryRole::Fork).into();
        let out = render(&report).unwrap();
        assert!(out.contains("Repository Health: bitcoinknots/bitcoin"));
        assert!(out.contains("FORK ATTRIBUTION"));
        assert!(out.contains("luke-jr (28)"));
        assert!(out.contains("bus factor 12"));
        assert!(out.contains("forge: issues: HTTP 502"));
    }

    #[test]
    fn test_text_marks_missing_categories() {
        let report: Report = test_report("bitcoin/bitcoin", RepositoryRole::Upstream).into();
        let out = render(&report).unwrap();
        assert!(out.contains("no data"));
        assert!(!out.contains("FORK ATTRIBUTION"));
    }

    #[test]
    fn test_text_comparison() {
        let out = render(&test_comparison().into()).unwrap();
        assert!(out.contains("bitcoin/bitcoin vs bitcoinknots/bitcoin"));
        assert!(out.contains("[fight mode]"));
        assert!(out.contains("KEY DIFFERENCES"));
        assert!(out.contains("Both repositories score the same."));
        assert!(out.contains("RECOMMENDATIONS FOR bitcoinknots/bitcoin"));
        assert!(out.contains("Increase bus factor: spread knowledge"));
    }
}
