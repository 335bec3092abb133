//! Markdown reporter for GitHub-flavored Markdown output
//!
//! Generates reports suitable for:
//! - README files
//! - Pull request and issue comments
//! - Mailing-list or wiki posts comparing implementations

use super::{score_band, Report, ScoreBand};
use crate::analysis::{AnalysisReport, DataQuality};
use crate::compare::{ComparisonReport, Recommendations};
use crate::fork::ForkAttribution;
use crate::metrics::CategoryMetrics;
use crate::scoring::{Category, HealthBreakdown};
use anyhow::Result;
use chrono::Local;

/// Maximum original contributors listed in the fork section
const MAX_TOP_CONTRIBUTORS: usize = 10;

/// Render report as GitHub-flavored Markdown
pub fn render(report: &Report) -> Result<String> {
    Ok(match report {
        Report::Single(single) => render_single(single),
        Report::Comparison(cmp) => render_comparison(cmp),
    })
}

fn render_single(report: &AnalysisReport) -> String {
    let mut md = String::new();

    md.push_str(&render_header(report));
    md.push('\n');
    md.push_str(&render_summary(report));
    md.push('\n');
    md.push_str(&render_category_scores(&report.health));
    md.push('\n');
    md.push_str(&render_metrics(&report.metrics));
    md.push('\n');
    if let Some(fork) = &report.fork {
        md.push_str(&render_fork(&report.repository.name, fork));
        md.push('\n');
    }
    md.push_str(&render_quality(&report.data_quality));
    md.push_str(&render_footer());
    md
}

fn grade_emoji(grade: &str) -> &'static str {
    match grade {
        "A" => "🏆",
        "B" => "⭐",
        "C" => "⚠️",
        "D" => "❌",
        "F" => "💀",
        _ => "❓",
    }
}

fn render_header(report: &AnalysisReport) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");

    format!(
        r#"# {} Repository Health Report: {}

**Grade: {}** | **Score: {:.1}/10** | Scoring: {}

Generated: {}
"#,
        grade_emoji(&report.health.grade),
        report.repository.name,
        report.health.grade,
        report.health.overall_score,
        report.health.mode,
        timestamp
    )
}

fn render_summary(report: &AnalysisReport) -> String {
    let repo = &report.repository;
    let assessment = match report.health.grade.as_str() {
        "A" => "Excellent - healthy, resilient project",
        "B" => "Good - minor weaknesses",
        "C" => "Fair - several areas need attention",
        "D" => "Poor - significant concentration or process gaps",
        "F" => "Critical - little observable project health",
        _ => "",
    };

    format!(
        r#"## Summary

| Metric | Value |
|--------|-------|
| **Repository** | {} |
| **Role** | {} |
| **Period** | {} months |
| **Stars / Forks** | {} / {} |
| **Language** | {} |
| **Assessment** | {} |
"#,
        repo.name,
        repo.role,
        repo.period_months,
        repo.stars,
        repo.forks,
        repo.language.as_deref().unwrap_or("-"),
        assessment
    )
}

fn render_category_scores(health: &HealthBreakdown) -> String {
    let mut md = String::from(
        "## Category Scores\n\n| Category | Weight | Score | Status |\n|----------|--------|-------|--------|\n",
    );
    for cat in &health.categories {
        let status = if cat.has_data {
            score_indicator(cat.score)
        } else {
            "➖ No data"
        };
        md.push_str(&format!(
            "| {} | {:.0}% | {:.1}/10 | {} |\n",
            cat.category.title(),
            cat.weight * 100.0,
            cat.score,
            status
        ));
    }
    md.push_str(&format!(
        "| **Overall** | | **{:.1}/10** | **{}** |\n",
        health.overall_score, health.grade
    ));
    md
}

fn render_metrics(m: &CategoryMetrics) -> String {
    let c = &m.contributor;
    let cm = &m.commit;
    let pr = &m.pull_request;
    let cr = &m.code_review;
    let ci = &m.ci_cd;
    let is = &m.issue;
    let t = &m.test;

    format!(
        r#"## Key Metrics

| Category | Metric | Value |
|----------|--------|-------|
| Contributors | Total / active | {} / {} |
| Contributors | Bus factor | {} |
| Contributors | Gini coefficient | {:.3} |
| Contributors | Organization diversity | {:.3} |
| Commits | Total | {} |
| Commits | Per day | {:.2} |
| Commits | Merge commit ratio | {:.2} |
| Commits | Message quality | {:.1}/10 |
| Pull Requests | Total | {} |
| Pull Requests | Merged ratio | {:.0}% |
| Pull Requests | Avg time to merge | {:.1}h |
| Code Review | Reviews per PR | {:.2} |
| Code Review | Self-merged ratio | {:.0}% |
| Code Review | Thoroughness | {:.1}/10 |
| CI/CD | Systems | {} |
| CI/CD | Workflow success rate | {:.0}% |
| Issues | Total / open | {} / {} |
| Issues | Stale ratio | {:.0}% |
| Issues | Avg first response | {:.1}h |
| Testing | Test files | {} |
| Testing | Practice score | {:.1}/10 |
"#,
        c.total_contributors,
        c.active_contributors,
        c.bus_factor,
        c.contributor_gini,
        c.organization_diversity,
        cm.total_commits,
        cm.commits_per_day,
        cm.merge_commit_ratio,
        cm.message_quality.quality_score,
        pr.total_prs,
        pr.merged_ratio * 100.0,
        pr.avg_time_to_merge,
        cr.reviews_per_pr,
        cr.self_merged_ratio * 100.0,
        cr.thoroughness_score,
        if ci.ci_systems.is_empty() {
            "-".to_string()
        } else {
            ci.ci_systems.join(", ")
        },
        ci.workflow_success_rate * 100.0,
        is.total_issues,
        is.open_issues,
        is.stale_issue_ratio * 100.0,
        is.avg_time_to_first_response,
        t.test_files_count,
        t.practice_score
    )
}

fn render_fork(name: &str, fork: &ForkAttribution) -> String {
    let mut md = format!(
        r#"## Fork Attribution: {}

Commits are split by origin. Only original commits count toward the fork's own resilience.

| Metric | Value |
|--------|-------|
| Original commits | {} ({:.1}%) |
| Upstream-merged commits | {} |
| Original contributors | {} |
| Merge-only contributors | {} |
| Original bus factor | {} |
| Original gini | {:.3} |
"#,
        name,
        fork.original_commit_count,
        fork.original_ratio() * 100.0,
        fork.upstream_merged_commit_count,
        fork.original_contributors,
        fork.merge_only_contributors,
        fork.original_bus_factor,
        fork.original_gini
    );

    if !fork.top_original_contributors.is_empty() {
        md.push_str("\n**Top original contributors:**\n\n| Author | Commits |\n|--------|---------|\n");
        for a in fork.top_original_contributors.iter().take(MAX_TOP_CONTRIBUTORS) {
            md.push_str(&format!("| {} | {} |\n", a.author, a.count));
        }
    }
    md
}

fn render_quality(quality: &DataQuality) -> String {
    if quality.is_clean() {
        return String::new();
    }
    let mut md = String::from("## Data Quality\n\n");
    md.push_str(&format!(
        "- Malformed records skipped: {}\n- Commits without author identity: {}\n- Failed merge-commit lookups: {} of {}\n- Merged PRs not checked for self-merge: {}\n",
        quality.skipped.total(),
        quality.dropped_identities,
        quality.self_merge_lookup_failures,
        quality.self_merge_lookups,
        quality.self_merge_unchecked
    ));
    for failure in &quality.failed_sources {
        md.push_str(&format!("- Unavailable: `{}`\n", failure));
    }
    md.push('\n');
    md
}

fn render_comparison(cmp: &ComparisonReport) -> String {
    let (a, b) = (&cmp.repo1, &cmp.repo2);
    let (na, nb) = (&a.repository.name, &b.repository.name);
    let timestamp = match cmp.generated_at {
        Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };

    let mut md = format!(
        "# {} {} vs {}\n\n{}Period: last {} months | Generated: {}\n\n",
        if cmp.fight_mode { "🥊" } else { "⚖️" },
        na,
        nb,
        if cmp.fight_mode {
            "**Fight mode:** fork-aware weights; the fork's bus factor counts original commits only.\n\n"
        } else {
            ""
        },
        cmp.period_months,
        timestamp
    );

    md.push_str(&format!(
        "## Category Scores\n\n| Category | {} | {} | Difference |\n|----------|------|------|------------|\n",
        na, nb
    ));
    for category in Category::ALL {
        let (sa, sb) = (a.health.score_of(category), b.health.score_of(category));
        md.push_str(&format!(
            "| {} | {:.1} | {:.1} | {:+.1} |\n",
            category.title(),
            sa,
            sb,
            sa - sb
        ));
    }
    md.push_str(&format!(
        "| **Overall** | **{:.1}** ({}) | **{:.1}** ({}) | **{:+.1}** |\n\n",
        a.health.overall_score,
        a.health.grade,
        b.health.overall_score,
        b.health.grade,
        cmp.comparison.health_score_difference
    ));

    let c = &cmp.comparison;
    md.push_str(&format!(
        r#"## Metric Differences

Values are `{}` minus `{}`.

| Category | Metric | Difference |
|----------|--------|------------|
| Contributors | Total contributors | {:+} |
| Contributors | Active contributors | {:+} |
| Contributors | Bus factor | {:+} |
| Contributors | Gini coefficient | {:+.3} |
| Commits | Commits per day | {:+.2} |
| Commits | Avg commit size | {:+.1} |
| Commits | Message quality | {:+.1} |
| Commits | Merge commit ratio | {:+.2} |
| Pull Requests | Total PRs | {:+} |
| Pull Requests | Merged ratio | {:+.2} |
| Pull Requests | Avg time to merge (h) | {:+.1} |
| Pull Requests | Velocity score | {:+.1} |
| Code Review | Reviews per PR | {:+.2} |
| Code Review | Comments per PR | {:+.2} |
| Code Review | Self-merged ratio | {:+.2} |
| Code Review | Thoroughness | {:+.1} |
| CI/CD | Has CI | {:+} |
| CI/CD | Workflow success rate | {:+.2} |
| CI/CD | CI systems | {:+} |
| Issues | Total issues | {:+} |
| Issues | Responsiveness | {:+.1} |
| Issues | Categorization | {:+.1} |
| Issues | Stale ratio | {:+.2} |
| Testing | Has tests | {:+} |
| Testing | Test files | {:+} |
| Testing | Practice score | {:+.1} |
"#,
        na,
        nb,
        c.contributor.total_contributors_difference,
        c.contributor.active_contributors_difference,
        c.contributor.bus_factor_difference,
        c.contributor.contributor_gini_difference,
        c.commit.commits_per_day_difference,
        c.commit.avg_commit_size_difference,
        c.commit.quality_score_difference,
        c.commit.merge_commit_ratio_difference,
        c.pull_request.total_prs_difference,
        c.pull_request.merged_ratio_difference,
        c.pull_request.avg_time_to_merge_difference,
        c.pull_request.velocity_score_difference,
        c.code_review.reviews_per_pr_difference,
        c.code_review.comments_per_pr_difference,
        c.code_review.self_merged_ratio_difference,
        c.code_review.thoroughness_score_difference,
        c.ci_cd.has_ci_difference,
        c.ci_cd.workflow_success_rate_difference,
        c.ci_cd.ci_system_count_difference,
        c.issue.total_issues_difference,
        c.issue.responsiveness_score_difference,
        c.issue.categorization_score_difference,
        c.issue.stale_issue_ratio_difference,
        c.test.has_tests_difference,
        c.test.test_files_count_difference,
        c.test.practice_score_difference
    ));
    md.push('\n');

    for report in [a, b] {
        if let Some(fork) = &report.fork {
            md.push_str(&render_fork(&report.repository.name, fork));
            md.push('\n');
        }
    }

    match cmp.leader() {
        Some(name) => md.push_str(&format!("**Healthier overall:** {}\n\n", name)),
        None => md.push_str("**Result:** tie\n\n"),
    }
    md.push_str(&render_recommendations(&cmp.recommendations));
    md.push_str(&render_footer());
    md
}

fn render_recommendations(recs: &Recommendations) -> String {
    let mut md = String::from("## Recommendations\n\n");
    if recs.items.is_empty() {
        md.push_str("No specific recommendations identified.\n\n");
        return md;
    }
    md.push_str(&format!("For **{}**, compared with {}:\n\n", recs.target, recs.reference));
    for item in &recs.items {
        md.push_str(&format!("- **{}**: {}\n", item.title(), item.advice(&recs.reference)));
    }
    md.push('\n');
    md
}

fn render_footer() -> String {
    "---\n\n*Generated by repo-health. Scores are heuristics over public forge data, not audits.*\n".to_string()
}

fn score_indicator(score: f64) -> &'static str {
    match score_band(score) {
        ScoreBand::Good => "✅ Good",
        ScoreBand::Fair => "⚠️ Fair",
        ScoreBand::Poor => "❌ Poor",
    }
}
