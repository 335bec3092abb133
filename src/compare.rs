//! Side-by-side comparison of two analyses
//!
//! Every difference is `repo1 - repo2`, so a positive value means the first
//! repository has more of that quantity. The repository with the lower (or
//! equal) overall score also gets recommendations wherever it trails the
//! other by a clear margin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::AnalysisReport;
use crate::metrics::{
    CategoryMetrics, CiCdMetrics, CodeReviewMetrics, CommitMetrics, ContributorMetrics, IssueMetrics,
    PullRequestMetrics, TestMetrics,
};
use crate::models::round_to;

/// Score gap (0-10 scales) that triggers a recommendation.
const SCORE_GAP: f64 = 2.0;
const BUS_FACTOR_GAP: i64 = 2;
const SELF_MERGE_GAP: f64 = 0.2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributorDifference {
    pub total_contributors_difference: i64,
    pub active_contributors_difference: i64,
    pub bus_factor_difference: i64,
    pub contributor_gini_difference: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitDifference {
    pub commits_per_day_difference: f64,
    pub avg_commit_size_difference: f64,
    pub quality_score_difference: f64,
    pub merge_commit_ratio_difference: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestDifference {
    pub total_prs_difference: i64,
    pub merged_ratio_difference: f64,
    pub avg_time_to_merge_difference: f64,
    pub velocity_score_difference: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeReviewDifference {
    pub reviews_per_pr_difference: f64,
    pub comments_per_pr_difference: f64,
    pub self_merged_ratio_difference: f64,
    pub thoroughness_score_difference: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CiCdDifference {
    /// 1 when only repo1 has CI, -1 when only repo2 has it
    pub has_ci_difference: i8,
    pub workflow_success_rate_difference: f64,
    pub ci_system_count_difference: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueDifference {
    pub total_issues_difference: i64,
    pub responsiveness_score_difference: f64,
    pub categorization_score_difference: f64,
    pub stale_issue_ratio_difference: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestDifference {
    pub has_tests_difference: i8,
    pub test_files_count_difference: i64,
    pub practice_score_difference: f64,
}

/// Per-category differences between two metric bundles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricComparison {
    pub contributor: ContributorDifference,
    pub commit: CommitDifference,
    pub pull_request: PullRequestDifference,
    pub code_review: CodeReviewDifference,
    pub ci_cd: CiCdDifference,
    pub issue: IssueDifference,
    pub test: TestDifference,
    pub health_score_difference: f64,
}

/// An area where one repository trails the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    BusFactor,
    CommitMessages,
    PrVelocity,
    IndependentReview,
    ReviewThoroughness,
    AddCi,
    IssueResponsiveness,
    AddTests,
}

impl Recommendation {
    pub fn title(self) -> &'static str {
        match self {
            Recommendation::BusFactor => "Increase bus factor",
            Recommendation::CommitMessages => "Improve commit messages",
            Recommendation::PrVelocity => "Speed up pull requests",
            Recommendation::IndependentReview => "Strengthen independent review",
            Recommendation::ReviewThoroughness => "Improve review thoroughness",
            Recommendation::AddCi => "Add CI",
            Recommendation::IssueResponsiveness => "Improve issue responsiveness",
            Recommendation::AddTests => "Add tests",
        }
    }

    /// One-sentence advice naming the repository to learn from.
    pub fn advice(self, reference: &str) -> String {
        match self {
            Recommendation::BusFactor => format!(
                "spread knowledge and commits across more people; {} has a clearly higher bus factor",
                reference
            ),
            Recommendation::CommitMessages => format!(
                "write more descriptive, consistently formatted commit messages, as {} does",
                reference
            ),
            Recommendation::PrVelocity => format!(
                "shorten time to merge and raise throughput; {} processes pull requests much faster",
                reference
            ),
            Recommendation::IndependentReview => format!(
                "require review by someone other than the author before merging; {} self-merges far less",
                reference
            ),
            Recommendation::ReviewThoroughness => format!(
                "get more reviewers and substantive comments per pull request, as {} does",
                reference
            ),
            Recommendation::AddCi => format!("set up continuous integration like {}", reference),
            Recommendation::IssueResponsiveness => format!(
                "triage and answer issues sooner, as {} does",
                reference
            ),
            Recommendation::AddTests => format!("add automated tests like {}", reference),
        }
    }
}

/// Recommendations for the trailing repository of a pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendations {
    /// Repository the advice is for
    pub target: String,
    /// Repository it is measured against
    pub reference: String,
    pub items: Vec<Recommendation>,
}

/// Areas where `target` trails `reference` by a clear margin.
///
/// `target_bus` and `reference_bus` are the bus factors to compare, which in
/// fight mode are the fork's original-only one.
pub fn recommend(
    target: &CategoryMetrics,
    reference: &CategoryMetrics,
    target_bus: usize,
    reference_bus: usize,
) -> Vec<Recommendation> {
    let mut items = Vec::new();
    if diff_count(reference_bus, target_bus) >= BUS_FACTOR_GAP {
        items.push(Recommendation::BusFactor);
    }
    if reference.commit.message_quality.quality_score - target.commit.message_quality.quality_score >= SCORE_GAP {
        items.push(Recommendation::CommitMessages);
    }
    if reference.pull_request.velocity_score - target.pull_request.velocity_score >= SCORE_GAP {
        items.push(Recommendation::PrVelocity);
    }
    if target.code_review.self_merged_ratio - reference.code_review.self_merged_ratio >= SELF_MERGE_GAP {
        items.push(Recommendation::IndependentReview);
    }
    if reference.code_review.thoroughness_score - target.code_review.thoroughness_score >= SCORE_GAP {
        items.push(Recommendation::ReviewThoroughness);
    }
    if reference.ci_cd.has_ci && !target.ci_cd.has_ci {
        items.push(Recommendation::AddCi);
    }
    if reference.issue.responsiveness_score - target.issue.responsiveness_score >= SCORE_GAP {
        items.push(Recommendation::IssueResponsiveness);
    }
    if reference.test.has_tests && !target.test.has_tests {
        items.push(Recommendation::AddTests);
    }
    items
}

/// Bus factor a report is judged on.
fn effective_bus_factor(report: &AnalysisReport, fight_mode: bool) -> usize {
    match (&report.fork, fight_mode) {
        (Some(fork), true) => fork.original_bus_factor,
        _ => report.metrics.contributor.bus_factor,
    }
}

fn recommendations_for(target: &AnalysisReport, reference: &AnalysisReport, fight_mode: bool) -> Recommendations {
    Recommendations {
        target: target.repository.name.clone(),
        reference: reference.repository.name.clone(),
        items: recommend(
            &target.metrics,
            &reference.metrics,
            effective_bus_factor(target, fight_mode),
            effective_bus_factor(reference, fight_mode),
        ),
    }
}

/// Two analyses and their differences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub repo1: AnalysisReport,
    pub repo2: AnalysisReport,
    #[serde(default)]
    pub comparison: MetricComparison,
    #[serde(default)]
    pub fight_mode: bool,
    #[serde(default)]
    pub period_months: u32,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recommendations: Recommendations,
}

impl ComparisonReport {
    /// Name of the repository with the higher overall score, `None` on a tie.
    pub fn leader(&self) -> Option<&str> {
        let diff = self.comparison.health_score_difference;
        if diff > 0.0 {
            Some(&self.repo1.repository.name)
        } else if diff < 0.0 {
            Some(&self.repo2.repository.name)
        } else {
            None
        }
    }
}

fn diff_count(a: usize, b: usize) -> i64 {
    a as i64 - b as i64
}

fn presence(a: bool, b: bool) -> i8 {
    match (a, b) {
        (true, false) => 1,
        (false, true) => -1,
        _ => 0,
    }
}

fn compare_contributors(a: &ContributorMetrics, b: &ContributorMetrics) -> ContributorDifference {
    ContributorDifference {
        total_contributors_difference: diff_count(a.total_contributors, b.total_contributors),
        active_contributors_difference: diff_count(a.active_contributors, b.active_contributors),
        bus_factor_difference: diff_count(a.bus_factor, b.bus_factor),
        contributor_gini_difference: a.contributor_gini - b.contributor_gini,
    }
}

fn compare_commits(a: &CommitMetrics, b: &CommitMetrics) -> CommitDifference {
    CommitDifference {
        commits_per_day_difference: a.commits_per_day - b.commits_per_day,
        avg_commit_size_difference: a.avg_commit_size - b.avg_commit_size,
        quality_score_difference: a.message_quality.quality_score - b.message_quality.quality_score,
        merge_commit_ratio_difference: a.merge_commit_ratio - b.merge_commit_ratio,
    }
}

fn compare_pull_requests(a: &PullRequestMetrics, b: &PullRequestMetrics) -> PullRequestDifference {
    PullRequestDifference {
        total_prs_difference: diff_count(a.total_prs, b.total_prs),
        merged_ratio_difference: a.merged_ratio - b.merged_ratio,
        avg_time_to_merge_difference: a.avg_time_to_merge - b.avg_time_to_merge,
        velocity_score_difference: a.velocity_score - b.velocity_score,
    }
}

fn compare_code_review(a: &CodeReviewMetrics, b: &CodeReviewMetrics) -> CodeReviewDifference {
    CodeReviewDifference {
        reviews_per_pr_difference: a.reviews_per_pr - b.reviews_per_pr,
        comments_per_pr_difference: a.comments_per_pr - b.comments_per_pr,
        self_merged_ratio_difference: a.self_merged_ratio - b.self_merged_ratio,
        thoroughness_score_difference: a.thoroughness_score - b.thoroughness_score,
    }
}

fn compare_ci_cd(a: &CiCdMetrics, b: &CiCdMetrics) -> CiCdDifference {
    CiCdDifference {
        has_ci_difference: presence(a.has_ci, b.has_ci),
        workflow_success_rate_difference: a.workflow_success_rate - b.workflow_success_rate,
        ci_system_count_difference: diff_count(a.ci_systems.len(), b.ci_systems.len()),
    }
}

fn compare_issues(a: &IssueMetrics, b: &IssueMetrics) -> IssueDifference {
    IssueDifference {
        total_issues_difference: diff_count(a.total_issues, b.total_issues),
        responsiveness_score_difference: a.responsiveness_score - b.responsiveness_score,
        categorization_score_difference: a.categorization_score - b.categorization_score,
        stale_issue_ratio_difference: a.stale_issue_ratio - b.stale_issue_ratio,
    }
}

fn compare_tests(a: &TestMetrics, b: &TestMetrics) -> TestDifference {
    TestDifference {
        has_tests_difference: presence(a.has_tests, b.has_tests),
        test_files_count_difference: diff_count(a.test_files_count, b.test_files_count),
        practice_score_difference: a.practice_score - b.practice_score,
    }
}

/// Differences of every category plus the overall score.
pub fn compare_metrics(a: &CategoryMetrics, b: &CategoryMetrics, score_a: f64, score_b: f64) -> MetricComparison {
    MetricComparison {
        contributor: compare_contributors(&a.contributor, &b.contributor),
        commit: compare_commits(&a.commit, &b.commit),
        pull_request: compare_pull_requests(&a.pull_request, &b.pull_request),
        code_review: compare_code_review(&a.code_review, &b.code_review),
        ci_cd: compare_ci_cd(&a.ci_cd, &b.ci_cd),
        issue: compare_issues(&a.issue, &b.issue),
        test: compare_tests(&a.test, &b.test),
        // both inputs carry one decimal
        health_score_difference: round_to(score_a - score_b, 1),
    }
}

pub fn compare_reports(repo1: AnalysisReport, repo2: AnalysisReport, fight_mode: bool) -> ComparisonReport {
    let comparison = compare_metrics(
        &repo1.metrics,
        &repo2.metrics,
        repo1.overall_score(),
        repo2.overall_score(),
    );
    debug!(
        "{} vs {}: health difference {:+.1}",
        repo1.repository.name, repo2.repository.name, comparison.health_score_difference
    );
    let period_months = repo1.repository.period_months;
    let generated_at = repo1.repository.analysis_date.or(repo2.repository.analysis_date);
    // the second repository gets the advice unless it leads
    let recommendations = if comparison.health_score_difference >= 0.0 {
        recommendations_for(&repo2, &repo1, fight_mode)
    } else {
        recommendations_for(&repo1, &repo2, fight_mode)
    };
    ComparisonReport {
        repo1,
        repo2,
        comparison,
        fight_mode,
        period_months,
        generated_at,
        recommendations,
    }
}
