//! Per-category metric calculators
//!
//! Each calculator is a pure reduction over normalized records. Empty input
//! yields the category's `Default` record with `has_data == false`; nothing
//! here returns an error.
//!
//! | Category       | Score                                                   |
//! |----------------|---------------------------------------------------------|
//! | contributor    | bus-factor table, adjusted by contributor count         |
//! | commit         | frequency base × 0.7 + message quality × 0.3            |
//! | pull_request   | merged ratio × 10 × 0.5 + velocity × 0.5                |
//! | code_review    | thoroughness × 0.7 + (1 − self-merged ratio) × 10 × 0.3 |
//! | ci_cd          | 5 + success rate × 5 when CI exists                     |
//! | issue          | responsiveness × 0.7 + categorization × 0.3             |
//! | test           | testing practice score when tests exist                 |
//!
//! The contributor score lives in [`crate::scoring`] because fork-aware
//! scoring swaps its bus-factor input.

pub mod ci_cd;
pub mod code_review;
pub mod commits;
pub mod contributor;
pub mod inequality;
pub mod issues;
pub mod pull_requests;
pub mod testing;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use ci_cd::CiCdMetrics;
pub use code_review::CodeReviewMetrics;
pub use commits::{CommitFrequency, CommitMetrics};
pub use contributor::{ContributorMetrics, ForkContributorSummary};
pub use issues::IssueMetrics;
pub use pull_requests::PullRequestMetrics;
pub use testing::TestMetrics;

/// All seven category records for one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryMetrics {
    pub contributor: ContributorMetrics,
    pub commit: CommitMetrics,
    pub pull_request: PullRequestMetrics,
    pub code_review: CodeReviewMetrics,
    pub ci_cd: CiCdMetrics,
    pub issue: IssueMetrics,
    pub test: TestMetrics,
}

impl CategoryMetrics {
    /// True when no category received any data.
    pub fn is_empty(&self) -> bool {
        !(self.contributor.has_data
            || self.commit.has_data
            || self.pull_request.has_data
            || self.code_review.has_data
            || self.ci_cd.has_data
            || self.issue.has_data
            || self.test.has_data)
    }
}

/// Fractional hours from `start` to `end`.
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}

/// Arithmetic mean, 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Map an average response time in hours onto 0-10.
///
/// Shared by review and issue responsiveness. An average of zero means no
/// responses were observed and scores 0.
pub fn response_time_score(avg_hours: f64) -> f64 {
    if avg_hours <= 0.0 {
        0.0
    } else if avg_hours <= 2.0 {
        10.0
    } else if avg_hours <= 24.0 {
        7.0 + (24.0 - avg_hours) / (24.0 - 2.0) * 3.0
    } else if avg_hours <= 72.0 {
        3.0 + (72.0 - avg_hours) / (72.0 - 24.0) * 4.0
    } else if avg_hours <= 168.0 {
        (168.0 - avg_hours) / (168.0 - 72.0) * 3.0
    } else {
        0.0
    }
}
