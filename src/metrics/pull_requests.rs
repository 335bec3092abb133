//! Pull request state, lifecycle, size and authorship

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use super::{hours_between, mean};
use crate::fork::{AuthorCount, ContributionDistribution};
use crate::models::{round_to, ItemState, PullRequestRecord, ReviewSample, INTERNAL_ASSOCIATIONS};

/// PRs touching more lines than this count as large.
pub const LARGE_PR_LINES: u64 = 1000;
const TOP_PR_AUTHORS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestMetrics {
    pub has_data: bool,
    pub total_prs: usize,
    pub open_prs: usize,
    pub closed_prs: usize,
    pub merged_prs: usize,
    pub open_ratio: f64,
    pub merged_ratio: f64,
    pub closed_unmerged_ratio: f64,
    /// Hours from creation to merge, over merged PRs.
    pub avg_time_to_merge: f64,
    /// Hours from creation to close, over PRs closed without merging.
    pub avg_time_to_close: f64,
    pub velocity_score: f64,
    pub avg_pr_size: f64,
    pub large_pr_ratio: f64,
    pub unique_pr_authors: usize,
    pub top_pr_authors: Vec<AuthorCount>,
    pub external_pr_ratio: f64,
    pub avg_review_count: f64,
    pub reviewed_pr_ratio: f64,
    pub score: f64,
}

pub fn calculate(pull_requests: &[PullRequestRecord], samples: &[ReviewSample]) -> PullRequestMetrics {
    if pull_requests.is_empty() {
        warn!("No pull requests found in forge data");
        return PullRequestMetrics::default();
    }

    let total = pull_requests.len() as f64;
    let open = pull_requests.iter().filter(|p| p.state == ItemState::Open).count();
    let closed = pull_requests.iter().filter(|p| p.state == ItemState::Closed).count();
    let merged = pull_requests.iter().filter(|p| p.is_merged()).count();

    let merge_hours: Vec<f64> = pull_requests
        .iter()
        .filter_map(|p| p.merged_at.map(|m| hours_between(p.created_at, m)))
        .collect();
    let close_hours: Vec<f64> = pull_requests
        .iter()
        .filter(|p| p.state == ItemState::Closed && !p.is_merged())
        .filter_map(|p| p.closed_at.map(|c| hours_between(p.created_at, c)))
        .collect();
    let avg_merge = mean(&merge_hours);
    let velocity = velocity_score(avg_merge);

    let sizes: Vec<u64> = pull_requests
        .iter()
        .map(|p| p.stats.map(|s| s.total()).unwrap_or(0))
        .collect();
    let large = sizes.iter().filter(|&&s| s > LARGE_PR_LINES).count();

    let authors = ContributionDistribution::from_keys(pull_requests.iter().filter_map(|p| p.author.key()));
    let external = pull_requests
        .iter()
        .filter(|p| !is_internal(p.author_association.as_deref()))
        .count();

    let (avg_reviews, reviewed) = review_coverage(pull_requests, samples);

    let merged_ratio = merged as f64 / total;
    let score = merged_ratio * 10.0 * 0.5 + velocity * 0.5;

    PullRequestMetrics {
        has_data: true,
        total_prs: pull_requests.len(),
        open_prs: open,
        closed_prs: closed,
        merged_prs: merged,
        open_ratio: round_to(open as f64 / total, 3),
        merged_ratio: round_to(merged_ratio, 3),
        closed_unmerged_ratio: round_to(closed.saturating_sub(merged) as f64 / total, 3),
        avg_time_to_merge: round_to(avg_merge, 2),
        avg_time_to_close: round_to(mean(&close_hours), 2),
        velocity_score: round_to(velocity, 1),
        avg_pr_size: round_to(sizes.iter().sum::<u64>() as f64 / total, 2),
        large_pr_ratio: round_to(large as f64 / total, 3),
        unique_pr_authors: authors.len(),
        top_pr_authors: authors.top(TOP_PR_AUTHORS),
        external_pr_ratio: round_to(external as f64 / total, 3),
        avg_review_count: round_to(avg_reviews, 2),
        reviewed_pr_ratio: round_to(reviewed as f64 / total, 3),
        score: round_to(score, 1),
    }
}

/// Map average hours-to-merge onto 0-10. No merged PRs scores 0.
pub fn velocity_score(avg_hours: f64) -> f64 {
    if avg_hours <= 0.0 {
        0.0
    } else if avg_hours <= 24.0 {
        10.0
    } else if avg_hours <= 168.0 {
        5.0 + (168.0 - avg_hours) / (168.0 - 24.0) * 5.0
    } else if avg_hours <= 720.0 {
        1.0 + (720.0 - avg_hours) / (720.0 - 168.0) * 4.0
    } else {
        (1.0 - (avg_hours - 720.0) / 720.0).max(0.0)
    }
}

pub(crate) fn is_internal(association: Option<&str>) -> bool {
    association.is_some_and(|a| INTERNAL_ASSOCIATIONS.contains(&a))
}

/// Average reviews per sampled PR and number of PRs with any review activity.
///
/// A sampled PR with comments but no formal reviews counts as one review.
fn review_coverage(pull_requests: &[PullRequestRecord], samples: &[ReviewSample]) -> (f64, usize) {
    let by_number: HashMap<u64, &ReviewSample> = samples.iter().map(|s| (s.pr_number, s)).collect();
    let mut counts = Vec::new();
    let mut reviewed = 0usize;
    for pr in pull_requests {
        let Some(sample) = by_number.get(&pr.number) else {
            continue;
        };
        let count = if !sample.reviews.is_empty() {
            sample.reviews.len()
        } else if !sample.comments.is_empty() {
            1
        } else {
            0
        };
        if count > 0 {
            reviewed += 1;
        }
        counts.push(count as f64);
    }
    (mean(&counts), reviewed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeStats, CommentRecord, Identity, ReviewRecord};
    use chrono::{Duration, TimeZone, Utc};

    fn pr(number: u64, author: &str, merge_after_hours: Option<i64>, lines: u64) -> PullRequestRecord {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let merged_at = merge_after_hours.map(|h| created + Duration::hours(h));
        PullRequestRecord {
            number,
            author: Identity::login(author),
            state: if merged_at.is_some() { ItemState::Closed } else { ItemState::Open },
            created_at: created,
            closed_at: merged_at,
            merged_at,
            stats: Some(ChangeStats { additions: lines, deletions: 0 }),
            author_association: Some("CONTRIBUTOR".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_velocity_table() {
        assert_eq!(velocity_score(0.0), 0.0);
        assert_eq!(velocity_score(12.0), 10.0);
        assert_eq!(velocity_score(24.0), 10.0);
        assert!((velocity_score(168.0) - 5.0).abs() < 1e-9);
        assert!((velocity_score(720.0) - 1.0).abs() < 1e-9);
        assert!((velocity_score(1080.0) - 0.5).abs() < 1e-9);
        assert_eq!(velocity_score(5000.0), 0.0);
    }

    #[test]
    fn test_empty() {
        let metrics = calculate(&[], &[]);
        assert!(!metrics.has_data);
        assert_eq!(metrics.score, 0.0);
    }

    #[test]
    fn test_state_and_score() {
        let mut closed_unmerged = pr(3, "carol", None, 10);
        closed_unmerged.state = ItemState::Closed;
        closed_unmerged.closed_at = Some(closed_unmerged.created_at + Duration::hours(10));
        let prs = vec![
            pr(1, "alice", Some(12), 2000),
            pr(2, "bob", Some(36), 100),
            closed_unmerged,
            pr(4, "alice", None, 0),
        ];
        let metrics = calculate(&prs, &[]);

        assert_eq!(metrics.merged_prs, 2);
        assert_eq!(metrics.open_prs, 1);
        assert_eq!(metrics.closed_prs, 3);
        assert_eq!(metrics.merged_ratio, 0.5);
        assert_eq!(metrics.closed_unmerged_ratio, 0.25);
        assert_eq!(metrics.avg_time_to_merge, 24.0);
        assert_eq!(metrics.avg_time_to_close, 10.0);
        assert_eq!(metrics.velocity_score, 10.0);
        assert_eq!(metrics.large_pr_ratio, 0.25);
        assert_eq!(metrics.external_pr_ratio, 1.0);
        assert_eq!(metrics.unique_pr_authors, 3);
        assert_eq!(metrics.score, 0.5 * 10.0 * 0.5 + 10.0 * 0.5);
    }

    #[test]
    fn test_review_coverage_counts_comment_only_prs() {
        let prs = vec![pr(1, "a", Some(1), 1), pr(2, "b", Some(1), 1), pr(3, "c", None, 1)];
        let samples = vec![
            ReviewSample {
                pr_number: 1,
                reviews: vec![ReviewRecord::default(), ReviewRecord::default()],
                comments: vec![],
            },
            ReviewSample {
                pr_number: 2,
                reviews: vec![],
                comments: vec![CommentRecord::default()],
            },
        ];
        let metrics = calculate(&prs, &samples);
        assert_eq!(metrics.avg_review_count, 1.5);
        assert_eq!(metrics.reviewed_pr_ratio, 0.667);
    }
}
