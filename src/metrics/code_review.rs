//! Code review volume, thoroughness, diversity, responsiveness and self-merges
//!
//! Review data is only fetched for a sample of PRs, so every per-PR ratio
//! here is taken over the sampled PRs. Self-merge detection covers every
//! merged PR and may call out to a [`MergeCommitLookup`] when the forge did
//! not record who merged. Those calls are capped; PRs past the cap count as
//! not self-merged and are reported as unchecked.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::{hours_between, mean, response_time_score};
use crate::fork::{AuthorCount, ContributionDistribution};
use crate::models::{round_to, PullRequestRecord, ReviewSample, ReviewState};
use crate::sources::MergeCommitLookup;

/// Comment count at which a review counts as substantive.
const SUBSTANTIVE_COMMENTS: usize = 3;
const TOP_REVIEWERS: usize = 5;
pub const DEFAULT_MAX_MERGE_LOOKUPS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeReviewMetrics {
    pub has_data: bool,
    pub sampled_prs: usize,
    pub total_reviews: usize,
    pub total_review_comments: usize,
    pub reviews_per_pr: f64,
    pub comments_per_pr: f64,
    pub multi_reviewer_ratio: f64,
    pub substantive_review_ratio: f64,
    pub thoroughness_score: f64,
    pub unique_reviewers: usize,
    pub top_reviewers: Vec<AuthorCount>,
    pub reviewer_to_author_ratio: f64,
    pub avg_time_to_first_review: f64,
    pub responsiveness_score: f64,
    pub self_merged_count: usize,
    pub self_merged_ratio: f64,
    /// Merge-commit lookups issued for PRs lacking `merged_by`.
    pub self_merge_lookups: usize,
    pub self_merge_lookup_failures: usize,
    /// Merged PRs left unchecked once the lookup cap was reached
    pub self_merge_unchecked: usize,
    pub score: f64,
}

pub fn calculate(
    repo: &str,
    pull_requests: &[PullRequestRecord],
    samples: &[ReviewSample],
    lookup: Option<&dyn MergeCommitLookup>,
    max_lookups: usize,
) -> CodeReviewMetrics {
    if pull_requests.is_empty() || samples.is_empty() {
        warn!("No pull requests or review data found for {}", repo);
        return CodeReviewMetrics::default();
    }

    let by_number: HashMap<u64, &PullRequestRecord> =
        pull_requests.iter().map(|p| (p.number, p)).collect();
    let sample_size = samples.len() as f64;

    // Volume
    let total_reviews: usize = samples.iter().map(|s| s.reviews.len()).sum();
    let total_comments: usize = samples.iter().map(|s| s.comments.len()).sum();

    // Thoroughness
    let mut multi = 0usize;
    let mut substantive = 0usize;
    for sample in samples {
        let reviewers: HashSet<&str> = sample.reviews.iter().filter_map(|r| r.reviewer.key()).collect();
        if reviewers.len() > 1 {
            multi += 1;
        }
        let changes_requested = sample
            .reviews
            .iter()
            .any(|r| r.state == ReviewState::ChangesRequested);
        if sample.comments.len() >= SUBSTANTIVE_COMMENTS || changes_requested {
            substantive += 1;
        }
    }
    let multi_ratio = multi as f64 / sample_size;
    let substantive_ratio = substantive as f64 / sample_size;
    let thoroughness = multi_ratio * 5.0 + substantive_ratio * 5.0;

    // Diversity
    let reviewers = ContributionDistribution::from_keys(
        samples
            .iter()
            .flat_map(|s| {
                s.reviews
                    .iter()
                    .map(|r| &r.reviewer)
                    .chain(s.comments.iter().map(|c| &c.author))
            })
            .filter_map(|id| id.key()),
    );
    let sampled_authors: HashSet<&str> = samples
        .iter()
        .filter_map(|s| by_number.get(&s.pr_number))
        .filter_map(|p| p.author.key())
        .collect();
    let reviewer_ratio = if sampled_authors.is_empty() {
        0.0
    } else {
        reviewers.len() as f64 / sampled_authors.len() as f64
    };

    // Responsiveness
    let first_review_hours: Vec<f64> = samples
        .iter()
        .filter_map(|s| {
            let pr = by_number.get(&s.pr_number)?;
            let first = s.reviews.iter().filter_map(|r| r.submitted_at).min()?;
            Some(hours_between(pr.created_at, first))
        })
        .collect();
    let avg_first_review = mean(&first_review_hours);

    let self_merge = self_merges(repo, pull_requests, lookup, max_lookups);

    let score = thoroughness * 0.7 + (1.0 - self_merge.ratio) * 10.0 * 0.3;

    CodeReviewMetrics {
        has_data: true,
        sampled_prs: samples.len(),
        total_reviews,
        total_review_comments: total_comments,
        reviews_per_pr: round_to(total_reviews as f64 / sample_size, 2),
        comments_per_pr: round_to(total_comments as f64 / sample_size, 2),
        multi_reviewer_ratio: round_to(multi_ratio, 3),
        substantive_review_ratio: round_to(substantive_ratio, 3),
        thoroughness_score: round_to(thoroughness, 1),
        unique_reviewers: reviewers.len(),
        top_reviewers: reviewers.top(TOP_REVIEWERS),
        reviewer_to_author_ratio: round_to(reviewer_ratio, 2),
        avg_time_to_first_review: round_to(avg_first_review, 2),
        responsiveness_score: round_to(response_time_score(avg_first_review), 1),
        self_merged_count: self_merge.count,
        self_merged_ratio: round_to(self_merge.ratio, 3),
        self_merge_lookups: self_merge.lookups,
        self_merge_lookup_failures: self_merge.failures,
        self_merge_unchecked: self_merge.unchecked,
        score: round_to(score, 1),
    }
}

struct SelfMergeStats {
    count: usize,
    ratio: f64,
    lookups: usize,
    failures: usize,
    unchecked: usize,
}

/// Count merged PRs whose merger is their author.
///
/// When `merged_by` is absent, the merge commit's author or committer is
/// compared instead, for at most `max_lookups` PRs. A failed or skipped
/// lookup counts the PR as not self-merged.
fn self_merges(
    repo: &str,
    pull_requests: &[PullRequestRecord],
    lookup: Option<&dyn MergeCommitLookup>,
    max_lookups: usize,
) -> SelfMergeStats {
    let mut stats = SelfMergeStats {
        count: 0,
        ratio: 0.0,
        lookups: 0,
        failures: 0,
        unchecked: 0,
    };
    let mut merged = 0usize;

    for pr in pull_requests.iter().filter(|p| p.is_merged()) {
        merged += 1;
        let is_self = match (&pr.merged_by, lookup, pr.merge_commit_sha.as_deref()) {
            (Some(merger), _, _) => merger.same_person(&pr.author),
            (None, Some(_), Some(_)) if stats.lookups >= max_lookups => {
                stats.unchecked += 1;
                false
            }
            (None, Some(lookup), Some(sha)) => {
                stats.lookups += 1;
                match lookup.merge_commit(repo, sha) {
                    Ok(Some(ids)) => {
                        ids.author.same_person(&pr.author) || ids.committer.same_person(&pr.author)
                    }
                    Ok(None) => false,
                    Err(e) => {
                        stats.failures += 1;
                        debug!("Merge commit lookup failed for PR #{}: {}", pr.number, e);
                        false
                    }
                }
            }
            _ => false,
        };
        if is_self {
            stats.count += 1;
        }
    }

    if stats.unchecked > 0 {
        warn!(
            "Merge commit lookup cap ({}) reached for {}: {} merged PRs unchecked",
            max_lookups, repo, stats.unchecked
        );
    }
    if stats.failures > 0 {
        warn!(
            "{} of {} merge commit lookups failed for {}",
            stats.failures, stats.lookups, repo
        );
    }
    if merged > 0 {
        stats.ratio = stats.count as f64 / merged as f64;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SourceError, SourceResult};
    use crate::models::{CommentRecord, Identity, ItemState, ReviewRecord};
    use crate::sources::MergeCommitIdentities;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLookup {
        calls: AtomicUsize,
        committer: &'static str,
        fail_on: Option<&'static str>,
    }

    impl MergeCommitLookup for FakeLookup {
        fn merge_commit(&self, _repo: &str, sha: &str) -> SourceResult<Option<MergeCommitIdentities>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(sha) {
                return Err(SourceError::Transport("connection reset".into()));
            }
            if sha == "missing" {
                return Ok(None);
            }
            Ok(Some(MergeCommitIdentities {
                author: Identity::login("someone-else"),
                committer: Identity::login(self.committer),
            }))
        }
    }

    fn merged_pr(number: u64, author: &str, merged_by: Option<&str>, sha: Option<&str>) -> PullRequestRecord {
        let created = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        PullRequestRecord {
            number,
            author: Identity::login(author),
            state: ItemState::Closed,
            created_at: created,
            closed_at: Some(created + Duration::hours(30)),
            merged_at: Some(created + Duration::hours(30)),
            merged_by: merged_by.map(Identity::login),
            merge_commit_sha: sha.map(String::from),
            ..Default::default()
        }
    }

    fn review(login: &str, state: ReviewState, after_hours: i64) -> ReviewRecord {
        ReviewRecord {
            reviewer: Identity::login(login),
            state,
            submitted_at: Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap() + Duration::hours(after_hours)),
        }
    }

    fn comments(n: usize, login: &str) -> Vec<CommentRecord> {
        (0..n)
            .map(|_| CommentRecord {
                author: Identity::login(login),
                created_at: None,
            })
            .collect()
    }

    #[test]
    fn test_no_samples_is_default() {
        let prs = vec![merged_pr(1, "a", Some("a"), None)];
        let metrics = calculate("x/y", &prs, &[], None, DEFAULT_MAX_MERGE_LOOKUPS);
        assert!(!metrics.has_data);
        assert_eq!(metrics.score, 0.0);
    }

    #[test]
    fn test_thoroughness_and_diversity() {
        let prs = vec![
            merged_pr(1, "alice", Some("bob"), None),
            merged_pr(2, "bob", Some("bob"), None),
        ];
        let samples = vec![
            ReviewSample {
                pr_number: 1,
                reviews: vec![
                    review("bob", ReviewState::Approved, 1),
                    review("carol", ReviewState::Approved, 3),
                ],
                comments: comments(1, "bob"),
            },
            ReviewSample {
                pr_number: 2,
                reviews: vec![review("alice", ReviewState::ChangesRequested, 3)],
                comments: vec![],
            },
        ];
        let metrics = calculate("x/y", &prs, &samples, None, DEFAULT_MAX_MERGE_LOOKUPS);

        assert!(metrics.has_data);
        assert_eq!(metrics.total_reviews, 3);
        assert_eq!(metrics.reviews_per_pr, 1.5);
        assert_eq!(metrics.multi_reviewer_ratio, 0.5);
        assert_eq!(metrics.substantive_review_ratio, 0.5);
        assert_eq!(metrics.thoroughness_score, 5.0);
        assert_eq!(metrics.unique_reviewers, 3);
        assert_eq!(metrics.top_reviewers[0].author, "bob");
        assert_eq!(metrics.reviewer_to_author_ratio, 1.5);
        // first reviews after 1h and 3h
        assert_eq!(metrics.avg_time_to_first_review, 2.0);
        assert_eq!(metrics.responsiveness_score, 10.0);
        assert_eq!(metrics.self_merged_count, 1);
        assert_eq!(metrics.self_merged_ratio, 0.5);
        assert_eq!(metrics.score, round_to(5.0 * 0.7 + 0.5 * 10.0 * 0.3, 1));
    }

    #[test]
    fn test_self_merge_falls_back_to_merge_commit() {
        let prs = vec![
            merged_pr(1, "luke-jr", None, Some("m1")),
            merged_pr(2, "luke-jr", None, Some("boom")),
            merged_pr(3, "luke-jr", None, Some("missing")),
            merged_pr(4, "luke-jr", None, None),
        ];
        let samples = vec![ReviewSample {
            pr_number: 1,
            ..Default::default()
        }];
        let lookup = FakeLookup {
            calls: AtomicUsize::new(0),
            committer: "luke-jr",
            fail_on: Some("boom"),
        };
        let metrics = calculate(
            "bitcoinknots/bitcoin",
            &prs,
            &samples,
            Some(&lookup),
            DEFAULT_MAX_MERGE_LOOKUPS,
        );

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.self_merge_lookups, 3);
        assert_eq!(metrics.self_merge_lookup_failures, 1);
        assert_eq!(metrics.self_merged_count, 1);
        assert_eq!(metrics.self_merged_ratio, 0.25);
    }

    #[test]
    fn test_without_lookup_unknown_merger_is_not_self_merge() {
        let prs = vec![merged_pr(1, "a", None, Some("m1"))];
        let samples = vec![ReviewSample {
            pr_number: 1,
            comments: comments(3, "b"),
            ..Default::default()
        }];
        let metrics = calculate("x/y", &prs, &samples, None, DEFAULT_MAX_MERGE_LOOKUPS);
        assert_eq!(metrics.self_merged_count, 0);
        assert_eq!(metrics.substantive_review_ratio, 1.0);
        assert_eq!(metrics.self_merge_lookups, 0);
    }

    #[test]
    fn test_merge_lookups_stop_at_cap() {
        let prs: Vec<PullRequestRecord> = (1..=5)
            .map(|n| merged_pr(n, "luke-jr", None, Some("m1")))
            .chain(std::iter::once(merged_pr(6, "luke-jr", Some("luke-jr"), None)))
            .collect();
        let samples = vec![ReviewSample {
            pr_number: 1,
            ..Default::default()
        }];
        let lookup = FakeLookup {
            calls: AtomicUsize::new(0),
            committer: "luke-jr",
            fail_on: None,
        };
        let metrics = calculate("bitcoinknots/bitcoin", &prs, &samples, Some(&lookup), 2);

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.self_merge_lookups, 2);
        assert_eq!(metrics.self_merge_unchecked, 3);
        // two looked up plus the one with merged_by
        assert_eq!(metrics.self_merged_count, 3);
        assert_eq!(metrics.self_merged_ratio, 0.5);
    }
}
