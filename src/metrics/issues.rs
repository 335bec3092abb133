//! Issue tracker responsiveness, triage and closure

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::pull_requests::is_internal;
use super::{hours_between, mean, response_time_score};
use crate::fork::{AuthorCount, ContributionDistribution};
use crate::models::{round_to, IssueRecord, ItemState};

/// Open issues untouched for longer than this are stale.
pub const DEFAULT_STALE_DAYS: i64 = 30;
const RECENT_CLOSE_DAYS: i64 = 30;
const TOP_LABELS: usize = 5;
const TOP_ISSUE_AUTHORS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueMetrics {
    pub has_data: bool,
    pub total_issues: usize,
    pub open_issues: usize,
    pub closed_issues: usize,
    pub open_ratio: f64,
    pub avg_time_to_first_response: f64,
    pub avg_time_to_close: f64,
    pub stale_issues: usize,
    pub stale_issue_ratio: f64,
    pub responsiveness_score: f64,
    pub label_count: usize,
    pub labeled_issue_ratio: f64,
    pub top_labels: Vec<AuthorCount>,
    pub categorization_score: f64,
    pub unique_issue_authors: usize,
    pub top_issue_authors: Vec<AuthorCount>,
    pub external_issue_ratio: f64,
    pub closure_rate: f64,
    pub recently_closed: usize,
    pub recently_closed_ratio: f64,
    pub velocity_score: f64,
    pub score: f64,
}

/// Compute issue metrics as of `now`.
pub fn calculate(issues: &[IssueRecord], now: DateTime<Utc>, stale_days: i64) -> IssueMetrics {
    if issues.is_empty() {
        warn!("No issues found in forge data");
        return IssueMetrics::default();
    }

    let total = issues.len() as f64;
    let open = issues.iter().filter(|i| i.state == ItemState::Open).count();
    let closed = issues.iter().filter(|i| i.state == ItemState::Closed).count();

    // Responsiveness
    let first_response: Vec<f64> = issues
        .iter()
        .filter_map(|i| match i.first_response_at {
            Some(at) => Some(hours_between(i.created_at, at)),
            // approximation when comment times were not fetched
            None if i.comments > 0 => Some(hours_between(i.created_at, i.updated_at)),
            None => None,
        })
        .collect();
    let close_times: Vec<f64> = issues
        .iter()
        .filter(|i| i.state == ItemState::Closed)
        .filter_map(|i| i.closed_at.map(|c| hours_between(i.created_at, c)))
        .collect();
    let stale_cutoff = Duration::days(stale_days);
    let stale = issues
        .iter()
        .filter(|i| i.state == ItemState::Open && now - i.updated_at > stale_cutoff)
        .count();
    let stale_ratio = if open > 0 { stale as f64 / open as f64 } else { 0.0 };
    let avg_first_response = mean(&first_response);
    let responsiveness = response_time_score(avg_first_response) * 0.7 + 10.0 * (1.0 - stale_ratio) * 0.3;

    // Labels
    let labeled = issues.iter().filter(|i| !i.labels.is_empty()).count();
    let labels = ContributionDistribution::from_keys(issues.iter().flat_map(|i| i.labels.iter()));
    let label_ratio = labeled as f64 / total;
    let categorization = categorization_score(labels.len(), label_ratio);

    // Authors
    let authors = ContributionDistribution::from_keys(issues.iter().filter_map(|i| i.author.key()));
    let external = issues
        .iter()
        .filter(|i| !is_internal(i.author_association.as_deref()))
        .count();

    // Closure
    let recent_cutoff = now - Duration::days(RECENT_CLOSE_DAYS);
    let recently_closed = issues
        .iter()
        .filter(|i| i.state == ItemState::Closed)
        .filter(|i| i.closed_at.is_some_and(|c| c >= recent_cutoff))
        .count();

    let score = responsiveness * 0.7 + categorization * 0.3;

    IssueMetrics {
        has_data: true,
        total_issues: issues.len(),
        open_issues: open,
        closed_issues: closed,
        open_ratio: round_to(open as f64 / total, 3),
        avg_time_to_first_response: round_to(avg_first_response, 2),
        avg_time_to_close: round_to(mean(&close_times), 2),
        stale_issues: stale,
        stale_issue_ratio: round_to(stale_ratio, 3),
        responsiveness_score: round_to(responsiveness, 1),
        label_count: labels.len(),
        labeled_issue_ratio: round_to(label_ratio, 3),
        top_labels: labels.top(TOP_LABELS),
        categorization_score: categorization,
        unique_issue_authors: authors.len(),
        top_issue_authors: authors.top(TOP_ISSUE_AUTHORS),
        external_issue_ratio: round_to(external as f64 / total, 3),
        closure_rate: round_to(closed as f64 / total, 3),
        recently_closed,
        recently_closed_ratio: round_to(recently_closed as f64 / total, 3),
        velocity_score: round_to((recently_closed as f64 / 10.0).min(10.0), 1),
        score: round_to(score, 1),
    }
}

/// Triage quality from the number of distinct labels and the labeled share.
pub fn categorization_score(unique_labels: usize, label_ratio: f64) -> f64 {
    if unique_labels >= 10 && label_ratio >= 0.9 {
        10.0
    } else if unique_labels >= 5 && label_ratio >= 0.7 {
        7.0
    } else if unique_labels >= 3 && label_ratio >= 0.5 {
        5.0
    } else if unique_labels > 0 {
        3.0
    } else {
        0.0
    }
}
