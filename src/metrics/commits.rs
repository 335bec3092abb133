//! Commit frequency, size, message quality and authorship

use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use crate::fork::{AuthorCount, ContributionDistribution, ForkAttribution};
use crate::models::{round_to, CommitRecord, LocalGitData};

/// Commits touching more lines than this count as large.
pub const LARGE_COMMIT_LINES: u64 = 300;
const TOP_AUTHORS: usize = 5;

/// Activity bucket derived from the commit rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitFrequency {
    VeryActive,
    Active,
    Moderate,
    Low,
    #[default]
    Inactive,
}

impl CommitFrequency {
    pub fn classify(per_day: f64) -> Self {
        let per_week = per_day * 7.0;
        let per_month = per_day * 30.0;
        if per_day > 3.0 {
            Self::VeryActive
        } else if per_day > 1.0 {
            Self::Active
        } else if per_week > 1.0 {
            Self::Moderate
        } else if per_month > 1.0 {
            Self::Low
        } else {
            Self::Inactive
        }
    }

    /// Base 0-10 score for the bucket.
    pub fn base_score(self) -> f64 {
        match self {
            Self::VeryActive => 10.0,
            Self::Active => 8.0,
            Self::Moderate => 6.0,
            Self::Low => 4.0,
            Self::Inactive => 2.0,
        }
    }
}

impl std::fmt::Display for CommitFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::VeryActive => "very active",
            Self::Active => "active",
            Self::Moderate => "moderate",
            Self::Low => "low",
            Self::Inactive => "inactive",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageQuality {
    pub avg_first_line_length: f64,
    pub descriptive_ratio: f64,
    pub quality_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitMetrics {
    pub has_data: bool,
    pub total_commits: usize,
    pub commits_per_day: f64,
    pub commits_per_week: f64,
    pub commits_per_month: f64,
    pub active_days: usize,
    pub activity_ratio: f64,
    pub frequency: CommitFrequency,
    pub avg_commit_size: f64,
    pub large_commit_ratio: f64,
    pub message_quality: MessageQuality,
    pub unique_authors: usize,
    pub top_authors: Vec<AuthorCount>,
    pub merge_commit_count: usize,
    pub merge_commit_ratio: f64,
    pub direct_commit_count: Option<usize>,
    pub direct_commit_ratio: Option<f64>,
    pub commits_by_weekday: BTreeMap<String, usize>,
    pub commits_by_hour: BTreeMap<u32, usize>,
    pub original_commit_count: Option<usize>,
    pub upstream_merged_commit_count: Option<usize>,
    pub score: f64,
}

pub fn calculate(
    commits: &[CommitRecord],
    local: Option<&LocalGitData>,
    attribution: Option<&ForkAttribution>,
) -> CommitMetrics {
    if commits.is_empty() {
        warn!("No commits found in forge data");
        return CommitMetrics::default();
    }

    let total = commits.len();
    let (per_day, active_days, span_days) = frequency(commits);
    let freq = CommitFrequency::classify(per_day);
    let (avg_size, large_ratio) = size_metrics(commits, local);
    let quality = message_quality(commits);
    let authors = ContributionDistribution::from_keys(commits.iter().filter_map(|c| c.author.key()));
    let merges = commits.iter().filter(|c| c.is_merge_message()).count();

    let direct = local.map(|l| l.direct_commits);
    let (weekday, hour) = activity_patterns(commits);

    let score = freq.base_score() * 0.7 + quality.quality_score * 0.3;

    CommitMetrics {
        has_data: true,
        total_commits: total,
        commits_per_day: round_to(per_day, 2),
        commits_per_week: round_to(per_day * 7.0, 2),
        commits_per_month: round_to(per_day * 30.0, 2),
        active_days,
        activity_ratio: round_to(active_days as f64 / span_days as f64, 3),
        frequency: freq,
        avg_commit_size: round_to(avg_size, 2),
        large_commit_ratio: round_to(large_ratio, 3),
        message_quality: quality,
        unique_authors: authors.len(),
        top_authors: authors.top(TOP_AUTHORS),
        merge_commit_count: merges,
        merge_commit_ratio: round_to(merges as f64 / total as f64, 3),
        direct_commit_count: direct,
        direct_commit_ratio: direct.map(|d| round_to(d as f64 / total as f64, 3)),
        commits_by_weekday: weekday,
        commits_by_hour: hour,
        original_commit_count: attribution.map(|a| a.original_commit_count),
        upstream_merged_commit_count: attribution.map(|a| a.upstream_merged_commit_count),
        score: round_to(score, 1),
    }
}

/// Commits per day, distinct active days, and inclusive span in days.
fn frequency(commits: &[CommitRecord]) -> (f64, usize, i64) {
    let first = commits.iter().map(|c| c.timestamp).min();
    let last = commits.iter().map(|c| c.timestamp).max();
    let span = match (first, last) {
        (Some(f), Some(l)) => ((l - f).num_days() + 1).max(1),
        _ => 1,
    };
    let days: HashSet<_> = commits.iter().map(|c| c.timestamp.date_naive()).collect();
    (commits.len() as f64 / span as f64, days.len(), span)
}

/// Average lines changed and the share of large commits. The forge commit
/// list carries no line counts, so the local clone's are used when present.
fn size_metrics(commits: &[CommitRecord], local: Option<&LocalGitData>) -> (f64, f64) {
    let mut sizes: Vec<u64> = commits.iter().filter_map(|c| c.stats).map(|s| s.total()).collect();
    if sizes.is_empty() {
        if let Some(local) = local {
            sizes = local.commit_sizes.clone();
        }
    }
    if sizes.is_empty() {
        return (0.0, 0.0);
    }
    let avg = sizes.iter().sum::<u64>() as f64 / sizes.len() as f64;
    let large = sizes.iter().filter(|&&s| s > LARGE_COMMIT_LINES).count();
    (avg, large as f64 / sizes.len() as f64)
}

/// Score first-line length and descriptiveness on a 0-10 scale.
pub fn message_quality(commits: &[CommitRecord]) -> MessageQuality {
    if commits.is_empty() {
        return MessageQuality::default();
    }
    let mut total_len = 0usize;
    let mut descriptive = 0usize;
    for commit in commits {
        let first = commit.first_line();
        total_len += first.chars().count();
        if first.split_whitespace().count() > 5 {
            descriptive += 1;
        }
    }
    let avg_len = total_len as f64 / commits.len() as f64;
    let descriptive_ratio = descriptive as f64 / commits.len() as f64;
    let length_score = (avg_len / 5.0).min(10.0);
    let quality = (length_score + descriptive_ratio * 10.0) / 2.0;

    MessageQuality {
        avg_first_line_length: round_to(avg_len, 2),
        descriptive_ratio: round_to(descriptive_ratio, 3),
        quality_score: round_to(quality, 1),
    }
}

fn activity_patterns(commits: &[CommitRecord]) -> (BTreeMap<String, usize>, BTreeMap<u32, usize>) {
    let mut by_weekday: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_hour: BTreeMap<u32, usize> = (0..24).map(|h| (h, 0)).collect();
    for day in [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ] {
        by_weekday.insert(weekday_key(day), 0);
    }
    for commit in commits {
        *by_weekday.entry(weekday_key(commit.timestamp.weekday())).or_default() += 1;
        *by_hour.entry(commit.timestamp.hour()).or_default() += 1;
    }
    (by_weekday, by_hour)
}

/// Sortable weekday key, e.g. `1-Monday`.
fn weekday_key(day: Weekday) -> String {
    let name = match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    };
    format!("{}-{}", day.number_from_monday(), name)
}
