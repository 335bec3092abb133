//! Per-author contribution distributions split by classification label

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::classifier::ClassificationLabel;
use crate::metrics::inequality::{bus_factor, count_email_domains, gini_coefficient, organization_diversity};
use crate::models::CommitRecord;

/// Number of top original contributors kept in an attribution summary.
const TOP_ORIGINAL_CONTRIBUTORS: usize = 10;

/// One author (or any other grouping key) and its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorCount {
    pub author: String,
    pub count: u64,
}

/// Counts per author, most active first.
///
/// Ties keep first-seen order. Construction merges duplicate keys, so the
/// sum of all counts always equals the number of folded contributions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<AuthorCount>", into = "Vec<AuthorCount>")]
pub struct ContributionDistribution {
    entries: Vec<AuthorCount>,
}

impl ContributionDistribution {
    /// Fold one contribution per key.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_counts(keys.into_iter().map(|k| (k.as_ref().to_string(), 1)))
    }

    /// Fold pre-counted pairs. Repeated keys are summed at their first position.
    pub fn from_counts<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<AuthorCount> = Vec::new();
        for (author, count) in pairs {
            match index.get(&author) {
                Some(&i) => entries[i].count += count,
                None => {
                    index.insert(author.clone(), entries.len());
                    entries.push(AuthorCount { author, count });
                }
            }
        }
        // stable: equal counts stay in first-seen order
        entries.sort_by(|a, b| b.count.cmp(&a.count));
        Self { entries }
    }

    pub fn entries(&self) -> &[AuthorCount] {
        &self.entries
    }

    pub fn counts(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().map(|e| e.count)
    }

    pub fn count_values(&self) -> Vec<u64> {
        self.counts().collect()
    }

    pub fn total(&self) -> u64 {
        self.counts().sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top(&self, n: usize) -> Vec<AuthorCount> {
        self.entries.iter().take(n).cloned().collect()
    }

    pub fn contains(&self, author: &str) -> bool {
        self.entries.iter().any(|e| e.author == author)
    }

    pub fn authors(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.author.as_str())
    }
}

impl From<Vec<AuthorCount>> for ContributionDistribution {
    fn from(entries: Vec<AuthorCount>) -> Self {
        Self::from_counts(entries.into_iter().map(|e| (e.author, e.count)))
    }
}

impl From<ContributionDistribution> for Vec<AuthorCount> {
    fn from(dist: ContributionDistribution) -> Self {
        dist.entries
    }
}

/// Gini over a distribution, reporting 1.0 for a lone contributor.
pub fn contributor_gini(distribution: &ContributionDistribution) -> f64 {
    match distribution.len() {
        0 => 0.0,
        1 => 1.0,
        _ => gini_coefficient(&distribution.count_values()),
    }
}

/// Outcome of splitting a repository's commits by origin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForkAttribution {
    pub original: ContributionDistribution,
    pub upstream_merged: ContributionDistribution,
    pub original_commit_count: usize,
    pub upstream_merged_commit_count: usize,
    /// Authors with at least one ORIGINAL commit.
    pub original_contributors: usize,
    /// Authors that appear only in the UPSTREAM_MERGED bucket.
    pub merge_only_contributors: usize,
    pub upstream_merge_authors: usize,
    /// Commits dropped for lack of any usable identity.
    pub dropped: usize,
    pub original_bus_factor: usize,
    pub original_gini: f64,
    pub top_original_contributors: Vec<AuthorCount>,
    pub original_email_domains: ContributionDistribution,
    pub original_organization_diversity: f64,
}

impl ForkAttribution {
    pub fn original_ratio(&self) -> f64 {
        let total = self.original_commit_count + self.upstream_merged_commit_count;
        if total == 0 {
            0.0
        } else {
            self.original_commit_count as f64 / total as f64
        }
    }
}

/// Build per-bucket distributions from classified commits.
pub fn aggregate<'c, I>(classified: I) -> ForkAttribution
where
    I: IntoIterator<Item = (&'c CommitRecord, ClassificationLabel)>,
{
    let mut original_keys: Vec<&str> = Vec::new();
    let mut upstream_keys: Vec<&str> = Vec::new();
    // one email per original author, first seen
    let mut original_emails: Vec<&str> = Vec::new();
    let mut seen_original: HashSet<&str> = HashSet::new();
    let mut dropped = 0usize;

    for (commit, label) in classified {
        let Some(key) = commit.author.key() else {
            dropped += 1;
            continue;
        };
        match label {
            ClassificationLabel::Original => {
                original_keys.push(key);
                if seen_original.insert(key) {
                    if let Some(email) = commit.author.email.as_deref() {
                        original_emails.push(email);
                    }
                }
            }
            ClassificationLabel::UpstreamMerged => upstream_keys.push(key),
        }
    }

    let original = ContributionDistribution::from_keys(&original_keys);
    let upstream_merged = ContributionDistribution::from_keys(&upstream_keys);

    let merge_only_contributors = upstream_merged
        .authors()
        .filter(|a| !seen_original.contains(a))
        .count();

    let original_email_domains = count_email_domains(original_emails);
    let original_organization_diversity =
        organization_diversity(&original_email_domains.count_values());

    if dropped > 0 {
        debug!("Dropped {} commits with no resolvable author identity", dropped);
    }

    ForkAttribution {
        original_commit_count: original_keys.len(),
        upstream_merged_commit_count: upstream_keys.len(),
        original_contributors: original.len(),
        merge_only_contributors,
        upstream_merge_authors: upstream_merged.len(),
        dropped,
        original_bus_factor: bus_factor(&original),
        original_gini: contributor_gini(&original),
        top_original_contributors: original.top(TOP_ORIGINAL_CONTRIBUTORS),
        original_email_domains,
        original_organization_diversity,
        original,
        upstream_merged,
    }
}
