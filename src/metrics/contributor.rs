//! Contributor diversity and concentration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use super::inequality::{bus_factor, count_email_domains, organization_diversity};
use crate::fork::{contributor_gini, AuthorCount, ContributionDistribution, ForkAttribution};
use crate::models::{round_to, CommitRecord, ContributorRecord, LocalGitData};

const TOP_CONTRIBUTORS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributorMetrics {
    pub has_data: bool,
    pub total_contributors: usize,
    pub contributors_by_commits: ContributionDistribution,
    pub top_contributors: Vec<AuthorCount>,
    pub contributor_gini: f64,
    pub bus_factor: usize,
    /// Distinct authors among the window's commits.
    pub active_contributors: usize,
    pub active_ratio: f64,
    pub email_domains: ContributionDistribution,
    pub organization_count: usize,
    pub organization_diversity: f64,
    /// Present only when the repository was analyzed as a fork.
    pub fork: Option<ForkContributorSummary>,
}

/// Attribution figures restricted to the fork's own work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForkContributorSummary {
    pub original_bus_factor: usize,
    pub original_gini: f64,
    pub original_contributors: usize,
    pub merge_only_contributors: usize,
    pub upstream_merge_authors: usize,
    pub top_original_contributors: Vec<AuthorCount>,
    pub original_organization_diversity: f64,
}

impl From<&ForkAttribution> for ForkContributorSummary {
    fn from(a: &ForkAttribution) -> Self {
        Self {
            original_bus_factor: a.original_bus_factor,
            original_gini: round_to(a.original_gini, 3),
            original_contributors: a.original_contributors,
            merge_only_contributors: a.merge_only_contributors,
            upstream_merge_authors: a.upstream_merge_authors,
            top_original_contributors: a.top_original_contributors.clone(),
            original_organization_diversity: round_to(a.original_organization_diversity, 3),
        }
    }
}

pub fn calculate(
    contributors: &[ContributorRecord],
    commits: &[CommitRecord],
    local: Option<&LocalGitData>,
    attribution: Option<&ForkAttribution>,
) -> ContributorMetrics {
    let fork = attribution.map(ForkContributorSummary::from);

    if contributors.is_empty() {
        warn!("No contributors found in forge data");
        return ContributorMetrics {
            fork,
            ..Default::default()
        };
    }

    let distribution = ContributionDistribution::from_counts(
        contributors
            .iter()
            .map(|c| (c.login.clone(), c.contributions)),
    );

    let active: HashSet<&str> = commits.iter().filter_map(|c| c.author.key()).collect();
    let total = distribution.len();

    let mut metrics = ContributorMetrics {
        has_data: true,
        total_contributors: total,
        top_contributors: distribution.top(TOP_CONTRIBUTORS),
        contributor_gini: round_to(contributor_gini(&distribution), 3),
        bus_factor: bus_factor(&distribution),
        active_contributors: active.len(),
        active_ratio: round_to(active.len() as f64 / total as f64, 3),
        contributors_by_commits: distribution,
        fork,
        ..Default::default()
    };

    if let Some(local) = local.filter(|l| !l.contributors.is_empty()) {
        let domains = count_email_domains(local.contributors.iter().map(|c| c.email.as_str()));
        metrics.organization_count = domains.len();
        metrics.organization_diversity = round_to(organization_diversity(&domains.count_values()), 3);
        metrics.email_domains = domains;
    }

    metrics
}
