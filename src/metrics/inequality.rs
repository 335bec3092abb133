//! Inequality and resilience measures over contribution counts

use crate::fork::ContributionDistribution;
use crate::models::email_domain;

/// Gini coefficient of non-negative contribution counts.
///
/// Sorts ascending internally, so input order does not matter. Returns 0.0
/// for an empty slice or when every count is zero. A single contributor also
/// yields 0.0 here; callers that want to report maximal concentration for a
/// lone contributor do so themselves.
pub fn gini_coefficient(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let n = sorted.len() as f64;
    let total: f64 = sorted.iter().map(|&v| v as f64).sum();
    if total == 0.0 {
        return 0.0;
    }
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, &v)| (i + 1) as f64 * v as f64)
        .sum();

    let gini = 2.0 * weighted / (n * total) - 1.0 - 1.0 / n;
    gini.max(0.0)
}

/// Smallest number of top contributors covering at least 80% of all work.
pub fn bus_factor(distribution: &ContributionDistribution) -> usize {
    bus_factor_sorted(distribution.counts())
}

/// Bus factor over unsorted counts.
pub fn bus_factor_from_counts(counts: &[u64]) -> usize {
    let mut sorted = counts.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    bus_factor_sorted(sorted)
}

fn bus_factor_sorted(descending: impl IntoIterator<Item = u64>) -> usize {
    let counts: Vec<u64> = descending.into_iter().collect();
    let total: u128 = counts.iter().map(|&c| c as u128).sum();
    if total == 0 {
        return 0;
    }
    // running / total >= 0.8, kept in integers
    let mut running: u128 = 0;
    for (i, &count) in counts.iter().enumerate() {
        running += count as u128;
        if running * 5 >= total * 4 {
            return i + 1;
        }
    }
    counts.len()
}

/// Normalized Shannon entropy of group sizes, in [0, 1].
///
/// Empty groups are ignored. Zero or one group has no diversity.
pub fn organization_diversity(group_sizes: &[u64]) -> f64 {
    let sizes: Vec<f64> = group_sizes
        .iter()
        .filter(|&&s| s > 0)
        .map(|&s| s as f64)
        .collect();
    if sizes.len() <= 1 {
        return 0.0;
    }
    let total: f64 = sizes.iter().sum();
    let entropy: f64 = sizes
        .iter()
        .map(|&s| {
            let p = s / total;
            -p * p.ln()
        })
        .sum();
    entropy / (sizes.len() as f64).ln()
}

/// Count email domains, most common first.
pub fn count_email_domains<'a>(emails: impl IntoIterator<Item = &'a str>) -> ContributionDistribution {
    ContributionDistribution::from_keys(emails.into_iter().filter_map(email_domain))
}
