//! Weighted health scorer over the seven category records

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Category, ScoringMode};
use crate::config::{CategoryWeights, ScoringConfig};
use crate::metrics::{CategoryMetrics, ContributorMetrics};
use crate::models::{grade_from_score, round_to};

/// One category's contribution to the overall score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    /// Sub-score on 0-10
    pub score: f64,
    pub weight: f64,
    /// False when the category received no data and scored 0 by default
    pub has_data: bool,
}

/// Complete score breakdown for transparency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthBreakdown {
    pub mode: ScoringMode,
    /// Overall health score (0-10, one decimal)
    pub overall_score: f64,
    /// Letter grade
    pub grade: String,
    pub categories: Vec<CategoryScore>,
}

impl Default for HealthBreakdown {
    fn default() -> Self {
        Self {
            mode: ScoringMode::Standard,
            overall_score: 0.0,
            grade: grade_from_score(0.0).to_string(),
            categories: Vec::new(),
        }
    }
}

impl HealthBreakdown {
    pub fn category(&self, category: Category) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Sub-score of a category, 0 if absent.
    pub fn score_of(&self, category: Category) -> f64 {
        self.category(category).map(|c| c.score).unwrap_or(0.0)
    }
}

/// Health scorer for a single repository
pub struct HealthScorer<'a> {
    config: &'a ScoringConfig,
}

impl<'a> HealthScorer<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    fn weights(&self, mode: ScoringMode) -> &CategoryWeights {
        match mode {
            ScoringMode::Standard => &self.config.standard_weights,
            ScoringMode::ForkAware => &self.config.fork_weights,
        }
    }

    /// Calculate the overall score with its per-category breakdown.
    ///
    /// Categories without data still carry their weight and contribute 0.
    pub fn calculate(&self, metrics: &CategoryMetrics, mode: ScoringMode) -> HealthBreakdown {
        let weights = self.weights(mode);

        let raw: Vec<(Category, f64, bool)> = Category::ALL
            .iter()
            .map(|&category| {
                let (score, has_data) = category_score(metrics, category, mode);
                (category, score, has_data)
            })
            .collect();

        // rounding happens once, on the weighted average
        let total_weight: f64 = raw.iter().map(|&(c, _, _)| weights.weight(c)).sum();
        let weighted: f64 = raw.iter().map(|&(c, score, _)| score * weights.weight(c)).sum();
        let overall = if total_weight > 0.0 {
            round_to(weighted / total_weight, 1)
        } else {
            0.0
        };

        let categories: Vec<CategoryScore> = raw
            .into_iter()
            .map(|(category, score, has_data)| CategoryScore {
                category,
                score: round_to(score, 1),
                weight: weights.weight(category),
                has_data,
            })
            .collect();

        debug!(
            "Category scores: {}",
            categories
                .iter()
                .map(|c| format!("{}={:.1}", c.category, c.score))
                .collect::<Vec<_>>()
                .join(", ")
        );
        info!("Health score ({}): {:.1}", mode, overall);

        HealthBreakdown {
            mode,
            overall_score: overall,
            grade: grade_from_score(overall).to_string(),
            categories,
        }
    }
}

fn category_score(metrics: &CategoryMetrics, category: Category, mode: ScoringMode) -> (f64, bool) {
    match category {
        Category::Contributor => {
            let c = &metrics.contributor;
            (scored_contributor(c, mode), c.has_data)
        }
        Category::Commit => (metrics.commit.score, metrics.commit.has_data),
        Category::PullRequest => (metrics.pull_request.score, metrics.pull_request.has_data),
        Category::CodeReview => (metrics.code_review.score, metrics.code_review.has_data),
        Category::CiCd => (metrics.ci_cd.score, metrics.ci_cd.has_data),
        Category::Issue => (metrics.issue.score, metrics.issue.has_data),
        Category::Test => (metrics.test.score, metrics.test.has_data),
    }
}

fn scored_contributor(metrics: &ContributorMetrics, mode: ScoringMode) -> f64 {
    if !metrics.has_data {
        return 0.0;
    }
    let bus = match (mode, &metrics.fork) {
        (ScoringMode::ForkAware, Some(fork)) => fork.original_bus_factor,
        _ => metrics.bus_factor,
    };
    contributor_score(bus, metrics.total_contributors)
}

/// Contributor sub-score from bus factor and contributor count.
pub fn contributor_score(bus_factor: usize, total_contributors: usize) -> f64 {
    let base: f64 = match bus_factor {
        b if b >= 10 => 10.0,
        b if b >= 5 => 8.0,
        b if b >= 3 => 6.0,
        2 => 4.0,
        _ => 2.0,
    };
    if total_contributors >= 100 {
        (base + 2.0).min(10.0)
    } else if total_contributors >= 50 {
        (base + 1.0).min(10.0)
    } else if total_contributors <= 3 {
        (base - 2.0).max(0.0)
    } else {
        base
    }
}
