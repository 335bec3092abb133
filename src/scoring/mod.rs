//! Overall repository health scoring
//!
//! # Scoring Formula
//!
//! ```text
//! Overall = Σ(category_score × weight) / Σ(weight)
//! ```
//!
//! Every category score is on 0-10 and the result is rounded to one
//! decimal. A category without data scores 0 but keeps its weight, so an
//! empty repository scores 0.
//!
//! # Weights
//!
//! | Category     | Standard | Fork-aware |
//! |--------------|----------|------------|
//! | contributor  | 0.15     | 0.30       |
//! | commit       | 0.15     | 0.15       |
//! | pull_request | 0.15     | 0.15       |
//! | code_review  | 0.20     | 0.25       |
//! | ci_cd        | 0.15     | 0.05       |
//! | issue        | 0.10     | 0.05       |
//! | test         | 0.10     | 0.05       |
//!
//! Fork-aware mode also replaces the contributor bus factor with the bus
//! factor of the fork's original commits, so merged upstream work does not
//! inflate the fork's resilience.

mod health;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use health::{contributor_score, CategoryScore, HealthBreakdown, HealthScorer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Contributor,
    Commit,
    PullRequest,
    CodeReview,
    CiCd,
    Issue,
    Test,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Contributor,
        Category::Commit,
        Category::PullRequest,
        Category::CodeReview,
        Category::CiCd,
        Category::Issue,
        Category::Test,
    ];

    /// Machine name, as used in config tables and JSON.
    pub fn name(self) -> &'static str {
        match self {
            Category::Contributor => "contributor",
            Category::Commit => "commit",
            Category::PullRequest => "pull_request",
            Category::CodeReview => "code_review",
            Category::CiCd => "ci_cd",
            Category::Issue => "issue",
            Category::Test => "test",
        }
    }

    /// Human-readable title for reports.
    pub fn title(self) -> &'static str {
        match self {
            Category::Contributor => "Contributors",
            Category::Commit => "Commits",
            Category::PullRequest => "Pull Requests",
            Category::CodeReview => "Code Review",
            Category::CiCd => "CI/CD",
            Category::Issue => "Issues",
            Category::Test => "Testing",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which weight table and bus-factor input to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    #[default]
    Standard,
    /// Used for the fork in fight mode
    ForkAware,
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringMode::Standard => write!(f, "standard"),
            ScoringMode::ForkAware => write!(f, "fork-aware"),
        }
    }
}
