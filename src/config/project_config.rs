//! Project-level configuration support
//!
//! Loads configuration from `repo-health.toml` or `.repo-healthrc.json` in
//! the working directory.
//!
//! # Configuration Format
//!
//! ```toml
//! # repo-health.toml
//!
//! [repositories]
//! upstream = "bitcoin/bitcoin"
//! fork = "bitcoinknots/bitcoin"
//!
//! [analysis]
//! months = 12
//! stale_days = 30
//! review_sample_size = 10
//! max_pages = 30
//! max_merge_lookups = 100
//!
//! [scoring.standard_weights]
//! contributor = 0.15
//! code_review = 0.20
//!
//! [scoring.fork_weights]
//! contributor = 0.30
//!
//! [cache]
//! enabled = true
//! expiry_hours = 24
//!
//! [classifier]
//! extra_upstream_patterns = ["(?i)^backport"]
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::{BITCOIN_CORE, BITCOIN_KNOTS};
use crate::scoring::Category;

pub const CONFIG_FILE: &str = "repo-health.toml";
pub const JSON_CONFIG_FILE: &str = ".repo-healthrc.json";

/// Project-level configuration loaded from repo-health.toml or similar
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// The upstream/fork pair used by `fight`
    #[serde(default)]
    pub repositories: RepositoriesConfig,

    /// Analysis window and sampling limits
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Category weights for both scoring modes
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// On-disk response cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Fork-origin classifier tuning
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoriesConfig {
    #[serde(default = "default_upstream")]
    pub upstream: String,
    #[serde(default = "default_fork")]
    pub fork: String,
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            upstream: default_upstream(),
            fork: default_fork(),
        }
    }
}

fn default_upstream() -> String {
    BITCOIN_CORE.to_string()
}
fn default_fork() -> String {
    BITCOIN_KNOTS.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Months of history to analyze (default: 12)
    #[serde(default = "default_months")]
    pub months: u32,

    /// Days without activity before an open issue is stale (default: 30)
    #[serde(default = "default_stale_days")]
    pub stale_days: i64,

    /// PRs whose reviews and comments are fetched (default: 10)
    #[serde(default = "default_review_sample_size")]
    pub review_sample_size: usize,

    /// Page cap per paginated endpoint (default: 30)
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Merge-commit lookups per repository for PRs without `merged_by`
    /// (default: 100)
    #[serde(default = "default_max_merge_lookups")]
    pub max_merge_lookups: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            months: default_months(),
            stale_days: default_stale_days(),
            review_sample_size: default_review_sample_size(),
            max_pages: default_max_pages(),
            max_merge_lookups: default_max_merge_lookups(),
        }
    }
}

fn default_months() -> u32 {
    12
}
fn default_stale_days() -> i64 {
    crate::metrics::issues::DEFAULT_STALE_DAYS
}
fn default_review_sample_size() -> usize {
    10
}
fn default_max_pages() -> usize {
    30
}
fn default_max_merge_lookups() -> usize {
    crate::metrics::code_review::DEFAULT_MAX_MERGE_LOOKUPS
}

/// Scoring configuration for health score calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weights used for ordinary repositories
    #[serde(default = "CategoryWeights::standard")]
    pub standard_weights: CategoryWeights,

    /// Weights used for the fork in fight mode
    #[serde(default = "CategoryWeights::fork_aware")]
    pub fork_weights: CategoryWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            standard_weights: CategoryWeights::standard(),
            fork_weights: CategoryWeights::fork_aware(),
        }
    }
}

/// Weights for the seven scoring categories
///
/// A partially specified table keeps the standard defaults for the
/// categories it leaves out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    #[serde(default = "default_contributor_weight")]
    pub contributor: f64,
    #[serde(default = "default_commit_weight")]
    pub commit: f64,
    #[serde(default = "default_pull_request_weight")]
    pub pull_request: f64,
    #[serde(default = "default_code_review_weight")]
    pub code_review: f64,
    #[serde(default = "default_ci_cd_weight")]
    pub ci_cd: f64,
    #[serde(default = "default_issue_weight")]
    pub issue: f64,
    #[serde(default = "default_test_weight")]
    pub test: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self::standard()
    }
}

fn default_contributor_weight() -> f64 {
    0.15
}
fn default_commit_weight() -> f64 {
    0.15
}
fn default_pull_request_weight() -> f64 {
    0.15
}
fn default_code_review_weight() -> f64 {
    0.20
}
fn default_ci_cd_weight() -> f64 {
    0.15
}
fn default_issue_weight() -> f64 {
    0.10
}
fn default_test_weight() -> f64 {
    0.10
}

impl CategoryWeights {
    pub fn standard() -> Self {
        Self {
            contributor: default_contributor_weight(),
            commit: default_commit_weight(),
            pull_request: default_pull_request_weight(),
            code_review: default_code_review_weight(),
            ci_cd: default_ci_cd_weight(),
            issue: default_issue_weight(),
            test: default_test_weight(),
        }
    }

    /// Weights emphasizing a fork's own contributor base and review culture.
    pub fn fork_aware() -> Self {
        Self {
            contributor: 0.30,
            commit: 0.15,
            pull_request: 0.15,
            code_review: 0.25,
            ci_cd: 0.05,
            issue: 0.05,
            test: 0.05,
        }
    }

    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Contributor => self.contributor,
            Category::Commit => self.commit,
            Category::PullRequest => self.pull_request,
            Category::CodeReview => self.code_review,
            Category::CiCd => self.ci_cd,
            Category::Issue => self.issue,
            Category::Test => self.test,
        }
    }

    fn sum(&self) -> f64 {
        Category::ALL.iter().map(|c| self.weight(*c)).sum()
    }

    /// Validate that weights sum to 1.0 (with tolerance)
    pub fn is_valid(&self) -> bool {
        (self.sum() - 1.0).abs() < 0.001
    }

    /// Normalize weights to sum to 1.0
    pub fn normalize(&mut self) {
        let sum = self.sum();
        if sum > 0.0 {
            self.contributor /= sum;
            self.commit /= sum;
            self.pull_request /= sum;
            self.code_review /= sum;
            self.ci_cd /= sum;
            self.issue /= sum;
            self.test /= sum;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Hours before a cached response is refetched (default: 24)
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: u64,

    /// Override for the cache directory (default: user cache dir)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            expiry_hours: default_expiry_hours(),
            dir: None,
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}
fn default_expiry_hours() -> u64 {
    24
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Additional commit-message regexes marking upstream merges
    #[serde(default)]
    pub extra_upstream_patterns: Vec<String>,
}

impl ClassifierConfig {
    /// Compile the extra patterns, skipping (and logging) invalid ones.
    pub fn compiled_patterns(&self) -> Vec<Regex> {
        self.extra_upstream_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Ignoring invalid classifier pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect()
    }
}

/// Load project configuration from a directory.
///
/// Searches for configuration files in this order:
/// 1. `repo-health.toml`
/// 2. `.repo-healthrc.json`
///
/// Returns default configuration if no config file is found. Weights that
/// do not sum to 1.0 are normalized.
pub fn load_project_config(dir: &Path) -> ProjectConfig {
    let mut config = find_project_config(dir);
    for (label, weights) in [
        ("standard", &mut config.scoring.standard_weights),
        ("fork", &mut config.scoring.fork_weights),
    ] {
        if !weights.is_valid() {
            warn!("{} weights do not sum to 1.0, normalizing", label);
            weights.normalize();
        }
    }
    config
}

fn find_project_config(dir: &Path) -> ProjectConfig {
    // Try TOML first (preferred format)
    let toml_path = dir.join(CONFIG_FILE);
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    // Try JSON
    let json_path = dir.join(JSON_CONFIG_FILE);
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    ProjectConfig::default()
}

/// Load configuration from a TOML file
fn load_toml_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration from a JSON file
fn load_json_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_are_valid() {
        assert!(CategoryWeights::standard().is_valid());
        assert!(CategoryWeights::fork_aware().is_valid());
        assert_eq!(CategoryWeights::fork_aware().weight(Category::Contributor), 0.30);
    }

    #[test]
    fn test_category_weights_normalize() {
        let mut weights = CategoryWeights {
            contributor: 2.0,
            commit: 1.0,
            pull_request: 1.0,
            code_review: 0.0,
            ci_cd: 0.0,
            issue: 0.0,
            test: 0.0,
        };
        assert!(!weights.is_valid());
        weights.normalize();
        assert!(weights.is_valid());
        assert!((weights.contributor - 0.5).abs() < 0.001);
        assert!((weights.commit - 0.25).abs() < 0.001);
    }

    #[test]
    fn test_default_config() {
        let config = ProjectConfig::default();
        assert_eq!(config.repositories.upstream, "bitcoin/bitcoin");
        assert_eq!(config.repositories.fork, "bitcoinknots/bitcoin");
        assert_eq!(config.analysis.months, 12);
        assert_eq!(config.analysis.stale_days, 30);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.expiry_hours, 24);
        assert!(config.scoring.standard_weights.is_valid());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_content = r#"
[repositories]
fork = "someone/bitcoin"

[analysis]
months = 6
review_sample_size = 25
max_merge_lookups = 0

[scoring.fork_weights]
contributor = 0.40
test = 0.0

[cache]
enabled = false

[classifier]
extra_upstream_patterns = ["(?i)^backport", "("]
"#;

        let config: ProjectConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.repositories.upstream, "bitcoin/bitcoin");
        assert_eq!(config.repositories.fork, "someone/bitcoin");
        assert_eq!(config.analysis.months, 6);
        assert_eq!(config.analysis.stale_days, 30);
        assert_eq!(config.analysis.review_sample_size, 25);
        assert_eq!(config.analysis.max_merge_lookups, 0);
        assert!(!config.cache.enabled);

        // unspecified categories fall back to the standard defaults
        let fork = config.scoring.fork_weights;
        assert_eq!(fork.contributor, 0.40);
        assert_eq!(fork.test, 0.0);
        assert_eq!(fork.code_review, 0.20);

        assert_eq!(config.classifier.compiled_patterns().len(), 1);
    }

    #[test]
    fn test_load_prefers_toml_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[scoring.standard_weights]\ncontributor = 1.15\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(JSON_CONFIG_FILE),
            r#"{"analysis": {"months": 3}}"#,
        )
        .unwrap();

        let config = load_project_config(dir.path());
        assert_eq!(config.analysis.months, 12);
        assert!(config.scoring.standard_weights.is_valid());
        assert!((config.scoring.standard_weights.contributor - 0.575).abs() < 0.001);
    }

    #[test]
    fn test_load_json_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(JSON_CONFIG_FILE),
            r#"{"analysis": {"months": 3}}"#,
        )
        .unwrap();
        assert_eq!(load_project_config(dir.path()).analysis.months, 3);

        let broken = tempfile::tempdir().unwrap();
        std::fs::write(broken.path().join(CONFIG_FILE), "not = [valid").unwrap();
        assert_eq!(load_project_config(broken.path()).analysis.months, 12);
    }
}
