//! Configuration module for repo-health
//!
//! This module handles:
//! - Project-level configuration (repo-health.toml)
//! - Category weight customization for both scoring modes
//! - Analysis window, sampling and cache settings

mod project_config;

pub use project_config::{
    load_project_config, AnalysisConfig, CacheConfig, CategoryWeights, ClassifierConfig,
    ProjectConfig, RepositoriesConfig, ScoringConfig, CONFIG_FILE, JSON_CONFIG_FILE,
};
