//! repo-health - contributor and process health of Bitcoin implementations
//!
//! Scores a repository on a 0-10 scale from seven categories (contributors,
//! commits, pull requests, code review, CI/CD, issues, testing) derived from
//! GitHub data and an optional local clone.
//!
//! Downstream forks get fork-aware attribution: commits that arrived from
//! upstream are separated from the fork's own work before bus factor and
//! concentration are measured. See [`fork`] for the classification rules.
//!
//! Pipeline: [`sources`] → [`fork`] → [`metrics`] → [`scoring`] →
//! [`analysis::AnalysisReport`] → [`reporters`].

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod fork;
pub mod git;
pub mod metrics;
pub mod models;
pub mod reporters;
pub mod scoring;
pub mod sources;
