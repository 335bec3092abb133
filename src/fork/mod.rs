//! Fork-aware contribution attribution
//!
//! A downstream fork such as Bitcoin Knots carries most of upstream's history
//! alongside its own work. Counting every commit on the fork as the fork's
//! own would credit upstream authors with the fork's health, so commits are
//! first split by origin and only the ORIGINAL bucket feeds fork-specific
//! resilience metrics.
//!
//! # Example
//!
//! ```
//! use repo_health::fork::{aggregate, ForkClassifier, ForkContext, ReferenceCommitSet};
//! use repo_health::models::{CommitRecord, Identity, BITCOIN_CORE, BITCOIN_KNOTS};
//! use chrono::Utc;
//!
//! let commits = vec![CommitRecord {
//!     sha: "ghi".into(),
//!     author: Identity::login("luke-jr"),
//!     committer: Identity::login("luke-jr"),
//!     message: "wallet: fix rescan bug".into(),
//!     timestamp: Utc::now(),
//!     stats: None,
//! }];
//! let reference = ReferenceCommitSet::new();
//! let classifier = ForkClassifier::new(BITCOIN_CORE);
//! let ctx = ForkContext::fork(BITCOIN_KNOTS, BITCOIN_CORE, Some(&reference));
//! let attribution = aggregate(classifier.classify_all(&commits, &ctx));
//! assert_eq!(attribution.original_commit_count, 1);
//! ```

mod aggregator;
mod classifier;

pub use aggregator::{aggregate, contributor_gini, AuthorCount, ContributionDistribution, ForkAttribution};
pub use classifier::{
    ClassificationLabel, ForkClassifier, ForkContext, ReferenceCommitSet, RepositoryRole,
};
