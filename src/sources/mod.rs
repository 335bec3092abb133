//! Data sources feeding the analysis
//!
//! - `github` - GitHub REST v3 client with pagination, rate limiting and
//!   an on-disk response cache
//! - `snapshot` - previously saved forge data, for offline runs
//!
//! The local clone reader lives in [`crate::git`].
//!
//! Sources implement the traits below. The analysis only talks to the
//! traits, so tests substitute in-memory fakes.

pub mod github;
pub mod snapshot;

use std::collections::HashSet;
use std::path::Path;

use crate::error::SourceResult;
use crate::models::{ForgeData, Identity, LocalGitData};
use chrono::{DateTime, Utc};

/// Time range of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl AnalysisWindow {
    /// Window ending at `now` and reaching back the given number of months.
    pub fn months_back(now: DateTime<Utc>, months: u32) -> Self {
        let since = now
            .checked_sub_months(chrono::Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { since, until: now }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.since && at <= self.until
    }
}

/// Everything the hosted forge knows about a repository in a window.
pub trait ForgeSource: Sync {
    fn fetch(&self, repo: &str, window: &AnalysisWindow) -> SourceResult<ForgeData>;
}

/// Upstream commit SHAs in a window, used to classify fork commits.
pub trait ReferenceCommitSource: Sync {
    fn reference_shas(&self, repo: &str, window: &AnalysisWindow) -> SourceResult<HashSet<String>>;
}

/// Author and committer of a merge commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeCommitIdentities {
    pub author: Identity,
    pub committer: Identity,
}

/// On-demand lookup of a single merge commit.
///
/// Used to detect self-merges when the forge omits `merged_by`.
/// `Ok(None)` means the commit does not exist; `Err` is a transport failure.
pub trait MergeCommitLookup: Sync {
    fn merge_commit(&self, repo: &str, sha: &str) -> SourceResult<Option<MergeCommitIdentities>>;
}

/// Facts read from a local clone of the repository.
pub trait LocalSource: Sync {
    fn collect(&self, path: &Path, window: &AnalysisWindow) -> SourceResult<LocalGitData>;
}
