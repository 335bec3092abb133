//! Saved forge data for offline runs
//!
//! A snapshot is the JSON form of [`ForgeData`] for one repository. It can
//! stand in for the live client: `fetch` filters the saved records to the
//! requested window, and merge-commit lookups are answered from the saved
//! commits.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

use super::{AnalysisWindow, ForgeSource, MergeCommitIdentities, MergeCommitLookup, ReferenceCommitSource};
use crate::error::SourceResult;
use crate::models::ForgeData;

/// Read a snapshot file.
pub fn load_snapshot(path: &Path) -> SourceResult<ForgeData> {
    let content = std::fs::read_to_string(path)?;
    let data: ForgeData = serde_json::from_str(&content)?;
    debug!("Loaded snapshot of {} from {}", data.repo.full_name, path.display());
    Ok(data)
}

/// Write a snapshot file, creating parent directories.
pub fn save_snapshot(path: &Path, data: &ForgeData) -> SourceResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json)?;
    info!("Saved snapshot of {} to {}", data.repo.full_name, path.display());
    Ok(())
}

/// In-memory forge backed by snapshots, keyed by repository slug.
#[derive(Debug, Default, Clone)]
pub struct SnapshotSource {
    repos: HashMap<String, ForgeData>,
}

impl SnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register data under its own `repo.full_name`, or `slug` if given.
    pub fn with_repo(mut self, slug: Option<&str>, data: ForgeData) -> Self {
        let key = slug.map(str::to_string).unwrap_or_else(|| data.repo.full_name.clone());
        self.repos.insert(key, data);
        self
    }

    fn get(&self, repo: &str) -> SourceResult<&ForgeData> {
        self.repos
            .get(repo)
            .ok_or_else(|| crate::error::SourceError::NotFound(format!("no snapshot for {}", repo)))
    }
}

impl ForgeSource for SnapshotSource {
    fn fetch(&self, repo: &str, window: &AnalysisWindow) -> SourceResult<ForgeData> {
        let mut data = self.get(repo)?.clone();
        data.commits.retain(|c| window.contains(c.timestamp));
        data.pull_requests.retain(|p| window.contains(p.created_at));
        let kept: HashSet<u64> = data.pull_requests.iter().map(|p| p.number).collect();
        data.review_samples.retain(|s| kept.contains(&s.pr_number));
        data.issues.retain(|i| i.updated_at >= window.since && i.created_at <= window.until);
        data.workflow_runs.retain(|r| window.contains(r.created_at));
        Ok(data)
    }
}

impl ReferenceCommitSource for SnapshotSource {
    fn reference_shas(&self, repo: &str, window: &AnalysisWindow) -> SourceResult<HashSet<String>> {
        Ok(self
            .get(repo)?
            .commits
            .iter()
            .filter(|c| window.contains(c.timestamp))
            .map(|c| c.sha.clone())
            .collect())
    }
}

impl MergeCommitLookup for SnapshotSource {
    /// A SHA missing from the snapshot is an ordinary absence.
    fn merge_commit(&self, repo: &str, sha: &str) -> SourceResult<Option<MergeCommitIdentities>> {
        let Ok(data) = self.get(repo) else {
            return Ok(None);
        };
        Ok(data
            .commits
            .iter()
            .find(|c| c.sha == sha)
            .map(|c| MergeCommitIdentities {
                author: c.author.clone(),
                committer: c.committer.clone(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitRecord, Identity, PullRequestRecord, RepoInfo, ReviewSample};
    use chrono::{Duration, TimeZone, Utc};

    fn sample() -> ForgeData {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let commit = |sha: &str, days_ago: i64| CommitRecord {
            sha: sha.into(),
            author: Identity::login("alice"),
            committer: Identity::login("web-flow"),
            message: "m".into(),
            timestamp: now - Duration::days(days_ago),
            stats: None,
        };
        ForgeData {
            repo: RepoInfo {
                full_name: "bitcoinknots/bitcoin".into(),
                ..Default::default()
            },
            commits: vec![commit("recent", 5), commit("old", 400)],
            pull_requests: vec![
                PullRequestRecord {
                    number: 1,
                    created_at: now - Duration::days(3),
                    ..Default::default()
                },
                PullRequestRecord {
                    number: 2,
                    created_at: now - Duration::days(500),
                    ..Default::default()
                },
            ],
            review_samples: vec![
                ReviewSample {
                    pr_number: 1,
                    ..Default::default()
                },
                ReviewSample {
                    pr_number: 2,
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("knots.json");
        save_snapshot(&path, &sample()).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_fetch_filters_to_window() {
        let source = SnapshotSource::new().with_repo(None, sample());
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let window = AnalysisWindow::months_back(now, 12);

        let data = source.fetch("bitcoinknots/bitcoin", &window).unwrap();
        assert_eq!(data.commits.len(), 1);
        assert_eq!(data.pull_requests.len(), 1);
        assert_eq!(data.review_samples.len(), 1);

        let shas = source.reference_shas("bitcoinknots/bitcoin", &window).unwrap();
        assert!(shas.contains("recent"));
        assert!(!shas.contains("old"));

        assert!(source.fetch("bitcoin/bitcoin", &window).is_err());
    }

    #[test]
    fn test_merge_commit_lookup() {
        let source = SnapshotSource::new().with_repo(None, sample());
        let found = source.merge_commit("bitcoinknots/bitcoin", "old").unwrap();
        assert_eq!(found.map(|m| m.author), Some(Identity::login("alice")));
        assert_eq!(source.merge_commit("bitcoinknots/bitcoin", "nope").unwrap(), None);
        assert_eq!(source.merge_commit("other/repo", "old").unwrap(), None);
    }
}
