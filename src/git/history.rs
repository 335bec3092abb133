//! Local clone inspection using libgit2
//!
//! Walks HEAD history inside an analysis window and lists the tracked files
//! of the HEAD tree, using the git2 crate (Rust bindings to libgit2).

use chrono::{DateTime, TimeZone, Utc};
use git2::{Repository, Sort};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::SourceResult;
use crate::metrics::ci_cd::is_ci_config;
use crate::metrics::testing::{framework_signals, has_test_directory, is_test_file};
use crate::models::{ChangeStats, CommitRecord, EmailContributor, Identity, LocalGitData};
use crate::sources::AnalysisWindow;

/// Commit counts of one history walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistorySummary {
    pub total_commits: usize,
    /// Commits with at most one parent
    pub direct_commits: usize,
    pub contributors: Vec<EmailContributor>,
}

/// Read-only view of a local clone.
pub struct LocalRepository {
    repo: Repository,
}

impl LocalRepository {
    /// Open a git repository.
    ///
    /// # Arguments
    /// * `path` - Path to the repository (or any subdirectory)
    pub fn open(path: &Path) -> SourceResult<Self> {
        let repo = Repository::discover(path)?;
        debug!("Opened git repository at {:?}", repo.path());
        Ok(Self { repo })
    }

    /// Check if a path is inside a git repository.
    pub fn is_git_repo(path: &Path) -> bool {
        Repository::discover(path).is_ok()
    }

    /// Walk HEAD newest first, calling `visit` for every commit inside the
    /// window. Stops at the first commit older than the window.
    fn walk_window(
        &self,
        window: &AnalysisWindow,
        mut visit: impl FnMut(&git2::Commit) -> SourceResult<()>,
    ) -> SourceResult<()> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME)?;
        revwalk.push_head()?;

        for oid_result in revwalk {
            let commit = self.repo.find_commit(oid_result?)?;
            let Some(at) = commit_time(&commit) else {
                continue;
            };
            if at < window.since {
                break; // sorted by time
            }
            if at > window.until {
                continue;
            }
            visit(&commit)?;
        }
        Ok(())
    }

    /// Commits of the window as normalized records.
    ///
    /// Line statistics need a tree diff per commit and are only computed
    /// when `with_stats` is set. Merge commits never get them.
    pub fn recent_commits(&self, window: &AnalysisWindow, with_stats: bool) -> SourceResult<Vec<CommitRecord>> {
        let mut commits = Vec::new();
        self.walk_window(window, |commit| {
            let Some(timestamp) = commit_time(commit) else {
                return Ok(());
            };
            let stats = if with_stats && commit.parent_count() <= 1 {
                Some(self.commit_stats(commit)?)
            } else {
                None
            };
            commits.push(CommitRecord {
                sha: commit.id().to_string(),
                author: signature_identity(&commit.author()),
                committer: signature_identity(&commit.committer()),
                message: commit.message().unwrap_or("").to_string(),
                timestamp,
                stats,
            });
            Ok(())
        })?;
        Ok(commits)
    }

    fn commit_stats(&self, commit: &git2::Commit) -> SourceResult<ChangeStats> {
        let parent = commit.parent(0).ok();
        let tree = commit.tree()?;
        let parent_tree = parent.as_ref().map(|p| p.tree()).transpose()?;
        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        let stats = diff.stats()?;
        Ok(ChangeStats {
            additions: stats.insertions() as u64,
            deletions: stats.deletions() as u64,
        })
    }

    /// Commit totals and per-email contributors of the window.
    pub fn history_summary(&self, window: &AnalysisWindow) -> SourceResult<HistorySummary> {
        let mut summary = HistorySummary::default();
        // email -> (name, commits, first seen)
        let mut by_email: HashMap<String, (String, usize, usize)> = HashMap::new();

        self.walk_window(window, |commit| {
            summary.total_commits += 1;
            if commit.parent_count() <= 1 {
                summary.direct_commits += 1;
            }
            let author = commit.author();
            let email = author.email().unwrap_or("").to_string();
            let order = by_email.len();
            let entry = by_email
                .entry(email)
                .or_insert_with(|| (author.name().unwrap_or("Unknown").to_string(), 0, order));
            entry.1 += 1;
            Ok(())
        })?;

        let mut contributors: Vec<(EmailContributor, usize)> = by_email
            .into_iter()
            .map(|(email, (name, commits, order))| (EmailContributor { name, email, commits }, order))
            .collect();
        contributors.sort_by(|a, b| b.0.commits.cmp(&a.0.commits).then(a.1.cmp(&b.1)));
        summary.contributors = contributors.into_iter().map(|(c, _)| c).collect();

        debug!(
            "Local history: {} commits, {} direct, {} contributors",
            summary.total_commits,
            summary.direct_commits,
            summary.contributors.len()
        );
        Ok(summary)
    }

    /// Get the list of all tracked files in the HEAD tree.
    pub fn tracked_files(&self) -> SourceResult<Vec<String>> {
        let head = self.repo.head()?;
        let tree = head.peel_to_tree()?;

        let mut files = Vec::new();
        tree.walk(git2::TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                let path = if dir.is_empty() {
                    entry.name().unwrap_or("").to_string()
                } else {
                    format!("{}{}", dir, entry.name().unwrap_or(""))
                };
                files.push(path);
            }
            git2::TreeWalkResult::Ok
        })?;

        Ok(files)
    }

    /// Everything the metrics read from a local clone.
    pub fn collect(&self, window: &AnalysisWindow) -> SourceResult<LocalGitData> {
        let summary = self.history_summary(window)?;
        let files = self.tracked_files()?;
        let mut data = local_data_from(summary, &files);
        data.commit_sizes = self
            .recent_commits(window, true)?
            .iter()
            .filter_map(|c| c.stats)
            .map(|s| s.total())
            .collect();
        Ok(data)
    }
}

/// Combine a history walk with the tracked file listing.
pub fn local_data_from(summary: HistorySummary, files: &[String]) -> LocalGitData {
    let paths = || files.iter().map(String::as_str);
    LocalGitData {
        contributors: summary.contributors,
        total_commits: summary.total_commits,
        direct_commits: summary.direct_commits,
        ci_config_files: paths().filter(|p| is_ci_config(p)).map(str::to_string).collect(),
        test_files_count: paths().filter(|p| is_test_file(p)).count(),
        has_test_directory: has_test_directory(paths()),
        test_framework_signals: framework_signals(paths()),
        commit_sizes: Vec::new(),
    }
}

fn commit_time(commit: &git2::Commit) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(commit.time().seconds(), 0).single()
}

fn signature_identity(sig: &git2::Signature) -> Identity {
    Identity {
        login: None,
        name: sig.name().map(str::to_string),
        email: sig.email().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::Duration;
    use tempfile::tempdir;

    fn commit_file(repo: &Repository, dir: &Path, file: &str, name: &str, email: &str, msg: &str) -> Result<git2::Oid> {
        if let Some(parent) = Path::new(file).parent() {
            std::fs::create_dir_all(dir.join(parent))?;
        }
        std::fs::write(dir.join(file), msg)?;
        let mut index = repo.index()?;
        index.add_path(Path::new(file))?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = git2::Signature::now(name, email)?;
        let parents: Vec<git2::Commit> = match repo.head() {
            Ok(head) => vec![head.peel_to_commit()?],
            Err(_) => vec![],
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        Ok(repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &parent_refs)?)
    }

    fn create_test_repo() -> Result<(tempfile::TempDir, Repository)> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        let path = dir.path().to_path_buf();
        commit_file(&repo, &path, "src/init.cpp", "Alice", "alice@example.com", "Initial commit")?;
        commit_file(&repo, &path, "src/test/net_tests.cpp", "Alice", "alice@example.com", "Add tests")?;
        commit_file(&repo, &path, ".github/workflows/ci.yml", "Bob", "bob@other.org", "Add CI")?;
        commit_file(&repo, &path, "test/functional/feature_x.py", "Alice", "alice@example.com", "Functional test")?;
        Ok((dir, repo))
    }

    fn window() -> AnalysisWindow {
        AnalysisWindow::months_back(Utc::now() + Duration::hours(1), 12)
    }

    #[test]
    fn test_open_repo() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        assert!(LocalRepository::open(dir.path()).is_ok());
        assert!(LocalRepository::is_git_repo(dir.path()));
        assert!(!LocalRepository::is_git_repo(tempdir()?.path()));
        Ok(())
    }

    #[test]
    fn test_recent_commits() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        let local = LocalRepository::open(dir.path())?;

        let commits = local.recent_commits(&window(), true)?;
        assert_eq!(commits.len(), 4);
        assert!(commits.iter().any(|c| c.message == "Add CI" && c.author.key() == Some("Bob")));
        assert!(commits.iter().all(|c| c.stats.is_some_and(|s| s.additions >= 1)));

        let future = AnalysisWindow {
            since: Utc::now() + Duration::days(1),
            until: Utc::now() + Duration::days(2),
        };
        assert!(local.recent_commits(&future, false)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_collect() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        let local = LocalRepository::open(dir.path())?;
        let data = local.collect(&window())?;

        assert_eq!(data.total_commits, 4);
        assert_eq!(data.direct_commits, 4);
        assert_eq!(data.contributors.len(), 2);
        assert_eq!(data.contributors[0].email, "alice@example.com");
        assert_eq!(data.contributors[0].commits, 3);
        assert_eq!(data.ci_config_files, vec![".github/workflows/ci.yml".to_string()]);
        assert_eq!(data.test_files_count, 2);
        assert!(data.has_test_directory);
        assert!(data.test_framework_signals.contains(&"Boost.Test unit tests".to_string()));
        assert!(data.test_framework_signals.contains(&"functional test framework".to_string()));
        // one file with a one-line body per commit
        assert_eq!(data.commit_sizes, vec![1, 1, 1, 1]);
        Ok(())
    }

    #[test]
    fn test_local_data_from_paths() {
        let files: Vec<String> = ["Jenkinsfile", "README.md", "tests/test_api.py"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let data = local_data_from(HistorySummary::default(), &files);
        assert_eq!(data.ci_config_files, vec!["Jenkinsfile".to_string()]);
        assert_eq!(data.test_files_count, 1);
        assert!(data.has_test_directory);
    }
}
