//! Core data models for repo-health
//!
//! Normalized records produced by the forge and local-clone sources and
//! consumed by the classifier, the metric calculators and the scorer.
//! Every field that a source may fail to supply carries a serde default so
//! that partially populated snapshots still deserialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slug of the reference implementation repository.
pub const BITCOIN_CORE: &str = "bitcoin/bitcoin";
/// Slug of the downstream fork that periodically merges from Core.
pub const BITCOIN_KNOTS: &str = "bitcoinknots/bitcoin";

/// Author association values that count as "maintainer side" on GitHub.
pub const INTERNAL_ASSOCIATIONS: [&str; 3] = ["OWNER", "MEMBER", "COLLABORATOR"];

/// A person as seen by a commit, PR, review or issue.
///
/// Any subset of the fields may be missing. Aggregation keys on the forge
/// login, falling back to the free-text name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    pub fn login(login: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            login: None,
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }

    /// Aggregation key: login if present and non-empty, else name, else `None`.
    pub fn key(&self) -> Option<&str> {
        non_empty(self.login.as_deref()).or_else(|| non_empty(self.name.as_deref()))
    }

    /// Two identities refer to the same person when their keys match.
    pub fn same_person(&self, other: &Identity) -> bool {
        match (self.key(), other.key()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Lowercased text after the last `@` of the email, if any.
    pub fn email_domain(&self) -> Option<String> {
        self.email.as_deref().and_then(email_domain)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Domain part of an email address, lowercased.
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.rsplit_once('@')?;
    let domain = domain.trim();
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_lowercase())
    }
}

/// Line statistics for a commit or pull request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

impl ChangeStats {
    pub fn total(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// A normalized commit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    #[serde(default)]
    pub author: Identity,
    #[serde(default)]
    pub committer: Identity,
    #[serde(default)]
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ChangeStats>,
}

impl CommitRecord {
    pub fn first_line(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    /// Message-based merge detection: starts with "Merge" and mentions a
    /// pull request, a branch, or an "into" target.
    pub fn is_merge_message(&self) -> bool {
        let msg = self.message.as_str();
        msg.starts_with("Merge")
            && (msg.contains("pull request") || msg.contains("branch") || msg.contains("into"))
    }
}

/// Open or closed, shared by pull requests and issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub number: u64,
    #[serde(default)]
    pub author: Identity,
    #[serde(default)]
    pub state: ItemState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    /// Who pressed the merge button, when the forge reports it.
    #[serde(default)]
    pub merged_by: Option<Identity>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub stats: Option<ChangeStats>,
    #[serde(default)]
    pub author_association: Option<String>,
}

impl PullRequestRecord {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }
}

/// Review verdicts as reported by the forge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    #[default]
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(default)]
    pub reviewer: Identity,
    #[serde(default)]
    pub state: ReviewState,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(default)]
    pub author: Identity,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Reviews and review comments fetched for one sampled pull request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSample {
    pub pr_number: u64,
    #[serde(default)]
    pub reviews: Vec<ReviewRecord>,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub number: u64,
    #[serde(default)]
    pub author: Identity,
    #[serde(default)]
    pub state: ItemState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: u64,
    /// Time of the first comment by someone other than the author, when fetched.
    #[serde(default)]
    pub first_response_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub author_association: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRunRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    pub created_at: DateTime<Utc>,
    /// PR numbers the forge associates with the run.
    #[serde(default)]
    pub pull_requests: Vec<u64>,
}

/// One entry of the forge's contributor list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorRecord {
    pub login: String,
    #[serde(default)]
    pub contributions: u64,
}

/// Repository metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub forks: u64,
    #[serde(default)]
    pub open_issues: u64,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_fork: bool,
    #[serde(default)]
    pub parent: Option<String>,
}

/// Counts of raw records dropped during normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecords {
    #[serde(default)]
    pub commits: usize,
    #[serde(default)]
    pub pull_requests: usize,
    #[serde(default)]
    pub issues: usize,
    #[serde(default)]
    pub workflow_runs: usize,
}

impl SkippedRecords {
    pub fn total(&self) -> usize {
        self.commits + self.pull_requests + self.issues + self.workflow_runs
    }

    pub fn merge(&mut self, other: SkippedRecords) {
        self.commits += other.commits;
        self.pull_requests += other.pull_requests;
        self.issues += other.issues;
        self.workflow_runs += other.workflow_runs;
    }
}

/// Everything fetched from the hosted forge for one repository and window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgeData {
    #[serde(default)]
    pub repo: RepoInfo,
    #[serde(default)]
    pub contributors: Vec<ContributorRecord>,
    #[serde(default)]
    pub commits: Vec<CommitRecord>,
    #[serde(default)]
    pub pull_requests: Vec<PullRequestRecord>,
    #[serde(default)]
    pub review_samples: Vec<ReviewSample>,
    #[serde(default)]
    pub issues: Vec<IssueRecord>,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRunRecord>,
    #[serde(default)]
    pub skipped: SkippedRecords,
    /// Endpoints that failed while the rest of the fetch went through.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_requests: Vec<String>,
}

/// Per-email commit count from the local clone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailContributor {
    pub name: String,
    pub email: String,
    pub commits: usize,
}

/// Facts read from a local clone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalGitData {
    #[serde(default)]
    pub contributors: Vec<EmailContributor>,
    #[serde(default)]
    pub total_commits: usize,
    /// Non-merge commits in the window.
    #[serde(default)]
    pub direct_commits: usize,
    #[serde(default)]
    pub ci_config_files: Vec<String>,
    #[serde(default)]
    pub test_files_count: usize,
    #[serde(default)]
    pub has_test_directory: bool,
    #[serde(default)]
    pub test_framework_signals: Vec<String>,
    /// Lines changed per non-merge commit in the window.
    #[serde(default)]
    pub commit_sizes: Vec<u64>,
}

/// Map a 0-10 health score to a letter grade.
pub fn grade_from_score(score: f64) -> &'static str {
    if score >= 9.0 {
        "A"
    } else if score >= 8.0 {
        "B"
    } else if score >= 6.5 {
        "C"
    } else if score >= 5.0 {
        "D"
    } else {
        "F"
    }
}

/// Round to the given number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_prefers_login() {
        let id = Identity {
            login: Some("luke-jr".into()),
            name: Some("Luke Dashjr".into()),
            email: None,
        };
        assert_eq!(id.key(), Some("luke-jr"));
    }

    #[test]
    fn test_identity_key_falls_back_to_name() {
        let id = Identity {
            login: Some("  ".into()),
            name: Some("Satoshi".into()),
            email: None,
        };
        assert_eq!(id.key(), Some("Satoshi"));
        assert_eq!(Identity::default().key(), None);
    }

    #[test]
    fn test_same_person_requires_keys() {
        assert!(!Identity::default().same_person(&Identity::default()));
        assert!(Identity::login("a").same_person(&Identity::login("a")));
        assert!(!Identity::login("a").same_person(&Identity::login("b")));
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("dev@Example.ORG"), Some("example.org".into()));
        assert_eq!(email_domain("a@b@c.io"), Some("c.io".into()));
        assert_eq!(email_domain("no-at-sign"), None);
        assert_eq!(email_domain("trailing@"), None);
    }

    #[test]
    fn test_merge_message_detection() {
        let mut commit = CommitRecord {
            sha: "abc".into(),
            author: Identity::default(),
            committer: Identity::default(),
            message: "Merge bitcoin/bitcoin#123: fix".into(),
            timestamp: Utc::now(),
            stats: None,
        };
        assert!(!commit.is_merge_message());
        commit.message = "Merge branch 'x' into master".into();
        assert!(commit.is_merge_message());
        commit.message = "Merge pull request #5 from a/b".into();
        assert!(commit.is_merge_message());
        commit.message = "Refactor merge logic into helper".into();
        assert!(!commit.is_merge_message());
    }

    #[test]
    fn test_review_state_unknown_values() {
        let state: ReviewState = serde_json::from_str("\"CHANGES_REQUESTED\"").unwrap();
        assert_eq!(state, ReviewState::ChangesRequested);
        let state: ReviewState = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(state, ReviewState::Other);
    }

    #[test]
    fn test_grade_and_rounding() {
        assert_eq!(grade_from_score(9.2), "A");
        assert_eq!(grade_from_score(0.0), "F");
        assert_eq!(round_to(7.349, 1), 7.3);
        assert_eq!(round_to(0.12345, 3), 0.123);
    }
}
