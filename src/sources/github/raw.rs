//! GitHub REST v3 payload shapes and their normalization into records
//!
//! Only the fields the analysis reads are declared. Each item of a list
//! response is decoded on its own so that one malformed entry is skipped
//! and counted instead of failing the whole page.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::models::{
    ChangeStats, CommentRecord, CommitRecord, ContributorRecord, Identity, IssueRecord, ItemState,
    PullRequestRecord, RepoInfo, ReviewRecord, ReviewState, WorkflowRunRecord,
};
use crate::sources::MergeCommitIdentities;

#[derive(Debug, Deserialize)]
pub(super) struct RawUser {
    #[serde(default)]
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawGitActor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawGitCommit {
    #[serde(default)]
    author: Option<RawGitActor>,
    #[serde(default)]
    committer: Option<RawGitActor>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawStats {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawCommit {
    sha: String,
    commit: RawGitCommit,
    #[serde(default)]
    author: Option<RawUser>,
    #[serde(default)]
    committer: Option<RawUser>,
    #[serde(default)]
    stats: Option<RawStats>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawParent {
    full_name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawRepo {
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    open_issues_count: u64,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    parent: Option<RawParent>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawContributor {
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    contributions: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawPull {
    number: u64,
    #[serde(default)]
    user: Option<RawUser>,
    state: ItemState,
    created_at: DateTime<Utc>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    merged_by: Option<RawUser>,
    #[serde(default)]
    merge_commit_sha: Option<String>,
    #[serde(default)]
    author_association: Option<String>,
    #[serde(default)]
    additions: Option<u64>,
    #[serde(default)]
    deletions: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawReview {
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    state: ReviewState,
    #[serde(default)]
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawComment {
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawIssue {
    number: u64,
    #[serde(default)]
    user: Option<RawUser>,
    state: ItemState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    comments: u64,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    author_association: Option<String>,
    /// Present when the "issue" is really a pull request.
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawRunPull {
    number: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawRun {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    event: String,
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    head_branch: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    pull_requests: Vec<RawRunPull>,
}

fn user_identity(user: Option<RawUser>) -> Identity {
    Identity {
        login: user.and_then(|u| u.login),
        ..Default::default()
    }
}

fn actor_identity(user: Option<RawUser>, actor: Option<&RawGitActor>) -> Identity {
    Identity {
        login: user.and_then(|u| u.login),
        name: actor.and_then(|a| a.name.clone()),
        email: actor.and_then(|a| a.email.clone()),
    }
}

/// Decode each item independently; returns the decoded items and the
/// number that failed to decode or normalize.
pub(super) fn decode_each<R, T>(items: Vec<Value>, normalize: impl Fn(R) -> Option<T>) -> (Vec<T>, usize)
where
    R: DeserializeOwned,
{
    let mut out = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for item in items {
        match serde_json::from_value::<R>(item) {
            Ok(raw) => match normalize(raw) {
                Some(record) => out.push(record),
                None => skipped += 1,
            },
            Err(e) => {
                debug!("Skipping malformed record: {}", e);
                skipped += 1;
            }
        }
    }
    (out, skipped)
}

/// A commit needs a timestamp and a resolvable author to be usable.
pub(super) fn commit(raw: RawCommit) -> Option<CommitRecord> {
    let timestamp = raw
        .commit
        .author
        .as_ref()
        .and_then(|a| a.date)
        .or_else(|| raw.commit.committer.as_ref().and_then(|c| c.date))?;
    let author = actor_identity(raw.author, raw.commit.author.as_ref());
    author.key()?;
    Some(CommitRecord {
        sha: raw.sha,
        author,
        committer: actor_identity(raw.committer, raw.commit.committer.as_ref()),
        message: raw.commit.message,
        timestamp,
        stats: raw.stats.map(|s| ChangeStats {
            additions: s.additions,
            deletions: s.deletions,
        }),
    })
}

pub(super) fn merge_identities(raw: RawCommit) -> MergeCommitIdentities {
    MergeCommitIdentities {
        author: actor_identity(raw.author, raw.commit.author.as_ref()),
        committer: actor_identity(raw.committer, raw.commit.committer.as_ref()),
    }
}

pub(super) fn commit_sha(item: &Value) -> Option<String> {
    item.get("sha").and_then(Value::as_str).map(str::to_string)
}

pub(super) fn repo(raw: RawRepo) -> RepoInfo {
    RepoInfo {
        full_name: raw.full_name,
        description: raw.description,
        stars: raw.stargazers_count,
        forks: raw.forks_count,
        open_issues: raw.open_issues_count,
        default_branch: raw.default_branch,
        language: raw.language,
        created_at: raw.created_at,
        pushed_at: raw.pushed_at,
        is_fork: raw.fork,
        parent: raw.parent.map(|p| p.full_name),
    }
}

/// Anonymous contributors carry no login and are dropped.
pub(super) fn contributor(raw: RawContributor) -> Option<ContributorRecord> {
    let login = raw.login.filter(|l| !l.is_empty())?;
    Some(ContributorRecord {
        login,
        contributions: raw.contributions,
    })
}

pub(super) fn pull_request(raw: RawPull) -> Option<PullRequestRecord> {
    let stats = match (raw.additions, raw.deletions) {
        (None, None) => None,
        (a, d) => Some(ChangeStats {
            additions: a.unwrap_or(0),
            deletions: d.unwrap_or(0),
        }),
    };
    Some(PullRequestRecord {
        number: raw.number,
        author: user_identity(raw.user),
        state: raw.state,
        created_at: raw.created_at,
        closed_at: raw.closed_at,
        merged_at: raw.merged_at,
        merged_by: raw.merged_by.map(|u| user_identity(Some(u))),
        merge_commit_sha: raw.merge_commit_sha,
        stats,
        author_association: raw.author_association,
    })
}

pub(super) fn review(raw: RawReview) -> Option<ReviewRecord> {
    Some(ReviewRecord {
        reviewer: user_identity(raw.user),
        state: raw.state,
        submitted_at: raw.submitted_at,
    })
}

pub(super) fn comment(raw: RawComment) -> Option<CommentRecord> {
    Some(CommentRecord {
        author: user_identity(raw.user),
        created_at: raw.created_at,
    })
}

/// Earliest comment time among an issue's comments, skipping the issue
/// author's own follow-ups. Malformed comments are ignored.
pub(super) fn first_response_at(items: Vec<Value>, author: &Identity) -> Option<DateTime<Utc>> {
    decode_each(items, comment)
        .0
        .into_iter()
        .filter(|c| !c.author.same_person(author))
        .filter_map(|c| c.created_at)
        .min()
}

/// Pull requests listed by the issues endpoint are not issues.
pub(super) fn is_pull_request(item: &Value) -> bool {
    item.get("pull_request").is_some_and(|v| !v.is_null())
}

pub(super) fn issue(raw: RawIssue) -> Option<IssueRecord> {
    if raw.pull_request.is_some() {
        return None;
    }
    Some(IssueRecord {
        number: raw.number,
        author: user_identity(raw.user),
        state: raw.state,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
        closed_at: raw.closed_at,
        comments: raw.comments,
        first_response_at: None,
        labels: raw.labels.into_iter().map(|l| l.name).collect(),
        author_association: raw.author_association,
    })
}

pub(super) fn workflow_run(raw: RawRun) -> Option<WorkflowRunRecord> {
    Some(WorkflowRunRecord {
        id: raw.id,
        name: raw.name.unwrap_or_default(),
        event: raw.event,
        conclusion: raw.conclusion,
        head_branch: raw.head_branch,
        created_at: raw.created_at,
        pull_requests: raw.pull_requests.into_iter().map(|p| p.number).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commit_normalization() {
        let items = vec![
            json!({
                "sha": "abc",
                "commit": {
                    "author": {"name": "Luke Dashjr", "email": "luke@dashjr.org", "date": "2025-03-01T10:00:00Z"},
                    "committer": {"name": "Luke Dashjr", "email": "luke@dashjr.org", "date": "2025-03-01T11:00:00Z"},
                    "message": "Add new RPC command"
                },
                "author": {"login": "luke-jr"},
                "committer": null
            }),
            // no dates anywhere
            json!({"sha": "def", "commit": {"author": {"name": "x"}, "message": "m"}}),
            // no identity at all
            json!({"sha": "ghi", "commit": {"author": {"date": "2025-03-01T10:00:00Z"}, "message": "m"}}),
            // not even a commit object
            json!({"sha": "jkl"}),
        ];
        let (commits, skipped) = decode_each(items, commit);
        assert_eq!(skipped, 3);
        assert_eq!(commits.len(), 1);
        let c = &commits[0];
        assert_eq!(c.author.key(), Some("luke-jr"));
        assert_eq!(c.author.email.as_deref(), Some("luke@dashjr.org"));
        assert_eq!(c.committer.login, None);
        assert_eq!(c.committer.key(), Some("Luke Dashjr"));
        assert_eq!(c.timestamp.to_rfc3339(), "2025-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_pull_request_normalization() {
        let items = vec![
            json!({
                "number": 31000,
                "user": {"login": "alice"},
                "state": "closed",
                "created_at": "2025-01-01T00:00:00Z",
                "closed_at": "2025-01-02T00:00:00Z",
                "merged_at": "2025-01-02T00:00:00Z",
                "merge_commit_sha": "m1",
                "author_association": "CONTRIBUTOR"
            }),
            json!({"number": 2, "state": "weird", "created_at": "2025-01-01T00:00:00Z"}),
        ];
        let (prs, skipped) = decode_each(items, pull_request);
        assert_eq!(skipped, 1);
        assert!(prs[0].is_merged());
        assert_eq!(prs[0].merged_by, None);
        assert_eq!(prs[0].stats, None);
        assert_eq!(prs[0].merge_commit_sha.as_deref(), Some("m1"));
    }

    #[test]
    fn test_first_response_skips_author() {
        let items = vec![
            json!({"user": {"login": "bob"}, "created_at": "2025-01-01T01:00:00Z"}),
            json!({"user": {"login": "carol"}, "created_at": "2025-01-02T00:00:00Z"}),
            json!({"user": {"login": "dave"}, "created_at": "2025-01-01T06:00:00Z"}),
            json!({"user": {"login": "erin"}}),
        ];
        let at = first_response_at(items, &Identity::login("bob"));
        assert_eq!(at.map(|t| t.to_rfc3339()), Some("2025-01-01T06:00:00+00:00".to_string()));

        let own = vec![json!({"user": {"login": "bob"}, "created_at": "2025-01-01T01:00:00Z"})];
        assert_eq!(first_response_at(own, &Identity::login("bob")), None);
    }

    #[test]
    fn test_issue_filters_pull_requests() {
        let base = json!({
            "number": 1,
            "user": {"login": "bob"},
            "state": "open",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-03T00:00:00Z",
            "comments": 2,
            "labels": [{"name": "Bug"}, {"name": "GUI"}]
        });
        let mut pr = base.clone();
        pr["pull_request"] = json!({"url": "x"});
        assert!(is_pull_request(&pr));
        assert!(!is_pull_request(&base));

        let (issues, skipped) = decode_each(vec![base, pr], issue);
        assert_eq!(issues.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(issues[0].labels, vec!["Bug".to_string(), "GUI".to_string()]);
    }

    #[test]
    fn test_contributor_and_run() {
        let (contributors, skipped) = decode_each(
            vec![json!({"login": "a", "contributions": 5}), json!({"contributions": 9, "type": "Anonymous"})],
            contributor,
        );
        assert_eq!(contributors.len(), 1);
        assert_eq!(skipped, 1);

        let (runs, _) = decode_each(
            vec![json!({
                "id": 7,
                "name": "CI",
                "event": "pull_request",
                "conclusion": "success",
                "head_branch": "feature",
                "created_at": "2025-01-01T00:00:00Z",
                "pull_requests": [{"number": 12}]
            })],
            workflow_run,
        );
        assert_eq!(runs[0].pull_requests, vec![12]);
    }

    #[test]
    fn test_repo_normalization() {
        let raw: RawRepo = serde_json::from_value(json!({
            "full_name": "bitcoinknots/bitcoin",
            "stargazers_count": 10,
            "fork": true,
            "parent": {"full_name": "bitcoin/bitcoin"}
        }))
        .unwrap();
        let info = repo(raw);
        assert!(info.is_fork);
        assert_eq!(info.parent.as_deref(), Some("bitcoin/bitcoin"));
        assert_eq!(info.stars, 10);
    }
}
