//! Fork-origin classification of commits
//!
//! Decides whether a commit in a downstream fork was introduced by the fork
//! itself or arrived from upstream through a merge, rebase or cherry-pick.
//!
//! Rules, first match wins:
//!
//! 1. The analyzed repository is the upstream (or stands alone): ORIGINAL,
//!    unless the message shows it pulling from yet another remote.
//! 2. The upstream reference set contains the exact SHA: UPSTREAM_MERGED.
//! 3. The message matches a known upstream-merge phrasing: UPSTREAM_MERGED.
//! 4. Otherwise ORIGINAL.
//!
//! # Known limitation
//!
//! Rule 2 only catches commit objects copied byte-for-byte. A commit that
//! rebases or cherry-picks upstream content under a rewritten message
//! changes its SHA and misses every phrasing in rule 3, so it is classified
//! ORIGINAL. There is no patch-id matching.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::models::CommitRecord;

/// Label assigned to each commit of an analyzed repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationLabel {
    Original,
    UpstreamMerged,
}

/// Role of the analyzed repository in a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryRole {
    Upstream,
    Fork,
    #[default]
    Standalone,
}

impl std::fmt::Display for RepositoryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryRole::Upstream => write!(f, "upstream"),
            RepositoryRole::Fork => write!(f, "fork"),
            RepositoryRole::Standalone => write!(f, "standalone"),
        }
    }
}

/// Upstream SHAs observed over the analysis window.
pub type ReferenceCommitSet = HashSet<String>;

/// Everything the classifier needs besides the commit itself.
#[derive(Debug, Clone, Copy)]
pub struct ForkContext<'a> {
    pub role: RepositoryRole,
    /// Slug of the analyzed repository, e.g. `bitcoinknots/bitcoin`.
    pub repo_slug: &'a str,
    /// Slug of the declared upstream, e.g. `bitcoin/bitcoin`.
    pub upstream_slug: &'a str,
    pub reference: Option<&'a ReferenceCommitSet>,
}

impl<'a> ForkContext<'a> {
    pub fn upstream(repo_slug: &'a str) -> Self {
        Self {
            role: RepositoryRole::Upstream,
            repo_slug,
            upstream_slug: repo_slug,
            reference: None,
        }
    }

    pub fn fork(
        repo_slug: &'a str,
        upstream_slug: &'a str,
        reference: Option<&'a ReferenceCommitSet>,
    ) -> Self {
        Self {
            role: RepositoryRole::Fork,
            repo_slug,
            upstream_slug,
            reference,
        }
    }

    pub fn standalone(repo_slug: &'a str) -> Self {
        Self {
            role: RepositoryRole::Standalone,
            repo_slug,
            upstream_slug: repo_slug,
            reference: None,
        }
    }
}

static REMOTE_TRACKING_DEFAULT: OnceLock<Regex> = OnceLock::new();
static REMOTE_TRACKING_ANY: OnceLock<Regex> = OnceLock::new();
static SYNC_UPSTREAM: OnceLock<Regex> = OnceLock::new();
static MERGE_BRANCH_OF: OnceLock<Regex> = OnceLock::new();

fn remote_tracking_default() -> &'static Regex {
    REMOTE_TRACKING_DEFAULT.get_or_init(|| {
        Regex::new(r"(?i)merge remote-tracking branch '[^'/]+/(master|main)'")
            .expect("valid remote-tracking regex")
    })
}

fn remote_tracking_any() -> &'static Regex {
    REMOTE_TRACKING_ANY.get_or_init(|| {
        Regex::new(r"(?i)merge remote-tracking branch '([^'/]+)/[^']*'")
            .expect("valid remote-tracking regex")
    })
}

fn sync_upstream() -> &'static Regex {
    SYNC_UPSTREAM.get_or_init(|| {
        Regex::new(r"(?i)\b(sync(ed|ing)? (with )?upstream|merge upstream)\b")
            .expect("valid sync regex")
    })
}

fn merge_branch_of() -> &'static Regex {
    MERGE_BRANCH_OF.get_or_init(|| {
        Regex::new(r"(?i)merge branch '[^']*' of (\S+) into")
            .expect("valid merge-branch regex")
    })
}

/// Commit classifier. Holds the per-upstream compiled patterns.
#[derive(Debug, Clone)]
pub struct ForkClassifier {
    upstream_pr_merge: Regex,
    upstream_pr_from: Regex,
    extra_patterns: Vec<Regex>,
}

impl ForkClassifier {
    pub fn new(upstream_slug: &str) -> Self {
        let slug = regex::escape(upstream_slug);
        let owner = regex::escape(upstream_slug.split('/').next().unwrap_or(upstream_slug));
        // Both are built from escaped input so compilation cannot fail.
        let upstream_pr_merge = Regex::new(&format!(r"(?i)\bmerge {slug}#\d+"))
            .unwrap_or_else(|_| never_matches());
        let upstream_pr_from = Regex::new(&format!(r"(?i)merge pull request #\d+ from {owner}/"))
            .unwrap_or_else(|_| never_matches());
        Self {
            upstream_pr_merge,
            upstream_pr_from,
            extra_patterns: Vec::new(),
        }
    }

    /// Add user-configured phrasings that also mean "came from upstream".
    pub fn with_extra_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.extra_patterns = patterns;
        self
    }

    pub fn classify(&self, commit: &CommitRecord, ctx: &ForkContext<'_>) -> ClassificationLabel {
        match ctx.role {
            RepositoryRole::Upstream | RepositoryRole::Standalone => {
                if is_foreign_remote_merge(&commit.message, ctx.repo_slug) {
                    ClassificationLabel::UpstreamMerged
                } else {
                    ClassificationLabel::Original
                }
            }
            RepositoryRole::Fork => {
                if ctx.reference.is_some_and(|set| set.contains(&commit.sha)) {
                    return ClassificationLabel::UpstreamMerged;
                }
                if self.matches_upstream_phrasing(&commit.message, ctx.upstream_slug) {
                    ClassificationLabel::UpstreamMerged
                } else {
                    ClassificationLabel::Original
                }
            }
        }
    }

    /// Classify a whole commit list, preserving order.
    pub fn classify_all<'c>(
        &self,
        commits: &'c [CommitRecord],
        ctx: &ForkContext<'_>,
    ) -> Vec<(&'c CommitRecord, ClassificationLabel)> {
        commits.iter().map(|c| (c, self.classify(c, ctx))).collect()
    }

    fn matches_upstream_phrasing(&self, message: &str, upstream_slug: &str) -> bool {
        if self.upstream_pr_merge.is_match(message)
            || self.upstream_pr_from.is_match(message)
            || remote_tracking_default().is_match(message)
            || sync_upstream().is_match(message)
        {
            return true;
        }
        if let Some(caps) = merge_branch_of().captures(message) {
            let source = caps[1].to_lowercase();
            if source.contains(&upstream_slug.to_lowercase()) || source.contains("upstream") {
                return true;
            }
        }
        self.extra_patterns.iter().any(|re| re.is_match(message))
    }
}

/// The upstream itself pulling from some other remote.
fn is_foreign_remote_merge(message: &str, own_slug: &str) -> bool {
    if let Some(caps) = remote_tracking_any().captures(message) {
        return !caps[1].eq_ignore_ascii_case("origin");
    }
    if let Some(caps) = merge_branch_of().captures(message) {
        let source = caps[1].to_lowercase();
        return !source.contains(&own_slug.to_lowercase());
    }
    false
}

fn never_matches() -> Regex {
    Regex::new(r"[^\s\S]").expect("valid empty regex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, BITCOIN_CORE, BITCOIN_KNOTS};
    use chrono::Utc;

    fn commit(sha: &str, message: &str) -> CommitRecord {
        CommitRecord {
            sha: sha.into(),
            author: Identity::login("dev"),
            committer: Identity::login("dev"),
            message: message.into(),
            timestamp: Utc::now(),
            stats: None,
        }
    }

    fn reference(shas: &[&str]) -> ReferenceCommitSet {
        shas.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reference_sha_wins_over_message() {
        let classifier = ForkClassifier::new(BITCOIN_CORE);
        let set = reference(&["abc"]);
        let ctx = ForkContext::fork(BITCOIN_KNOTS, BITCOIN_CORE, Some(&set));
        let label = classifier.classify(&commit("abc", "Add new RPC command"), &ctx);
        assert_eq!(label, ClassificationLabel::UpstreamMerged);
    }

    #[test]
    fn test_remote_tracking_merge_is_upstream() {
        let classifier = ForkClassifier::new(BITCOIN_CORE);
        let set = reference(&[]);
        let ctx = ForkContext::fork(BITCOIN_KNOTS, BITCOIN_CORE, Some(&set));
        let c = commit("zzz", "Merge remote-tracking branch 'upstream/master' into feature");
        assert_eq!(classifier.classify(&c, &ctx), ClassificationLabel::UpstreamMerged);
    }

    #[test]
    fn test_plain_commit_is_original() {
        let classifier = ForkClassifier::new(BITCOIN_CORE);
        let ctx = ForkContext::fork(BITCOIN_KNOTS, BITCOIN_CORE, None);
        let c = commit("zzz", "Add new RPC command");
        assert_eq!(classifier.classify(&c, &ctx), ClassificationLabel::Original);
    }

    #[test]
    fn test_message_phrasings() {
        let classifier = ForkClassifier::new(BITCOIN_CORE);
        let ctx = ForkContext::fork(BITCOIN_KNOTS, BITCOIN_CORE, None);
        let upstream = [
            "Merge bitcoin/bitcoin#123",
            "merge BITCOIN/BITCOIN#31415: wallet: drop legacy",
            "Merge pull request #99 from bitcoin/master",
            "Merge remote-tracking branch 'core/main'",
            "Sync with upstream",
            "Merge branch 'master' of https://github.com/bitcoin/bitcoin into knots",
            "Merge branch 'v27' of git://upstream.example/bitcoin.git into 27.x-knots",
        ];
        for msg in upstream {
            assert_eq!(
                classifier.classify(&commit("x", msg), &ctx),
                ClassificationLabel::UpstreamMerged,
                "{msg}"
            );
        }
        let original = [
            "wallet: fix rescan bug",
            "Merge remote-tracking branch 'luke/feature-x'",
            "Merge branch 'policy' of https://github.com/luke-jr/bitcoin into knots",
            "Merge bitcoinknots/bitcoin#12",
        ];
        for msg in original {
            assert_eq!(
                classifier.classify(&commit("x", msg), &ctx),
                ClassificationLabel::Original,
                "{msg}"
            );
        }
    }

    #[test]
    fn test_upstream_role_is_original_except_foreign_merges() {
        let classifier = ForkClassifier::new(BITCOIN_CORE);
        let ctx = ForkContext::upstream(BITCOIN_CORE);
        let c = commit("a", "Merge bitcoin/bitcoin#123: net: tidy");
        assert_eq!(classifier.classify(&c, &ctx), ClassificationLabel::Original);
        let c = commit("b", "Merge remote-tracking branch 'origin/master'");
        assert_eq!(classifier.classify(&c, &ctx), ClassificationLabel::Original);
        let c = commit("c", "Merge remote-tracking branch 'secp256k1/master'");
        assert_eq!(classifier.classify(&c, &ctx), ClassificationLabel::UpstreamMerged);
    }

    #[test]
    fn test_extra_patterns() {
        let classifier = ForkClassifier::new(BITCOIN_CORE)
            .with_extra_patterns(vec![Regex::new(r"(?i)^backport").unwrap()]);
        let ctx = ForkContext::fork(BITCOIN_KNOTS, BITCOIN_CORE, None);
        let c = commit("a", "Backport: validation fix");
        assert_eq!(classifier.classify(&c, &ctx), ClassificationLabel::UpstreamMerged);
    }

    #[test]
    fn test_rebased_upstream_commit_is_a_false_negative() {
        let classifier = ForkClassifier::new(BITCOIN_CORE);
        let empty = ReferenceCommitSet::new();
        let ctx = ForkContext::fork(BITCOIN_KNOTS, BITCOIN_CORE, Some(&empty));
        let c = commit("rewritten", "validation: cache block index lookups");
        assert_eq!(classifier.classify(&c, &ctx), ClassificationLabel::Original);
    }
}
