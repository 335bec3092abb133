//! GitHub REST v3 client
//!
//! Sync HTTP via ureq, with page-number pagination, rate-limit tracking
//! from the `X-RateLimit-*` headers and an optional on-disk response cache.
//! Only the first `review_sample_size` pull requests of a window get their
//! reviews and review comments fetched, and only that many commented issues
//! get their first response time.

mod raw;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AnalysisWindow, ForgeSource, MergeCommitIdentities, MergeCommitLookup, ReferenceCommitSource};
use crate::cache::ResponseCache;
use crate::error::{SourceError, SourceResult};
use crate::models::{ForgeData, IssueRecord, PullRequestRecord, ReviewSample, SkippedRecords};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: usize = 100;
const DEFAULT_MAX_PAGES: usize = 30;
const DEFAULT_REVIEW_SAMPLE_SIZE: usize = 10;
const USER_AGENT: &str = concat!("repo-health/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Default, Clone, Copy)]
struct RateLimit {
    remaining: Option<u64>,
    /// Unix seconds
    reset: Option<i64>,
}

/// How long to wait before the next request, if at all.
fn rate_limit_wait(remaining: Option<u64>, reset: Option<i64>, now: i64) -> Option<Duration> {
    match (remaining, reset) {
        (Some(r), Some(reset)) if r <= 1 && reset > now => {
            Some(Duration::from_secs((reset - now) as u64 + 1))
        }
        _ => None,
    }
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn make_agent() -> ureq::Agent {
    ureq::config::Config::builder()
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(30)))
        .build()
        .new_agent()
}

/// GitHub API client
pub struct GitHubClient {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
    cache: Option<ResponseCache>,
    max_pages: usize,
    review_sample_size: usize,
    rate: Mutex<RateLimit>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Self {
        Self {
            agent: make_agent(),
            base_url: DEFAULT_API_URL.to_string(),
            token: token.filter(|t| !t.is_empty()),
            cache: None,
            max_pages: DEFAULT_MAX_PAGES,
            review_sample_size: DEFAULT_REVIEW_SAMPLE_SIZE,
            rate: Mutex::new(RateLimit::default()),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_cache(mut self, cache: Option<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_review_sample_size(mut self, n: usize) -> Self {
        self.review_sample_size = n;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn cache_key(url: &str, query: &[(&str, String)]) -> String {
        let mut key = url.to_string();
        for (k, v) in query {
            key.push_str(&format!("&{}={}", k, v));
        }
        key
    }

    fn wait_for_rate_limit(&self) {
        let state = match self.rate.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        if let Some(wait) = rate_limit_wait(state.remaining, state.reset, Utc::now().timestamp()) {
            warn!(
                "Rate limit nearly exhausted, waiting {}s before the next request",
                wait.as_secs()
            );
            std::thread::sleep(wait);
        }
    }

    fn record_rate_limit(&self, remaining: Option<u64>, reset: Option<i64>) {
        if remaining.is_none() {
            return;
        }
        debug!("Rate limit: {:?} remaining, resets at {:?}", remaining, reset);
        let mut guard = match self.rate.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = RateLimit { remaining, reset };
    }

    /// GET a JSON document, consulting the cache first.
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> SourceResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let key = Self::cache_key(&url, query);

        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get::<Value>(&key)) {
            return Ok(cached);
        }

        self.wait_for_rate_limit();
        debug!("GET {} {:?}", url, query);

        let mut req = self
            .agent
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            req = req.header("Authorization", &format!("Bearer {}", token));
        }
        for (k, v) in query {
            req = req.query(*k, v);
        }

        let response = req.call()?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let remaining = header("x-ratelimit-remaining").and_then(|v| v.parse::<u64>().ok());
        let reset = header("x-ratelimit-reset").and_then(|v| v.parse::<i64>().ok());
        self.record_rate_limit(remaining, reset);

        let status = response.status().as_u16();
        if status == 404 || status == 422 {
            return Err(SourceError::NotFound(url));
        }
        if (status == 403 || status == 429) && remaining == Some(0) {
            let reset_at = reset
                .and_then(|r| DateTime::<Utc>::from_timestamp(r, 0))
                .map(iso)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(SourceError::RateLimited { reset_at });
        }
        if status >= 400 {
            let message = response.into_body().read_to_string().unwrap_or_default();
            return Err(SourceError::Http {
                status,
                url,
                message,
            });
        }

        let data: Value = response.into_body().read_json()?;
        if let Some(cache) = &self.cache {
            cache.put(&key, &data);
        }
        Ok(data)
    }

    /// Fetch every page of a list endpoint.
    ///
    /// `field` names the array inside an object response (e.g. `workflow_runs`).
    /// A failure on the first page is an error; a later failure keeps what was
    /// already fetched.
    fn paginate(&self, path: &str, query: &[(&str, String)], field: Option<&str>) -> SourceResult<Vec<Value>> {
        let mut items = Vec::new();
        for page in 1..=self.max_pages {
            let mut q: Vec<(&str, String)> = query.to_vec();
            q.push(("per_page", PER_PAGE.to_string()));
            q.push(("page", page.to_string()));

            let body = match self.get_json(path, &q) {
                Ok(body) => body,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!("Stopping pagination of {} at page {}: {}", path, page, e);
                    break;
                }
            };
            let batch = match (field, body) {
                (None, Value::Array(batch)) => batch,
                (Some(f), Value::Object(mut obj)) => match obj.remove(f) {
                    Some(Value::Array(batch)) => batch,
                    _ => Vec::new(),
                },
                _ => {
                    warn!("Unexpected response shape for {} page {}", path, page);
                    break;
                }
            };
            let n = batch.len();
            items.extend(batch);
            if n < PER_PAGE {
                debug!("Last page for {} reached at page {}", path, page);
                return Ok(items);
            }
        }
        warn!("Reached page limit ({}) for {}", self.max_pages, path);
        Ok(items)
    }

    fn review_samples(&self, repo: &str, prs: &[PullRequestRecord], failures: &mut Vec<String>) -> Vec<ReviewSample> {
        prs.iter()
            .take(self.review_sample_size)
            .map(|pr| {
                let mut sample = ReviewSample {
                    pr_number: pr.number,
                    ..Default::default()
                };
                match self.paginate(&format!("/repos/{}/pulls/{}/reviews", repo, pr.number), &[], None) {
                    Ok(items) => sample.reviews = raw::decode_each(items, raw::review).0,
                    Err(e) => {
                        warn!("Failed to get reviews for PR #{}: {}", pr.number, e);
                        failures.push(format!("reviews #{}", pr.number));
                    }
                }
                match self.paginate(&format!("/repos/{}/pulls/{}/comments", repo, pr.number), &[], None) {
                    Ok(items) => sample.comments = raw::decode_each(items, raw::comment).0,
                    Err(e) => {
                        warn!("Failed to get comments for PR #{}: {}", pr.number, e);
                        failures.push(format!("comments #{}", pr.number));
                    }
                }
                sample
            })
            .collect()
    }

    /// First-response times for the first `review_sample_size` commented
    /// issues. The rest keep the `updated_at` approximation.
    fn issue_first_responses(&self, repo: &str, issues: &mut [IssueRecord], failures: &mut Vec<String>) {
        for issue in issues.iter_mut().filter(|i| i.comments > 0).take(self.review_sample_size) {
            let path = format!("/repos/{}/issues/{}/comments", repo, issue.number);
            match self.get_json(&path, &[("per_page", PER_PAGE.to_string())]) {
                Ok(Value::Array(items)) => issue.first_response_at = raw::first_response_at(items, &issue.author),
                Ok(_) => warn!("Unexpected response shape for {}", path),
                Err(e) => {
                    warn!("Failed to get comments for issue #{}: {}", issue.number, e);
                    failures.push(format!("issue comments #{}", issue.number));
                }
            }
        }
    }
}

impl ForgeSource for GitHubClient {
    /// Repository info is required; every other endpoint degrades to empty.
    fn fetch(&self, repo: &str, window: &AnalysisWindow) -> SourceResult<ForgeData> {
        info!("Fetching {} since {}", repo, iso(window.since));
        let repo_raw = serde_json::from_value(self.get_json(&format!("/repos/{}", repo), &[])?)?;

        let mut data = ForgeData {
            repo: raw::repo(repo_raw),
            ..Default::default()
        };
        let mut skipped = SkippedRecords::default();
        let mut failures: Vec<String> = Vec::new();

        let mut list = |name: &str, path: String, query: Vec<(&str, String)>, field: Option<&str>| -> Vec<Value> {
            match self.paginate(&path, &query, field) {
                Ok(items) => items,
                Err(e) => {
                    warn!("Failed to get {} for {}: {}", name, repo, e);
                    failures.push(name.to_string());
                    Vec::new()
                }
            }
        };

        let since = iso(window.since);
        let until = iso(window.until);

        let contributors = list("contributors", format!("/repos/{}/contributors", repo), vec![], None);
        let commits = list(
            "commits",
            format!("/repos/{}/commits", repo),
            vec![("since", since.clone()), ("until", until)],
            None,
        );
        let pulls = list(
            "pull_requests",
            format!("/repos/{}/pulls", repo),
            vec![
                ("state", "all".to_string()),
                ("sort", "created".to_string()),
                ("direction", "desc".to_string()),
            ],
            None,
        );
        let issues = list(
            "issues",
            format!("/repos/{}/issues", repo),
            vec![("state", "all".to_string()), ("since", since)],
            None,
        );
        let runs = list(
            "workflow_runs",
            format!("/repos/{}/actions/runs", repo),
            vec![("created", format!(">={}", window.since.format("%Y-%m-%d")))],
            Some("workflow_runs"),
        );

        data.contributors = raw::decode_each(contributors, raw::contributor).0;

        let (commits, n) = raw::decode_each(commits, raw::commit);
        data.commits = commits;
        skipped.commits = n;

        // the pulls endpoint has no `since`; filter client-side
        let (pulls, n) = raw::decode_each(pulls, raw::pull_request);
        data.pull_requests = pulls
            .into_iter()
            .filter(|pr| window.contains(pr.created_at))
            .collect();
        skipped.pull_requests = n;

        let issues: Vec<Value> = issues.into_iter().filter(|i| !raw::is_pull_request(i)).collect();
        let (issues, n) = raw::decode_each(issues, raw::issue);
        data.issues = issues;
        skipped.issues = n;
        self.issue_first_responses(repo, &mut data.issues, &mut failures);

        let (runs, n) = raw::decode_each(runs, raw::workflow_run);
        data.workflow_runs = runs;
        skipped.workflow_runs = n;

        data.review_samples = self.review_samples(repo, &data.pull_requests, &mut failures);
        data.skipped = skipped;
        data.failed_requests = failures;

        info!(
            "Fetched {}: {} commits, {} PRs, {} issues, {} workflow runs ({} records skipped)",
            repo,
            data.commits.len(),
            data.pull_requests.len(),
            data.issues.len(),
            data.workflow_runs.len(),
            data.skipped.total()
        );
        Ok(data)
    }
}

impl ReferenceCommitSource for GitHubClient {
    fn reference_shas(&self, repo: &str, window: &AnalysisWindow) -> SourceResult<HashSet<String>> {
        let items = self.paginate(
            &format!("/repos/{}/commits", repo),
            &[("since", iso(window.since)), ("until", iso(window.until))],
            None,
        )?;
        let shas: HashSet<String> = items.iter().filter_map(raw::commit_sha).collect();
        debug!("Reference set for {}: {} commits", repo, shas.len());
        Ok(shas)
    }
}

impl MergeCommitLookup for GitHubClient {
    fn merge_commit(&self, repo: &str, sha: &str) -> SourceResult<Option<MergeCommitIdentities>> {
        match self.get_json(&format!("/repos/{}/commits/{}", repo, sha), &[]) {
            Ok(body) => Ok(Some(raw::merge_identities(serde_json::from_value(body)?))),
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
