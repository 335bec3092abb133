//! CI/CD presence, reliability and PR coverage

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;
use tracing::warn;

use crate::models::{round_to, LocalGitData, PullRequestRecord, WorkflowRunRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CiCdMetrics {
    pub has_data: bool,
    pub has_ci: bool,
    pub total_workflow_runs: usize,
    pub successful_workflow_runs: usize,
    pub workflow_success_rate: f64,
    pub workflows_per_day: f64,
    pub unique_workflows: usize,
    pub ci_config_count: usize,
    pub ci_systems: Vec<String>,
    /// Share of PRs with at least one associated workflow run.
    pub pr_ci_ratio: f64,
    pub pr_ci_required: bool,
    pub score: f64,
}

/// CI systems recognised from tracked configuration paths.
const CI_SYSTEMS: &[(&str, fn(&str) -> bool)] = &[
    ("GitHub Actions", |p| p.starts_with(".github/workflows/")),
    ("Travis CI", |p| p == ".travis.yml"),
    ("CircleCI", |p| p == ".circleci/config.yml"),
    ("GitLab CI", |p| p == ".gitlab-ci.yml"),
    ("Jenkins", |p| p == "Jenkinsfile"),
    ("Azure Pipelines", |p| p == "azure-pipelines.yml"),
    ("AppVeyor", |p| p == "appveyor.yml" || p == ".appveyor.yml"),
    ("Bitbucket Pipelines", |p| p == "bitbucket-pipelines.yml"),
    ("Cirrus CI", |p| p == ".cirrus.yml"),
];

/// Whether a tracked path is a CI configuration file.
pub fn is_ci_config(path: &str) -> bool {
    CI_SYSTEMS.iter().any(|(_, matches)| matches(path))
}

/// Names of the CI systems configured by the given paths, sorted.
pub fn detect_ci_systems<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut found = BTreeSet::new();
    for path in paths {
        for (name, matches) in CI_SYSTEMS {
            if matches(path) {
                found.insert(name.to_string());
            }
        }
    }
    found.into_iter().collect()
}

static PR_REF: OnceLock<Regex> = OnceLock::new();

fn pr_ref() -> &'static Regex {
    PR_REF.get_or_init(|| Regex::new(r"refs/pull/(\d+)").expect("valid PR ref regex"))
}

pub fn calculate(
    runs: &[WorkflowRunRecord],
    pull_requests: &[PullRequestRecord],
    local: Option<&LocalGitData>,
) -> CiCdMetrics {
    let config_files: &[String] = local.map(|l| l.ci_config_files.as_slice()).unwrap_or(&[]);
    let has_ci = !runs.is_empty() || !config_files.is_empty();
    if !has_ci {
        warn!("No CI/CD detected in the repository");
        // a local clone without CI files is an observed absence
        return CiCdMetrics {
            has_data: local.is_some(),
            ..Default::default()
        };
    }

    let total = runs.len();
    let successful = runs
        .iter()
        .filter(|r| r.conclusion.as_deref() == Some("success"))
        .count();
    let success_rate = if total > 0 {
        successful as f64 / total as f64
    } else {
        0.0
    };
    let names: HashSet<&str> = runs.iter().map(|r| r.name.as_str()).collect();
    let ci_systems = detect_ci_systems(config_files.iter().map(String::as_str));
    let (pr_ci_ratio, pr_ci_required) = pr_integration(runs, pull_requests);

    CiCdMetrics {
        has_data: true,
        has_ci,
        total_workflow_runs: total,
        successful_workflow_runs: successful,
        workflow_success_rate: round_to(success_rate, 3),
        workflows_per_day: round_to(workflows_per_day(runs), 2),
        unique_workflows: names.len(),
        ci_config_count: config_files.len(),
        ci_systems,
        pr_ci_ratio: round_to(pr_ci_ratio, 3),
        pr_ci_required,
        score: round_to(5.0 + success_rate * 5.0, 1),
    }
}

/// A single run counts as one per day.
fn workflows_per_day(runs: &[WorkflowRunRecord]) -> f64 {
    if runs.len() < 2 {
        return runs.len() as f64;
    }
    let first = runs.iter().map(|r| r.created_at).min();
    let last = runs.iter().map(|r| r.created_at).max();
    match (first, last) {
        (Some(f), Some(l)) => runs.len() as f64 / ((l - f).num_days() + 1) as f64,
        _ => 0.0,
    }
}

/// PR runs are matched via `refs/pull/<n>` heads or the forge's own PR links.
fn pr_integration(runs: &[WorkflowRunRecord], pull_requests: &[PullRequestRecord]) -> (f64, bool) {
    if runs.is_empty() || pull_requests.is_empty() {
        return (0.0, false);
    }
    let mut covered: HashSet<u64> = HashSet::new();
    for run in runs.iter().filter(|r| r.event == "pull_request") {
        covered.extend(run.pull_requests.iter().copied());
        if let Some(caps) = run.head_branch.as_deref().and_then(|b| pr_ref().captures(b)) {
            if let Ok(n) = caps[1].parse::<u64>() {
                covered.insert(n);
            }
        }
    }
    let with_ci = pull_requests.iter().filter(|p| covered.contains(&p.number)).count();
    (with_ci as f64 / pull_requests.len() as f64, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn run(id: u64, name: &str, conclusion: &str, day: i64) -> WorkflowRunRecord {
        WorkflowRunRecord {
            id,
            name: name.into(),
            event: "push".into(),
            conclusion: Some(conclusion.into()),
            head_branch: Some("master".into()),
            created_at: Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap() + Duration::days(day),
            pull_requests: vec![],
        }
    }

    fn pr(number: u64) -> PullRequestRecord {
        PullRequestRecord {
            number,
            created_at: Utc::now(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_ci_scores_zero() {
        let metrics = calculate(&[], &[], None);
        assert!(!metrics.has_ci);
        assert!(!metrics.has_data);
        assert_eq!(metrics.score, 0.0);

        let local = LocalGitData::default();
        let metrics = calculate(&[], &[], Some(&local));
        assert!(metrics.has_data);
        assert_eq!(metrics.score, 0.0);
    }

    #[test]
    fn test_config_only_ci() {
        let local = LocalGitData {
            ci_config_files: vec![".cirrus.yml".into(), ".github/workflows/ci.yml".into()],
            ..Default::default()
        };
        let metrics = calculate(&[], &[], Some(&local));
        assert!(metrics.has_ci);
        assert_eq!(metrics.ci_systems, vec!["Cirrus CI".to_string(), "GitHub Actions".to_string()]);
        assert_eq!(metrics.score, 5.0);
    }

    #[test]
    fn test_workflow_runs() {
        let runs = vec![
            run(1, "CI", "success", 0),
            run(2, "CI", "failure", 1),
            run(3, "Lint", "success", 3),
            run(4, "CI", "success", 3),
        ];
        let metrics = calculate(&runs, &[], None);
        assert_eq!(metrics.total_workflow_runs, 4);
        assert_eq!(metrics.workflow_success_rate, 0.75);
        assert_eq!(metrics.workflows_per_day, 1.0);
        assert_eq!(metrics.unique_workflows, 2);
        assert_eq!(metrics.score, round_to(5.0 + 0.75 * 5.0, 1));
    }

    #[test]
    fn test_pr_ci_ratio() {
        let mut by_ref = run(1, "CI", "success", 0);
        by_ref.event = "pull_request".into();
        by_ref.head_branch = Some("refs/pull/7/merge".into());
        let mut by_link = run(2, "CI", "success", 0);
        by_link.event = "pull_request".into();
        by_link.pull_requests = vec![9];
        let mut push = run(3, "CI", "success", 0);
        push.pull_requests = vec![10];

        let prs = vec![pr(7), pr(9), pr(10), pr(11)];
        let metrics = calculate(&[by_ref, by_link, push], &prs, None);
        assert_eq!(metrics.pr_ci_ratio, 0.5);
        assert!(metrics.pr_ci_required);
    }

    #[test]
    fn test_is_ci_config() {
        assert!(is_ci_config(".github/workflows/ci.yml"));
        assert!(is_ci_config("Jenkinsfile"));
        assert!(!is_ci_config("src/Jenkinsfile"));
    }
}
