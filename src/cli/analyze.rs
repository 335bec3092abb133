//! analyze, compare, fight, snapshot and clean commands

use anyhow::{bail, Context, Result};
use chrono::Utc;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

use super::output::OutputOptions;
use super::Cli;
use crate::analysis::{AnalysisRequest, Analyzer, Sources};
use crate::cache::ResponseCache;
use crate::config::ProjectConfig;
use crate::git::{GitLocalSource, LocalRepository};
use crate::reporters::Report;
use crate::scoring::ScoringMode;
use crate::sources::github::GitHubClient;
use crate::sources::snapshot::{save_snapshot, SnapshotSource};
use crate::sources::{AnalysisWindow, ForgeSource};

/// Where forge data comes from for this run.
enum Forge {
    Live(GitHubClient),
    Offline(SnapshotSource),
}

impl Forge {
    fn from_cli(cli: &Cli, config: &ProjectConfig) -> Result<Self> {
        if !cli.snapshot.is_empty() {
            let mut source = SnapshotSource::new();
            for path in &cli.snapshot {
                let data = crate::sources::snapshot::load_snapshot(path)
                    .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
                source = source.with_repo(None, data);
            }
            info!("Using {} snapshot file(s)", cli.snapshot.len());
            return Ok(Forge::Offline(source));
        }
        Ok(Forge::Live(live_client(cli, config)))
    }

    fn sources(&self) -> Sources<'_> {
        match self {
            Forge::Live(client) => Sources {
                forge: client,
                local: Some(&GitLocalSource),
                merge_lookup: Some(client),
                reference: Some(client),
            },
            Forge::Offline(snapshots) => Sources {
                forge: snapshots,
                local: Some(&GitLocalSource),
                merge_lookup: Some(snapshots),
                reference: Some(snapshots),
            },
        }
    }
}

fn live_client(cli: &Cli, config: &ProjectConfig) -> GitHubClient {
    let client = GitHubClient::new(cli.token.clone())
        .with_base_url(cli.api_url.as_str())
        .with_cache(ResponseCache::from_config(&config.cache))
        .with_max_pages(config.analysis.max_pages)
        .with_review_sample_size(config.analysis.review_sample_size);
    if !client.is_authenticated() {
        eprintln!(
            "{} no GitHub token set; unauthenticated requests are limited to 60/hour (set GITHUB_TOKEN or --token)",
            style("warning:").yellow().bold()
        );
    }
    client
}

/// Create spinner progress style
fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(create_spinner_style());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}

pub(super) fn run_analyze(
    cli: &Cli,
    config: &ProjectConfig,
    out: &OutputOptions,
    repo: &str,
    local_path: Option<&Path>,
    fork_aware: bool,
) -> Result<()> {
    validate_slug(repo)?;
    check_local_path(local_path);
    let forge = Forge::from_cli(cli, config)?;
    let analyzer = Analyzer::new(config, forge.sources(), Utc::now());
    let mode = if fork_aware {
        ScoringMode::ForkAware
    } else {
        ScoringMode::Standard
    };
    let request = AnalysisRequest::new(repo).with_local_path(local_path).with_mode(mode);

    let start = Instant::now();
    let pb = spinner(format!("Analyzing {} ({} months)...", repo, config.analysis.months));
    let report = analyzer.analyze_repository(&request);
    pb.finish_and_clear();
    eprintln!(
        "{} {} analyzed in {:.1}s",
        style("✓").green(),
        repo,
        start.elapsed().as_secs_f64()
    );

    out.emit(&Report::from(report))
}

pub(super) fn run_compare(
    cli: &Cli,
    config: &ProjectConfig,
    out: &OutputOptions,
    first: (&str, Option<&Path>),
    second: (&str, Option<&Path>),
    fight: bool,
) -> Result<()> {
    validate_slug(first.0)?;
    validate_slug(second.0)?;
    if first.0.eq_ignore_ascii_case(second.0) {
        bail!("Cannot compare {} with itself", first.0);
    }
    check_local_path(first.1);
    check_local_path(second.1);
    let forge = Forge::from_cli(cli, config)?;
    let analyzer = Analyzer::new(config, forge.sources(), Utc::now());

    let start = Instant::now();
    let pb = spinner(format!(
        "{} {} vs {}...",
        if fight { "Fight:" } else { "Comparing" },
        first.0,
        second.0
    ));
    let comparison = analyzer.compare_repositories(
        &AnalysisRequest::new(first.0).with_local_path(first.1),
        &AnalysisRequest::new(second.0).with_local_path(second.1),
        fight,
    );
    pb.finish_and_clear();
    eprintln!(
        "{} compared in {:.1}s",
        style("✓").green(),
        start.elapsed().as_secs_f64()
    );

    out.emit(&Report::from(comparison))
}

pub(super) fn run_snapshot(cli: &Cli, config: &ProjectConfig, repo: &str, path: &Path) -> Result<()> {
    validate_slug(repo)?;
    let client = live_client(cli, config);
    let window = AnalysisWindow::months_back(Utc::now(), config.analysis.months);

    let pb = spinner(format!("Fetching {}...", repo));
    let data = client.fetch(repo, &window);
    pb.finish_and_clear();
    let data = data.with_context(|| format!("Failed to fetch {}", repo))?;

    save_snapshot(path, &data).with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!(
        "{} saved {} commits, {} PRs, {} issues to {}",
        style("✓").green(),
        data.commits.len(),
        data.pull_requests.len(),
        data.issues.len(),
        style(path.display()).cyan()
    );
    for failure in &data.failed_requests {
        eprintln!("{} {}", style("incomplete:").yellow(), failure);
    }
    Ok(())
}

pub(super) fn run_clean(config: &ProjectConfig) -> Result<()> {
    let mut cache_config = config.cache.clone();
    cache_config.enabled = true;
    let Some(cache) = ResponseCache::from_config(&cache_config) else {
        return Ok(());
    };
    let removed = cache
        .clear()
        .with_context(|| format!("Failed to clear {}", cache.dir().display()))?;
    eprintln!(
        "{} removed {} cached responses from {}",
        style("✓").green(),
        removed,
        cache.dir().display()
    );
    Ok(())
}

/// Warn early about a `--local-path` that is not a clone; the analysis
/// then runs without local data.
fn check_local_path(path: Option<&Path>) {
    if let Some(path) = path.filter(|p| !LocalRepository::is_git_repo(p)) {
        eprintln!(
            "{} {} is not a git repository; CI and test detection will be skipped",
            style("warning:").yellow().bold(),
            path.display()
        );
    }
}

/// Require an `owner/name` repository slug.
fn validate_slug(repo: &str) -> Result<()> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(()),
        _ => bail!("Invalid repository '{}': expected owner/name", repo),
    }
}
