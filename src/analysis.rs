//! Repository analysis pipeline
//!
//! Orchestrates one analysis from sources to score:
//! 1. Fetch forge data (a failure leaves every forge category empty)
//! 2. Read the local clone, when a path is given
//! 3. Classify commits by origin and aggregate per author
//! 4. Run the seven category calculators
//! 5. Score with the requested weight table
//!
//! Collaborator failures never abort the run. They are logged and recorded
//! in [`DataQuality`] so a report always comes out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::compare::{compare_reports, ComparisonReport};
use crate::config::{ProjectConfig, RepositoriesConfig};
use crate::fork::{aggregate, ForkAttribution, ForkClassifier, ForkContext, ReferenceCommitSet, RepositoryRole};
use crate::metrics::{self, CategoryMetrics};
use crate::models::{ForgeData, LocalGitData, SkippedRecords};
use crate::scoring::{HealthBreakdown, HealthScorer, ScoringMode};
use crate::sources::{AnalysisWindow, ForgeSource, LocalSource, MergeCommitLookup, ReferenceCommitSource};

/// Collaborators an analysis reads from.
///
/// Only the forge is required. Without a merge lookup, self-merges are
/// detected from `merged_by` alone; without a reference source, fork
/// commits are classified from their messages.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub forge: &'a dyn ForgeSource,
    pub local: Option<&'a dyn LocalSource>,
    pub merge_lookup: Option<&'a dyn MergeCommitLookup>,
    pub reference: Option<&'a dyn ReferenceCommitSource>,
}

impl<'a> Sources<'a> {
    pub fn forge_only(forge: &'a dyn ForgeSource) -> Self {
        Self {
            forge,
            local: None,
            merge_lookup: None,
            reference: None,
        }
    }
}

/// One repository to analyze.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    /// `owner/name` slug
    pub repo: &'a str,
    pub local_path: Option<&'a Path>,
    pub mode: ScoringMode,
}

impl<'a> AnalysisRequest<'a> {
    pub fn new(repo: &'a str) -> Self {
        Self {
            repo,
            local_path: None,
            mode: ScoringMode::Standard,
        }
    }

    pub fn with_local_path(mut self, path: Option<&'a Path>) -> Self {
        self.local_path = path;
        self
    }

    pub fn with_mode(mut self, mode: ScoringMode) -> Self {
        self.mode = mode;
        self
    }
}

/// What went missing or wrong while gathering data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataQuality {
    /// Raw records dropped by the normalizer
    pub skipped: SkippedRecords,
    /// Sources or endpoints that failed, with the error
    pub failed_sources: Vec<String>,
    /// Commits with no usable author identity
    pub dropped_identities: usize,
    pub self_merge_lookups: usize,
    pub self_merge_lookup_failures: usize,
    /// Merged PRs not checked for self-merge once the lookup cap was hit
    pub self_merge_unchecked: usize,
    /// Size of the upstream SHA set used for classification
    pub reference_commits: Option<usize>,
}

impl DataQuality {
    pub fn is_clean(&self) -> bool {
        self.skipped.total() == 0
            && self.failed_sources.is_empty()
            && self.dropped_identities == 0
            && self.self_merge_lookup_failures == 0
            && self.self_merge_unchecked == 0
    }

    fn record_failure(&mut self, source: &str, err: impl std::fmt::Display) {
        warn!("{} unavailable: {}", source, err);
        self.failed_sources.push(format!("{}: {}", source, err));
    }
}

/// Descriptive facts about the analyzed repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryMetadata {
    pub name: String,
    pub role: RepositoryRole,
    pub period_months: u32,
    pub analysis_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub default_branch: Option<String>,
    pub language: Option<String>,
    pub has_local_clone: bool,
}

/// Complete analysis of one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisReport {
    pub repository: RepositoryMetadata,
    pub metrics: CategoryMetrics,
    /// Origin split of the commits, present for forks
    pub fork: Option<ForkAttribution>,
    pub health: HealthBreakdown,
    pub data_quality: DataQuality,
}

impl AnalysisReport {
    pub fn overall_score(&self) -> f64 {
        self.health.overall_score
    }
}

/// Role of `repo` according to the configured upstream/fork pair.
pub fn role_of(repo: &str, repositories: &RepositoriesConfig) -> RepositoryRole {
    if repo.eq_ignore_ascii_case(&repositories.upstream) {
        RepositoryRole::Upstream
    } else if repo.eq_ignore_ascii_case(&repositories.fork) {
        RepositoryRole::Fork
    } else {
        RepositoryRole::Standalone
    }
}

/// Runs analyses against one set of sources and one configuration.
pub struct Analyzer<'a> {
    config: &'a ProjectConfig,
    sources: Sources<'a>,
    classifier: ForkClassifier,
    now: DateTime<Utc>,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: &'a ProjectConfig, sources: Sources<'a>, now: DateTime<Utc>) -> Self {
        let classifier = ForkClassifier::new(&config.repositories.upstream)
            .with_extra_patterns(config.classifier.compiled_patterns());
        Self {
            config,
            sources,
            classifier,
            now,
        }
    }

    pub fn window(&self) -> AnalysisWindow {
        AnalysisWindow::months_back(self.now, self.config.analysis.months)
    }

    /// Analyze one repository.
    ///
    /// A fork fetches the upstream SHA set itself; use
    /// [`Analyzer::compare_repositories`] to share one set across a pair.
    pub fn analyze_repository(&self, request: &AnalysisRequest<'_>) -> AnalysisReport {
        let mut quality = DataQuality::default();
        let role = role_of(request.repo, &self.config.repositories);
        let reference = if role == RepositoryRole::Fork {
            self.fetch_reference(&mut quality)
        } else {
            None
        };
        self.analyze_with(request, reference.as_ref(), quality)
    }

    /// Analyze two repositories side by side.
    ///
    /// When either side is the fork, the upstream SHA set is fetched once and
    /// shared, whatever the argument order. In fight mode both are scored
    /// with the fork-aware weights, and the fork's contributor score uses its
    /// original-only bus factor.
    pub fn compare_repositories(
        &self,
        first: &AnalysisRequest<'_>,
        second: &AnalysisRequest<'_>,
        fight: bool,
    ) -> ComparisonReport {
        let repositories = &self.config.repositories;
        let roles = (role_of(first.repo, repositories), role_of(second.repo, repositories));
        let has_fork = roles.0 == RepositoryRole::Fork || roles.1 == RepositoryRole::Fork;
        info!(
            "Comparing {} vs {}{}",
            first.repo,
            second.repo,
            if fight { " (fight mode)" } else { "" }
        );

        let mut reference_quality = DataQuality::default();
        let reference = if has_fork {
            self.fetch_reference(&mut reference_quality)
        } else {
            None
        };

        let mode = if fight {
            ScoringMode::ForkAware
        } else {
            ScoringMode::Standard
        };
        let first = first.with_mode(mode);
        let second = second.with_mode(mode);
        // a reference failure belongs to the fork's report
        let seed = |role: RepositoryRole| {
            if role == RepositoryRole::Fork {
                reference_quality.clone()
            } else {
                DataQuality::default()
            }
        };
        let (quality1, quality2) = (seed(roles.0), seed(roles.1));

        let (report1, report2) = rayon::join(
            || self.analyze_with(&first, reference.as_ref(), quality1),
            || self.analyze_with(&second, reference.as_ref(), quality2),
        );

        compare_reports(report1, report2, fight)
    }

    /// Upstream SHAs over the window. A failure degrades classification to
    /// message heuristics and is recorded.
    fn fetch_reference(&self, quality: &mut DataQuality) -> Option<ReferenceCommitSet> {
        let source = self.sources.reference?;
        let upstream = &self.config.repositories.upstream;
        match source.reference_shas(upstream, &self.window()) {
            Ok(set) => {
                info!("Fetched {} reference commits from {}", set.len(), upstream);
                Some(set)
            }
            Err(e) => {
                quality.record_failure(&format!("reference commits ({})", upstream), e);
                Some(ReferenceCommitSet::new())
            }
        }
    }

    fn analyze_with(
        &self,
        request: &AnalysisRequest<'_>,
        reference: Option<&ReferenceCommitSet>,
        mut quality: DataQuality,
    ) -> AnalysisReport {
        let start = Instant::now();
        let window = self.window();
        let repo = request.repo;
        let role = role_of(repo, &self.config.repositories);
        info!("Analyzing {} as {} over {} months", repo, role, self.config.analysis.months);

        // Phase 1: forge
        let forge = match self.sources.forge.fetch(repo, &window) {
            Ok(data) => data,
            Err(e) => {
                quality.record_failure("forge", e);
                ForgeData::default()
            }
        };
        quality.skipped.merge(forge.skipped);
        quality
            .failed_sources
            .extend(forge.failed_requests.iter().map(|r| format!("forge: {}", r)));

        // Phase 2: local clone
        let local = self.collect_local(request.local_path, &window, &mut quality);

        // Phase 3: origin split
        let ctx = match role {
            RepositoryRole::Upstream => ForkContext::upstream(repo),
            RepositoryRole::Fork => ForkContext::fork(repo, &self.config.repositories.upstream, reference),
            RepositoryRole::Standalone => ForkContext::standalone(repo),
        };
        let attribution = aggregate(self.classifier.classify_all(&forge.commits, &ctx));
        quality.dropped_identities = attribution.dropped;
        quality.reference_commits = reference.map(|set| set.len());
        let fork_attribution = (role == RepositoryRole::Fork).then_some(attribution);
        if let Some(a) = &fork_attribution {
            info!(
                "{}: {} original, {} upstream-merged commits (original bus factor {})",
                repo, a.original_commit_count, a.upstream_merged_commit_count, a.original_bus_factor
            );
        }

        // Phase 4: categories
        let metrics = self.calculate_metrics(repo, &forge, local.as_ref(), fork_attribution.as_ref());
        quality.self_merge_lookups = metrics.code_review.self_merge_lookups;
        quality.self_merge_lookup_failures = metrics.code_review.self_merge_lookup_failures;
        quality.self_merge_unchecked = metrics.code_review.self_merge_unchecked;

        // Phase 5: score
        let health = HealthScorer::new(&self.config.scoring).calculate(&metrics, request.mode);

        if !quality.is_clean() {
            warn!(
                "{}: {} skipped records, {} failed sources, {} commits without identity",
                repo,
                quality.skipped.total(),
                quality.failed_sources.len(),
                quality.dropped_identities
            );
        }
        debug!("Analysis of {} took {:?}", repo, start.elapsed());

        AnalysisReport {
            repository: self.metadata(repo, role, &forge, local.is_some()),
            metrics,
            fork: fork_attribution,
            health,
            data_quality: quality,
        }
    }

    fn collect_local(
        &self,
        path: Option<&Path>,
        window: &AnalysisWindow,
        quality: &mut DataQuality,
    ) -> Option<LocalGitData> {
        let path = path?;
        let Some(source) = self.sources.local else {
            debug!("No local source configured, ignoring {}", path.display());
            return None;
        };
        match source.collect(path, window) {
            Ok(data) => {
                debug!("Local clone: {} commits, {} files", data.total_commits, data.test_files_count);
                Some(data)
            }
            Err(e) => {
                quality.record_failure(&format!("local clone ({})", path.display()), e);
                None
            }
        }
    }

    fn calculate_metrics(
        &self,
        repo: &str,
        forge: &ForgeData,
        local: Option<&LocalGitData>,
        attribution: Option<&ForkAttribution>,
    ) -> CategoryMetrics {
        debug!("Calculating category metrics for {}", repo);
        CategoryMetrics {
            contributor: metrics::contributor::calculate(&forge.contributors, &forge.commits, local, attribution),
            commit: metrics::commits::calculate(&forge.commits, local, attribution),
            pull_request: metrics::pull_requests::calculate(&forge.pull_requests, &forge.review_samples),
            code_review: metrics::code_review::calculate(
                repo,
                &forge.pull_requests,
                &forge.review_samples,
                self.sources.merge_lookup,
                self.config.analysis.max_merge_lookups,
            ),
            ci_cd: metrics::ci_cd::calculate(&forge.workflow_runs, &forge.pull_requests, local),
            issue: metrics::issues::calculate(&forge.issues, self.now, self.config.analysis.stale_days),
            test: metrics::testing::calculate(local),
        }
    }

    fn metadata(&self, repo: &str, role: RepositoryRole, forge: &ForgeData, has_local: bool) -> RepositoryMetadata {
        let info = &forge.repo;
        RepositoryMetadata {
            name: if info.full_name.is_empty() {
                repo.to_string()
            } else {
                info.full_name.clone()
            },
            role,
            period_months: self.config.analysis.months,
            analysis_date: Some(self.now),
            description: info.description.clone(),
            stars: info.stars,
            forks: info.forks,
            default_branch: info.default_branch.clone(),
            language: info.language.clone(),
            has_local_clone: has_local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SourceError, SourceResult};
    use crate::models::{CommitRecord, ContributorRecord, Identity, RepoInfo, BITCOIN_CORE, BITCOIN_KNOTS};
    use crate::scoring::Category;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    struct FailingForge;

    impl ForgeSource for FailingForge {
        fn fetch(&self, repo: &str, _window: &AnalysisWindow) -> SourceResult<ForgeData> {
            Err(SourceError::Transport(format!("connection refused for {}", repo)))
        }
    }

    struct FixedForge(ForgeData);

    impl ForgeSource for FixedForge {
        fn fetch(&self, _repo: &str, _window: &AnalysisWindow) -> SourceResult<ForgeData> {
            Ok(self.0.clone())
        }
    }

    struct FailingLocal;

    impl LocalSource for FailingLocal {
        fn collect(&self, _path: &Path, _window: &AnalysisWindow) -> SourceResult<LocalGitData> {
            Err(SourceError::NotFound("not a git repository".into()))
        }
    }

    struct FixedReference(HashSet<String>);

    impl ReferenceCommitSource for FixedReference {
        fn reference_shas(&self, _repo: &str, _window: &AnalysisWindow) -> SourceResult<HashSet<String>> {
            Ok(self.0.clone())
        }
    }

    fn commit(sha: &str, login: &str, message: &str) -> CommitRecord {
        CommitRecord {
            sha: sha.into(),
            author: Identity::login(login),
            committer: Identity::login(login),
            message: message.into(),
            timestamp: now() - Duration::days(3),
            stats: None,
        }
    }

    fn knots_data() -> ForgeData {
        ForgeData {
            repo: RepoInfo {
                full_name: BITCOIN_KNOTS.into(),
                stars: 300,
                ..Default::default()
            },
            contributors: vec![ContributorRecord {
                login: "luke-jr".into(),
                contributions: 10,
            }],
            commits: vec![
                commit("abc", "achow101", "Merge bitcoin/bitcoin#28000: net: fix"),
                commit("def", "fanquake", "doc: update release notes"),
                commit("ghi", "luke-jr", "wallet: fix rescan bug"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_role_of() {
        let repos = RepositoriesConfig::default();
        assert_eq!(role_of(BITCOIN_CORE, &repos), RepositoryRole::Upstream);
        assert_eq!(role_of("BitcoinKnots/Bitcoin", &repos), RepositoryRole::Fork);
        assert_eq!(role_of("rust-lang/rust", &repos), RepositoryRole::Standalone);
    }

    #[test]
    fn test_forge_failure_yields_empty_report() {
        let config = ProjectConfig::default();
        let analyzer = Analyzer::new(&config, Sources::forge_only(&FailingForge), now());
        let report = analyzer.analyze_repository(&AnalysisRequest::new("someone/empty"));

        assert_eq!(report.overall_score(), 0.0);
        assert_eq!(report.health.grade, "F");
        assert!(report.metrics.is_empty());
        assert_eq!(report.data_quality.failed_sources.len(), 1);
        assert!(report.data_quality.failed_sources[0].starts_with("forge:"));
        assert_eq!(report.repository.name, "someone/empty");
    }

    #[test]
    fn test_local_failure_is_recorded() {
        let config = ProjectConfig::default();
        let forge = FixedForge(knots_data());
        let sources = Sources {
            local: Some(&FailingLocal),
            ..Sources::forge_only(&forge)
        };
        let analyzer = Analyzer::new(&config, sources, now());
        let request = AnalysisRequest::new(BITCOIN_KNOTS).with_local_path(Some(Path::new("/nonexistent")));
        let report = analyzer.analyze_repository(&request);

        assert!(!report.repository.has_local_clone);
        assert!(report.data_quality.failed_sources[0].starts_with("local clone"));
        assert!(report.metrics.commit.has_data);
    }

    #[test]
    fn test_fork_uses_reference_set() {
        let config = ProjectConfig::default();
        let forge = FixedForge(knots_data());
        let reference = FixedReference(["def".to_string()].into_iter().collect());
        let sources = Sources {
            reference: Some(&reference),
            ..Sources::forge_only(&forge)
        };
        let analyzer = Analyzer::new(&config, sources, now());
        let report = analyzer.analyze_repository(&AnalysisRequest::new(BITCOIN_KNOTS));

        let fork = report.fork.as_ref().unwrap();
        assert_eq!(fork.original_commit_count, 1);
        assert_eq!(fork.upstream_merged_commit_count, 2);
        assert_eq!(report.data_quality.reference_commits, Some(1));
        assert_eq!(report.repository.role, RepositoryRole::Fork);
        assert_eq!(report.repository.stars, 300);
        assert!(report.metrics.contributor.fork.is_some());
    }

    #[test]
    fn test_upstream_has_no_fork_section() {
        let config = ProjectConfig::default();
        let forge = FixedForge(knots_data());
        let analyzer = Analyzer::new(&config, Sources::forge_only(&forge), now());
        let report = analyzer.analyze_repository(&AnalysisRequest::new(BITCOIN_CORE));

        assert!(report.fork.is_none());
        assert!(report.metrics.contributor.fork.is_none());
        assert_eq!(report.data_quality.reference_commits, None);
    }

    #[test]
    fn test_fight_mode_scores_fork_aware() {
        let config = ProjectConfig::default();
        let forge = FixedForge(knots_data());
        let analyzer = Analyzer::new(&config, Sources::forge_only(&forge), now());
        let comparison = analyzer.compare_repositories(
            &AnalysisRequest::new(BITCOIN_CORE),
            &AnalysisRequest::new(BITCOIN_KNOTS),
            true,
        );

        assert!(comparison.fight_mode);
        assert_eq!(comparison.repo1.health.mode, ScoringMode::ForkAware);
        assert_eq!(comparison.repo2.health.mode, ScoringMode::ForkAware);
        let weight = comparison.repo1.health.category(Category::Contributor).map(|c| c.weight);
        assert_eq!(weight, Some(0.30));
    }
}
