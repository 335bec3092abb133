//! CLI command definitions and handlers

mod analyze;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::load_project_config;
use crate::sources::github::DEFAULT_API_URL;

/// Parse and validate the analysis period (1-120 months)
fn parse_months(s: &str) -> Result<u32, String> {
    let n: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("months must be at least 1".to_string())
    } else if n > 120 {
        Err("months cannot exceed 120".to_string())
    } else {
        Ok(n)
    }
}

/// repo-health - contributor and process health of Bitcoin implementations
#[derive(Parser, Debug)]
#[command(name = "repo-health")]
#[command(
    version,
    about = "Repository health metrics for Bitcoin Core and Bitcoin Knots, with fork-aware attribution",
    long_about = "repo-health pulls commits, pull requests, reviews, issues and CI runs from the \
GitHub API (and optionally a local clone), derives contributor concentration, review and \
process metrics, and scores each repository on a 0-10 scale.\n\n\
For a downstream fork, commits merged in from upstream are separated from the fork's own \
work so that upstream contributors do not inflate the fork's bus factor.",
    after_help = "\
Examples:
  repo-health analyze --repo bitcoin/bitcoin          Analyze Bitcoin Core
  repo-health fight --format markdown -o fight.md     Core vs Knots, fork-aware
  repo-health compare --repo1 a/b --repo2 c/d         Compare any two repositories
  repo-health snapshot --repo bitcoinknots/bitcoin --out knots.json
  repo-health --snapshot knots.json analyze --repo bitcoinknots/bitcoin
  repo-health report --metrics fight.json --format md  Re-render a saved report"
)]
pub struct Cli {
    /// Directory holding repo-health.toml (default: current directory)
    #[arg(long, global = true, default_value = ".")]
    pub config_dir: PathBuf,

    /// Months of history to analyze (overrides config)
    #[arg(long, global = true, value_parser = parse_months)]
    pub months: Option<u32>,

    /// GitHub token; unauthenticated requests are heavily rate limited
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub API base URL (GitHub Enterprise: https://host/api/v3)
    #[arg(long, global = true, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Output format: text, json, markdown (or md), html
    #[arg(long, short = 'f', global = true, default_value = "text", value_parser = ["text", "json", "markdown", "md", "html"])]
    pub format: String,

    /// Output file path (default: stdout)
    #[arg(long, short = 'o', global = true)]
    pub output: Option<PathBuf>,

    /// Single-line JSON output
    #[arg(long, global = true)]
    pub compact: bool,

    /// Bypass the on-disk API response cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Read forge data from saved snapshot files instead of the API (repeatable)
    #[arg(long, global = true)]
    pub snapshot: Vec<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a single repository
    Analyze {
        /// Repository as owner/name
        #[arg(long)]
        repo: String,

        /// Local clone, for CI config, test and authorship detection
        #[arg(long)]
        local_path: Option<PathBuf>,

        /// Score with the fork-aware weights
        #[arg(long)]
        fork_aware: bool,
    },

    /// Compare two repositories side by side
    Compare {
        #[arg(long)]
        repo1: String,

        #[arg(long)]
        repo2: String,

        #[arg(long)]
        local_path1: Option<PathBuf>,

        #[arg(long)]
        local_path2: Option<PathBuf>,

        /// Use fork-aware scoring
        #[arg(long)]
        fight: bool,
    },

    /// Upstream vs fork from the config, with fork-aware scoring
    #[command(after_help = "\
The pair defaults to bitcoin/bitcoin vs bitcoinknots/bitcoin. Override it in
repo-health.toml under [repositories].")]
    Fight {
        /// Local clone of the upstream
        #[arg(long)]
        upstream_path: Option<PathBuf>,

        /// Local clone of the fork
        #[arg(long)]
        fork_path: Option<PathBuf>,
    },

    /// Re-render a report saved with --format json
    Report {
        #[arg(long)]
        metrics: PathBuf,
    },

    /// Save forge data for offline runs
    Snapshot {
        #[arg(long)]
        repo: String,

        #[arg(long)]
        out: PathBuf,
    },

    /// Delete cached API responses
    Clean,
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let mut config = load_project_config(&cli.config_dir);
    if let Some(months) = cli.months {
        config.analysis.months = months;
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }
    let out = output::OutputOptions::new(&cli.format, cli.output.clone(), cli.compact)?;

    match &cli.command {
        Commands::Analyze {
            repo,
            local_path,
            fork_aware,
        } => analyze::run_analyze(&cli, &config, &out, repo, local_path.as_deref(), *fork_aware),

        Commands::Compare {
            repo1,
            repo2,
            local_path1,
            local_path2,
            fight,
        } => analyze::run_compare(
            &cli,
            &config,
            &out,
            (repo1, local_path1.as_deref()),
            (repo2, local_path2.as_deref()),
            *fight,
        ),

        Commands::Fight {
            upstream_path,
            fork_path,
        } => {
            let upstream = config.repositories.upstream.clone();
            let fork = config.repositories.fork.clone();
            analyze::run_compare(
                &cli,
                &config,
                &out,
                (&upstream, upstream_path.as_deref()),
                (&fork, fork_path.as_deref()),
                true,
            )
        }

        Commands::Report { metrics } => output::run_report(metrics, &out),

        Commands::Snapshot { repo, out: path } => analyze::run_snapshot(&cli, &config, repo, path),

        Commands::Clean => analyze::run_clean(&config),
    }
}
