//! Integration tests for the repo-health binary
//!
//! Every run reads forge data from snapshot files written into an isolated
//! temp directory, so no test touches the network.

use chrono::{Duration, Utc};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use repo_health::models::{CommitRecord, ContributorRecord, ForgeData, Identity, RepoInfo};
use repo_health::sources::snapshot::save_snapshot;

fn commit(sha: &str, login: &str, message: &str) -> CommitRecord {
    CommitRecord {
        sha: sha.into(),
        author: Identity::login(login),
        committer: Identity::login(login),
        message: message.into(),
        timestamp: Utc::now() - Duration::days(7),
        stats: None,
    }
}

fn forge_data(name: &str, commits: Vec<CommitRecord>) -> ForgeData {
    ForgeData {
        repo: RepoInfo {
            full_name: name.into(),
            ..Default::default()
        },
        contributors: vec![
            ContributorRecord {
                login: "alice".into(),
                contributions: 40,
            },
            ContributorRecord {
                login: "bob".into(),
                contributions: 10,
            },
        ],
        commits,
        ..Default::default()
    }
}

/// Temp dir holding core.json and knots.json snapshots.
fn create_test_workspace() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    save_snapshot(
        &dir.path().join("core.json"),
        &forge_data("bitcoin/bitcoin", vec![commit("c1", "alice", "net: fix peer eviction")]),
    )
    .expect("write core snapshot");
    save_snapshot(
        &dir.path().join("knots.json"),
        &forge_data(
            "bitcoinknots/bitcoin",
            vec![
                commit("c1", "alice", "net: fix peer eviction"),
                commit("k1", "luke-jr", "Add new RPC command"),
            ],
        ),
    )
    .expect("write knots snapshot");
    dir
}

/// Run the binary offline and return (stdout, stderr, exit_code)
fn run(workspace: &Path, args: &[&str]) -> (String, String, i32) {
    let core = workspace.join("core.json");
    let knots = workspace.join("knots.json");
    let output = Command::new(env!("CARGO_BIN_EXE_repo-health"))
        .arg("--config-dir")
        .arg(workspace)
        .arg("--snapshot")
        .arg(&core)
        .arg("--snapshot")
        .arg(&knots)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute repo-health");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

#[test]
fn test_analyze_json_output() {
    let ws = create_test_workspace();
    let (stdout, stderr, code) = run(ws.path(), &["analyze", "--repo", "bitcoin/bitcoin", "--format", "json"]);
    assert_eq!(code, 0, "stderr: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(json["repository"]["name"], "bitcoin/bitcoin");
    assert_eq!(json["repository"]["role"], "upstream");
    assert!(json["health"]["overall_score"].as_f64().is_some());
}

#[test]
fn test_fight_attributes_fork_commits() {
    let ws = create_test_workspace();
    let (stdout, stderr, code) = run(ws.path(), &["fight", "--format", "json"]);
    assert_eq!(code, 0, "stderr: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(json["fight_mode"], true);
    assert_eq!(json["repo2"]["repository"]["name"], "bitcoinknots/bitcoin");
    // c1 is in the upstream snapshot, k1 is the fork's own
    assert_eq!(json["repo2"]["fork"]["original_commit_count"], 1);
    assert_eq!(json["repo2"]["fork"]["upstream_merged_commit_count"], 1);
}

#[test]
fn test_report_rerenders_saved_json() {
    let ws = create_test_workspace();
    let saved = ws.path().join("fight.json");
    let saved_str = saved.to_str().unwrap();
    let (_, stderr, code) = run(ws.path(), &["fight", "--format", "json", "--output", saved_str]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(saved.exists());

    let (stdout, stderr, code) = run(ws.path(), &["report", "--metrics", saved_str, "--format", "md"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stdout.contains("bitcoin/bitcoin vs bitcoinknots/bitcoin"));
    assert!(stdout.contains("## Metric Differences"));
}

#[test]
fn test_fight_html_output() {
    let ws = create_test_workspace();
    let (stdout, stderr, code) = run(ws.path(), &["fight", "--format", "html"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stdout.contains("<!DOCTYPE html>"));
    assert!(stdout.contains("bitcoin/bitcoin vs bitcoinknots/bitcoin"));
    assert!(stdout.contains("Recommendations"));
}

#[test]
fn test_invalid_repository_slug_fails() {
    let ws = create_test_workspace();
    let (_, stderr, code) = run(ws.path(), &["analyze", "--repo", "bitcoin"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("expected owner/name"));
}

#[test]
fn test_compare_with_itself_fails() {
    let ws = create_test_workspace();
    let (_, stderr, code) = run(
        ws.path(),
        &["compare", "--repo1", "bitcoin/bitcoin", "--repo2", "bitcoin/bitcoin"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("with itself"));
}
