//! Test suite presence and testing practices
//!
//! Everything here is derived from tracked file paths of a local clone. No
//! test is ever run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::models::{round_to, LocalGitData};

const TEST_EXTENSIONS: &[&str] = &["py", "js", "cpp"];
const TEST_DIRS: &[&str] = &["test", "tests"];

/// Path prefixes that signal a testing framework in a Bitcoin-style tree.
const FRAMEWORK_SIGNALS: &[(&str, &str)] = &[
    ("src/test/", "Boost.Test unit tests"),
    ("test/functional/", "functional test framework"),
    ("src/bench/", "benchmarks"),
    ("src/test/fuzz/", "fuzz targets"),
    ("test/fuzz/", "fuzz targets"),
    ("test/lint/", "lint checks"),
    ("pytest.ini", "pytest"),
    ("conftest.py", "pytest"),
    ("jest.config.js", "Jest"),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestMetrics {
    pub has_data: bool,
    pub test_files_count: usize,
    pub has_tests: bool,
    pub has_test_directory: bool,
    pub test_framework_signals: Vec<String>,
    pub practice_score: f64,
    pub score: f64,
}

/// Whether a tracked path looks like a test source file.
pub fn is_test_file(path: &str) -> bool {
    let p = Path::new(path);
    let Some(ext) = p.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if !TEST_EXTENSIONS.contains(&ext) {
        return false;
    }
    let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let named_like_test = stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.starts_with("test-")
        || stem.ends_with("-test");
    named_like_test || in_test_directory(path)
}

fn in_test_directory(path: &str) -> bool {
    let mut parts: Vec<&str> = path.split('/').collect();
    parts.pop();
    parts.iter().any(|part| TEST_DIRS.contains(part))
}

/// Distinct framework signals found among the paths, in first-seen order.
pub fn framework_signals<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for path in paths {
        for (prefix, signal) in FRAMEWORK_SIGNALS {
            let hit = path.starts_with(prefix) || path.ends_with(&format!("/{prefix}"));
            if hit && !found.iter().any(|s| s == signal) {
                found.push(signal.to_string());
            }
        }
    }
    found
}

/// Whether any path lives under a `test`/`tests` directory.
pub fn has_test_directory<'a>(paths: impl IntoIterator<Item = &'a str>) -> bool {
    paths.into_iter().any(in_test_directory)
}

/// 0-10 testing practice score from directory layout and framework signals.
pub fn practice_score(has_test_directory: bool, signal_count: usize) -> f64 {
    let n = signal_count as f64;
    match (has_test_directory, signal_count > 0) {
        (true, true) => (8.0 + n).min(10.0),
        (true, false) | (false, true) => (5.0 + n).min(10.0),
        (false, false) => 0.0,
    }
}

pub fn calculate(local: Option<&LocalGitData>) -> TestMetrics {
    let Some(local) = local else {
        warn!("No local clone available, test metrics unavailable");
        return TestMetrics::default();
    };

    let has_tests = local.test_files_count > 0;
    let practice = practice_score(local.has_test_directory, local.test_framework_signals.len());

    TestMetrics {
        has_data: true,
        test_files_count: local.test_files_count,
        has_tests,
        has_test_directory: local.has_test_directory,
        test_framework_signals: local.test_framework_signals.clone(),
        practice_score: round_to(practice, 1),
        score: if has_tests { round_to(practice, 1) } else { 0.0 },
    }
}
