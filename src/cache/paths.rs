//! Cache path utilities - uses ~/.cache/repo-health/ for API responses

use std::path::{Path, PathBuf};

/// Get the root cache directory.
/// Uses ~/.cache/repo-health/ on Unix, %LOCALAPPDATA%/repo-health/ on Windows.
pub fn get_cache_root() -> PathBuf {
    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::cache_dir().unwrap_or_else(|| {
            // Fallback to ~/.cache
            dirs::home_dir()
                .map(|h| h.join(".cache"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("repo-health")
}

/// Directory holding cached forge responses below a cache root.
pub fn get_responses_dir(root: &Path) -> PathBuf {
    root.join("responses")
}
