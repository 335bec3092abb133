//! Local clone analysis
//!
//! Reads the facts the forge API cannot give cheaply: per-email authorship,
//! direct (non-merge) commit counts and the tracked file listing that CI
//! and test detection run on.
//!
//! # Example
//!
//! ```no_run
//! use repo_health::git::LocalRepository;
//! use repo_health::sources::AnalysisWindow;
//! use std::path::Path;
//!
//! let local = LocalRepository::open(Path::new("/path/to/bitcoin")).unwrap();
//! let window = AnalysisWindow::months_back(chrono::Utc::now(), 12);
//! let data = local.collect(&window).unwrap();
//! println!("{} direct commits", data.direct_commits);
//! ```

pub mod history;

use std::path::Path;

pub use history::{local_data_from, HistorySummary, LocalRepository};

use crate::error::SourceResult;
use crate::models::LocalGitData;
use crate::sources::{AnalysisWindow, LocalSource};

/// [`LocalSource`] that opens the clone at the given path with libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitLocalSource;

impl LocalSource for GitLocalSource {
    fn collect(&self, path: &Path, window: &AnalysisWindow) -> SourceResult<LocalGitData> {
        LocalRepository::open(path)?.collect(window)
    }
}
