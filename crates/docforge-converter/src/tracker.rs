//! Scoped ownership of a job's scratch files.
//!
//! Every path a job creates or takes over is registered here, files and
//! directories alike. Cleanup
//! drains the list, so each path gets exactly one deletion attempt; paths
//! still registered when the tracker is dropped are removed synchronously.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Paths deleted.
    pub removed: usize,
    /// Paths that were already gone.
    pub missing: usize,
    /// Paths that could not be deleted.
    pub failed: usize,
}

/// Owns the scratch paths of one job.
#[derive(Debug)]
pub struct TempArtifactTracker {
    job_id: Uuid,
    paths: Vec<PathBuf>,
}

impl TempArtifactTracker {
    /// Create an empty tracker for a job.
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            paths: Vec::new(),
        }
    }

    /// Take ownership of a path. Registering the same path twice is a no-op.
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            debug!(job_id = %self.job_id, path = %path.display(), "Tracking scratch path");
            self.paths.push(path);
        }
    }

    /// Paths still awaiting cleanup.
    pub fn tracked(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Job the tracker belongs to.
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Delete every registered path. Failures are logged and never returned.
    pub async fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for path in std::mem::take(&mut self.paths) {
            let result = remove_path(&path).await;
            self.record(&mut report, &path, result);
        }
        report
    }

    fn cleanup_blocking(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for path in std::mem::take(&mut self.paths) {
            let result = remove_path_blocking(&path);
            self.record(&mut report, &path, result);
        }
        report
    }

    fn record(&self, report: &mut CleanupReport, path: &Path, result: std::io::Result<()>) {
        match result {
            Ok(()) => {
                debug!(job_id = %self.job_id, path = %path.display(), "Removed scratch path");
                report.removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(job_id = %self.job_id, path = %path.display(), "Scratch path already gone");
                report.missing += 1;
            }
            Err(e) => {
                warn!(
                    job_id = %self.job_id,
                    path = %path.display(),
                    error = %e,
                    "Failed to remove scratch path"
                );
                report.failed += 1;
            }
        }
    }
}

async fn remove_path(path: &Path) -> std::io::Result<()> {
    if tokio::fs::symlink_metadata(path).await?.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

fn remove_path_blocking(path: &Path) -> std::io::Result<()> {
    if std::fs::symlink_metadata(path)?.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

impl Drop for TempArtifactTracker {
    fn drop(&mut self) {
        if !self.paths.is_empty() {
            let report = self.cleanup_blocking();
            debug!(
                job_id = %self.job_id,
                removed = report.removed,
                missing = report.missing,
                failed = report.failed,
                "Scratch cleanup on drop"
            );
        }
    }
}
