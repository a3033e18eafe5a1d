//! One pass over the whole tree.
//!
//! Nothing under the root is excluded, the attachment root included; only the document
//! extension decides what gets rewritten. One-shot runs stop at the first failing document
//! ([`FailurePolicy::FailFast`]). The initial pass of a long-running session logs failures and
//! keeps going ([`FailurePolicy::Isolate`]).

use crate::{
    config::IndexerConfig,
    error::IndexerError,
    fetch::Transport,
    rewrite::DocumentRewriter,
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    FailFast,
    Isolate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Documents visited, whether or not they held references.
    pub documents: usize,
    /// Documents written back.
    pub rewritten: usize,
    pub references: usize,
    /// Only populated under [`FailurePolicy::Isolate`].
    pub failures: Vec<(PathBuf, IndexerError)>,
}

pub fn scan_all<T: Transport>(
    config: &IndexerConfig,
    rewriter: &DocumentRewriter<T>,
    policy: FailurePolicy,
) -> Result<ScanReport, IndexerError> {
    scan_dir(&config.root, config, rewriter, policy)
}

/// [`scan_all`] restricted to the subtree at `dir`.
pub fn scan_dir<T: Transport>(
    dir: &Path,
    config: &IndexerConfig,
    rewriter: &DocumentRewriter<T>,
    policy: FailurePolicy,
) -> Result<ScanReport, IndexerError> {
    tracing::info!("[Scanner] Scanning {:?}", dir);
    let mut report = ScanReport::default();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if policy == FailurePolicy::Isolate => {
                tracing::warn!("[Scanner] Skipping unreadable entry: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if entry.file_type().is_dir() || !config.is_document(entry.path()) {
            continue;
        }

        report.documents += 1;
        match rewriter.process(entry.path()) {
            Ok(outcome) => {
                report.references += outcome.references;
                if outcome.written {
                    report.rewritten += 1;
                }
            }
            Err(e) => match policy {
                FailurePolicy::FailFast => {
                    tracing::error!("[Scanner] Aborting scan at {:?}: {}", entry.path(), e);
                    return Err(e);
                }
                FailurePolicy::Isolate => {
                    tracing::error!("[Scanner] Failed to process {:?}: {}", entry.path(), e);
                    report.failures.push((entry.path().to_path_buf(), e));
                }
            },
        }
    }

    tracing::info!(
        "[Scanner] {} document(s) visited, {} rewritten, {} reference(s) resolved",
        report.documents,
        report.rewritten,
        report.references
    );
    Ok(report)
}

/// Every directory under `root`, `root` first, in walk order.
pub fn list_directories(root: &Path) -> Result<Vec<PathBuf>, IndexerError> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}
