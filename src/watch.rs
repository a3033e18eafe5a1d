//! # Change dispatch for long-running mode
//!
//! [`WatchService`] keeps a tree resolved while it is being edited. On start it registers every
//! directory under the root with the notification source, resolves whatever references are
//! already present, then hands the event stream to a [`ChangeDispatcher`] running on its own
//! thread.
//!
//! ## Event handling
//!
//! The dispatcher consumes one ordered stream carrying both change events and watcher errors:
//!
//! - **Write / create** of a document: the document is rewritten.
//! - **Create** or rename-in of a directory: the directory and its subdirectories join the
//!   watch set, then every document already inside them is rewritten.
//! - **Anything else** (removals, metadata, access): ignored.
//! - **Rewrite failure**: logged, the loop continues with the next event.
//! - **Watcher error**: logged, the loop continues.
//!
//! Documents are handled one at a time, start to finish, on the dispatcher thread. A slow fetch
//! therefore delays every event queued behind it unless `fetch.timeout_secs` bounds it.
//!
//! ## Self-triggered events
//!
//! Rewriting a document raises a write event for that same document. The follow-up pass finds no
//! remaining references and writes nothing, so the stream settles after one extra read.
//!
//! ## Shutdown
//!
//! The loop returns only when the event stream closes. The stream's sender lives inside the
//! watcher, which the dispatcher owns, so in practice the loop runs until the process exits.

use crate::{
    config::IndexerConfig,
    error::IndexerError,
    fetch::Transport,
    rewrite::DocumentRewriter,
    scan::{list_directories, scan_all, scan_dir, FailurePolicy, ScanReport},
};
use notify::{
    event::{ModifyKind, RenameMode},
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::mpsc::{channel, Receiver},
    thread::{self, JoinHandle},
};

/// The part of a notification source the dispatcher needs: growing the watch set one
/// directory at a time.
pub trait DirectoryWatcher {
    fn add_directory(&mut self, dir: &Path) -> Result<(), IndexerError>;
}

impl DirectoryWatcher for RecommendedWatcher {
    fn add_directory(&mut self, dir: &Path) -> Result<(), IndexerError> {
        Ok(self.watch(dir, RecursiveMode::NonRecursive)?)
    }
}

/// Write or create, in the shapes the platform backends report them. A rename counts when its
/// target lands inside the tree.
pub fn is_write_or_create(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(
                RenameMode::To | RenameMode::Both | RenameMode::Any
            ))
    )
}

/// The subset of [`is_write_or_create`] that can bring a new directory into the tree.
fn adds_directory(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub events: usize,
    pub processed: usize,
    pub rewritten: usize,
    pub failures: usize,
    pub watch_errors: usize,
    pub directories: usize,
}

pub struct ChangeDispatcher<T: Transport, W: DirectoryWatcher> {
    config: IndexerConfig,
    rewriter: DocumentRewriter<T>,
    watcher: W,
    watched: HashSet<PathBuf>,
    stats: DispatchStats,
}

impl<T: Transport, W: DirectoryWatcher> ChangeDispatcher<T, W> {
    pub fn new(config: IndexerConfig, rewriter: DocumentRewriter<T>, watcher: W) -> Self {
        ChangeDispatcher {
            config,
            rewriter,
            watcher,
            watched: HashSet::new(),
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn watcher(&self) -> &W {
        &self.watcher
    }

    /// Add every directory under the root to the watch set. Any failure here is a setup error.
    pub fn register_tree(&mut self) -> Result<usize, IndexerError> {
        let dirs = list_directories(&self.config.root)?;
        for dir in dirs.iter() {
            self.watcher.add_directory(dir)?;
            self.watched.insert(dir.clone());
        }
        self.stats.directories += dirs.len();
        tracing::info!("[Dispatcher] Watching {} director(y/ies)", dirs.len());
        Ok(dirs.len())
    }

    /// Resolve references already present. Failures are collected, not fatal.
    pub fn initial_scan(&self) -> Result<ScanReport, IndexerError> {
        scan_all(&self.config, &self.rewriter, FailurePolicy::Isolate)
    }

    /// Register the directories under `dir` not yet watched. Returns how many were added.
    fn add_directory_tree(&mut self, dir: &Path) -> usize {
        let dirs = match list_directories(dir) {
            Ok(dirs) => dirs,
            Err(e) => {
                tracing::warn!("[Dispatcher] Could not list new directory {:?}: {}", dir, e);
                return 0;
            }
        };
        let mut added = 0;
        for dir in dirs.into_iter() {
            if self.watched.contains(&dir) {
                continue;
            }
            match self.watcher.add_directory(&dir) {
                Ok(()) => {
                    tracing::info!("[Dispatcher] Watching new directory {:?}", dir);
                    self.watched.insert(dir);
                    added += 1;
                }
                Err(e) => tracing::warn!("[Dispatcher] Failed to watch {:?}: {}", dir, e),
            }
        }
        self.stats.directories += added;
        added
    }

    /// Rewrite the documents a new directory arrived with. Already-watched directories are
    /// skipped, so a second event for the same directory costs nothing.
    fn adopt_directory(&mut self, dir: &Path) {
        if self.add_directory_tree(dir) == 0 {
            return;
        }
        match scan_dir(dir, &self.config, &self.rewriter, FailurePolicy::Isolate) {
            Ok(report) => {
                self.stats.processed += report.documents;
                self.stats.rewritten += report.rewritten;
                self.stats.failures += report.failures.len();
            }
            Err(e) => {
                self.stats.failures += 1;
                tracing::error!("[Dispatcher] Error scanning new directory {:?}: {}", dir, e);
            }
        }
    }

    fn process(&mut self, path: &Path) {
        self.stats.processed += 1;
        match self.rewriter.process(path) {
            Ok(outcome) if outcome.written => self.stats.rewritten += 1,
            Ok(_) => {}
            Err(e) => {
                self.stats.failures += 1;
                tracing::error!("[Dispatcher] Error processing {:?}: {}", path, e);
            }
        }
    }

    /// Handle one item from the event stream. Never fails; errors are logged and counted.
    pub fn dispatch(&mut self, event: notify::Result<Event>) {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                self.stats.watch_errors += 1;
                tracing::error!("[Dispatcher] Watcher error: {}", IndexerError::from(e));
                return;
            }
        };
        self.stats.events += 1;
        if !is_write_or_create(&event.kind) {
            tracing::trace!("[Dispatcher] Ignoring {:?} for {:?}", event.kind, event.paths);
            return;
        }

        for path in event.paths.iter() {
            if path.is_dir() {
                if adds_directory(&event.kind) {
                    self.adopt_directory(path);
                }
            } else if self.config.is_document(path) && path.is_file() {
                tracing::debug!("[Dispatcher] {:?} changed ({:?})", path, event.kind);
                self.process(path);
            }
        }
    }

    /// Consume the stream until it closes.
    pub fn run(mut self, rx: Receiver<notify::Result<Event>>) -> DispatchStats {
        tracing::info!("[Dispatcher] Waiting for changes under {:?}", self.config.root);
        for event in rx {
            self.dispatch(event);
        }
        tracing::info!("[Dispatcher] Event stream closed, stopping");
        self.stats
    }
}

/// A dispatcher running on its own thread over a live [`RecommendedWatcher`].
pub struct WatchService {
    root: PathBuf,
    handle: JoinHandle<DispatchStats>,
}

impl WatchService {
    /// Register the tree, run the initial pass, then start dispatching on a new thread.
    pub fn start<T>(config: IndexerConfig, transport: T) -> Result<Self, IndexerError>
    where
        T: Transport + Send + 'static,
    {
        let (tx, rx) = channel();
        let watcher = notify::recommended_watcher(tx)?;
        let root = config.root.clone();
        let rewriter = DocumentRewriter::new(&config, transport);
        let mut dispatcher = ChangeDispatcher::new(config, rewriter, watcher);

        dispatcher.register_tree()?;
        let report = dispatcher.initial_scan()?;
        if !report.failures.is_empty() {
            tracing::warn!(
                "[WatchService] {} document(s) failed during the initial pass",
                report.failures.len()
            );
        }

        let handle = thread::Builder::new()
            .name("mdindex-dispatcher".to_string())
            .spawn(move || dispatcher.run(rx))?;
        Ok(WatchService { root, handle })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Block until the dispatcher stops.
    pub fn wait(self) -> Result<DispatchStats, IndexerError> {
        self.handle
            .join()
            .map_err(|_| IndexerError::Custom("dispatcher thread panicked".to_string()))
    }
}
