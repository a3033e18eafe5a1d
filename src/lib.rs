//! # mdindex
//!
//! Keeps a tree of Markdown notes self-contained by pulling every remote resource a note points
//! at into a local attachment store and rewriting the note to link the local copy.
//!
//! ## Overview
//!
//! A note marks a resource to capture with an indexer tag:
//!
//! ```markdown
//! See !(indexer)https://arxiv.org/abs/1706.03762 for details.
//! ```
//!
//! After a pass, the resource lives at `<root>/attachments/1706.03762.pdf` and the note reads:
//!
//! ```markdown
//! See [indexer/pdf](/attachments/1706.03762.pdf) for details.
//! ```
//!
//! ## Architecture
//!
//! - **[`locator`]**: Source-specific locator rewrites (arXiv abstract pages to PDFs) and
//!   attachment file naming
//! - **[`fetch`]**: The [`fetch::Transport`] seam and the idempotent [`fetch::Fetcher`]
//! - **[`rewrite`]**: Tag scanning and in-place document rewriting
//! - **[`scan`]**: One pass over the whole tree
//! - **[`watch`]**: Change dispatch for long-running mode (requires `service`)
//! - **[`config`]**: [`config::IndexerConfig`], loadable from TOML
//!
//! Data flows Scanner/Dispatcher → Rewriter → Normalizer → Fetcher → attachment file; the
//! Rewriter then writes the document back to its original path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdindex::{config::IndexerConfig, run};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IndexerConfig::new("./notes")?;
//!     run(&config)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **service** (default): long-running mode over `notify`
//! - **bin** (default): the `mdindex` command-line tool

pub mod config;
pub mod error;
pub mod fetch;
pub mod locator;
pub mod rewrite;
pub mod scan;
#[cfg(test)]
mod tests;
#[cfg(feature = "service")]
pub mod watch;

pub use error::*;

use crate::{
    config::IndexerConfig,
    fetch::{HttpTransport, Transport},
    rewrite::DocumentRewriter,
    scan::{scan_all, FailurePolicy},
};

/// Create the attachment root, then run one-shot or long-running mode as `config.watch` asks.
///
/// One-shot mode returns after a single fail-fast pass. Long-running mode returns only if the
/// event stream closes.
pub fn run(config: &IndexerConfig) -> Result<(), IndexerError> {
    let transport = HttpTransport::new(&config.fetch)?;
    run_with_transport(config, transport)
}

/// [`run`] over a caller-supplied transport.
pub fn run_with_transport<T>(config: &IndexerConfig, transport: T) -> Result<(), IndexerError>
where
    T: Transport + Send + 'static,
{
    let attachment_root = config.attachment_root();
    std::fs::create_dir_all(&attachment_root)
        .map_err(|e| IndexerError::from(e).at(&attachment_root))?;

    if config.watch {
        return run_watch(config, transport);
    }

    let rewriter = DocumentRewriter::new(config, transport);
    scan_all(config, &rewriter, FailurePolicy::FailFast)?;
    Ok(())
}

#[cfg(feature = "service")]
fn run_watch<T>(config: &IndexerConfig, transport: T) -> Result<(), IndexerError>
where
    T: Transport + Send + 'static,
{
    let service = watch::WatchService::start(config.clone(), transport)?;
    let stats = service.wait()?;
    tracing::info!(
        "[Runner] Dispatcher stopped after {} event(s), {} document(s) rewritten",
        stats.events,
        stats.rewritten
    );
    Ok(())
}

#[cfg(not(feature = "service"))]
fn run_watch<T>(_config: &IndexerConfig, _transport: T) -> Result<(), IndexerError>
where
    T: Transport + Send + 'static,
{
    Err(IndexerError::Custom(
        "long-running mode requires the `service` feature".to_string(),
    ))
}
