//! In-place rewriting of tagged references.
//!
//! A reference is the tag `!(indexer)` immediately followed by an absolute URL, terminated by
//! whitespace or end of input:
//!
//! ```text
//! See !(indexer)https://example.com/paper.pdf for details.
//! ```
//!
//! Each reference is fetched into the attachment root and replaced by a link to the local copy:
//!
//! ```text
//! See [indexer/pdf](/attachments/paper.pdf) for details.
//! ```
//!
//! Matches are computed once against the content as read. Every match then consumes the first
//! remaining occurrence of its literal span, so replacements never shift the lookups that follow.
//! A fetch failure discards the whole pass: either every reference in a document is resolved and
//! written, or the file is left untouched.

use crate::{
    config::{IndexerConfig, ATTACHMENTS_DIR},
    error::IndexerError,
    fetch::{Fetcher, Transport},
};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub const REFERENCE_TAG: &str = "!(indexer)";

static REFERENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"{}(http\S+)", regex::escape(REFERENCE_TAG)))
        .expect("reference pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    /// Tag plus url, exactly as it appears in the document.
    pub span: &'a [u8],
    pub url: &'a str,
}

/// All non-overlapping references in `content`, in order of appearance.
pub fn scan_references(content: &[u8]) -> Vec<Reference<'_>> {
    REFERENCE_PATTERN
        .captures_iter(content)
        .filter_map(|caps| {
            let span = caps.get(0)?.as_bytes();
            let url = std::str::from_utf8(caps.get(1)?.as_bytes()).ok()?;
            Some(Reference { span, url })
        })
        .collect()
}

pub fn attachment_link(filename: &str) -> String {
    format!("[indexer/pdf](/{ATTACHMENTS_DIR}/{filename})")
}

/// Replace the earliest occurrence of `needle`. Returns false when there is none.
fn replace_first(buffer: &mut Vec<u8>, needle: &[u8], replacement: &[u8]) -> bool {
    if needle.is_empty() {
        return false;
    }
    match buffer.windows(needle.len()).position(|w| w == needle) {
        Some(start) => {
            buffer.splice(start..start + needle.len(), replacement.iter().copied());
            true
        }
        None => false,
    }
}

fn write_document(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        // Only applies if the file has to be created; an existing file keeps its mode.
        options.mode(0o644);
    }
    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.flush()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// References resolved and replaced in this pass.
    pub references: usize,
    /// Whether the document was written back.
    pub written: bool,
}

pub struct DocumentRewriter<T: Transport> {
    fetcher: Fetcher<T>,
    attachment_root: PathBuf,
}

impl<T: Transport> DocumentRewriter<T> {
    pub fn new(config: &IndexerConfig, transport: T) -> Self {
        DocumentRewriter {
            fetcher: Fetcher::new(transport),
            attachment_root: config.attachment_root(),
        }
    }

    /// Resolve every reference in `content`, returning the rewritten buffer and the number of
    /// replacements. The first fetch error aborts and the partial buffer is dropped.
    pub fn rewrite_content(&self, content: &[u8]) -> Result<(Vec<u8>, usize), IndexerError> {
        let references = scan_references(content);
        let mut buffer = content.to_vec();
        let mut replaced = 0;
        for reference in references.iter() {
            let filename = self.fetcher.fetch(reference.url, &self.attachment_root)?;
            let link = attachment_link(&filename);
            if replace_first(&mut buffer, reference.span, link.as_bytes()) {
                replaced += 1;
            } else {
                tracing::warn!(
                    "[Rewriter] Span for {} no longer present in buffer",
                    reference.url
                );
            }
        }
        Ok((buffer, replaced))
    }

    /// Read, resolve and write back one document.
    pub fn process(&self, path: &Path) -> Result<RewriteOutcome, IndexerError> {
        let content = fs::read(path).map_err(|e| IndexerError::from(e).at(path))?;
        if scan_references(&content).is_empty() {
            // Nothing to resolve. Skipping the write keeps our own change events from looping.
            tracing::debug!("[Rewriter] No references in {:?}", path);
            return Ok(RewriteOutcome::default());
        }

        let (buffer, references) = self.rewrite_content(&content)?;
        write_document(path, &buffer).map_err(|e| IndexerError::from(e).at(path))?;
        tracing::info!(
            "[Rewriter] Resolved {} reference(s) in {:?}",
            references,
            path
        );
        Ok(RewriteOutcome {
            references,
            written: true,
        })
    }
}
