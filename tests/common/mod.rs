//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use mdindex::{fetch::Transport, IndexerError};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    io::{Cursor, Read},
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// Create a small note tree under `<temp_dir>/notes/` and return its path.
///
/// ```text
/// notes/
///   index.md           one arXiv reference
///   plain.md           no references
///   papers/survey.md   two references, one repeated
///   papers/readme.txt  a reference in a non-document
/// ```
///
/// No attachment root is created.
#[allow(dead_code)]
pub fn create_note_tree(temp_dir: &TempDir) -> PathBuf {
    let root = temp_dir.path().join("notes");
    std::fs::create_dir_all(root.join("papers")).unwrap();

    std::fs::write(
        root.join("index.md"),
        "# Reading list\n\nSee !(indexer)https://arxiv.org/abs/1706.03762 for details.\n",
    )
    .unwrap();
    std::fs::write(root.join("plain.md"), "# Nothing to fetch\n").unwrap();
    std::fs::write(
        root.join("papers/survey.md"),
        "- !(indexer)https://example.com/survey.pdf\n\
         - !(indexer)https://example.com/data.csv\n\
         - again !(indexer)https://example.com/survey.pdf\n",
    )
    .unwrap();
    std::fs::write(
        root.join("papers/readme.txt"),
        "!(indexer)https://example.com/ignored.pdf\n",
    )
    .unwrap();

    root
}

/// Bodies served by [`MockTransport::for_note_tree`].
#[allow(dead_code)]
pub const NOTE_TREE_BODIES: &[(&str, &[u8])] = &[
    ("https://arxiv.org/pdf/1706.03762.pdf", b"%PDF attention"),
    ("https://example.com/survey.pdf", b"%PDF survey"),
    ("https://example.com/data.csv", b"a,b\n1,2\n"),
];

#[allow(dead_code)]
pub fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// In-memory transport that serves canned bodies and records every requested url.
#[derive(Default)]
pub struct MockTransport {
    responses: HashMap<String, Result<Vec<u8>, IndexerError>>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn for_note_tree() -> Self {
        NOTE_TREE_BODIES
            .iter()
            .fold(MockTransport::default(), |t, (url, body)| {
                t.with_body(url, body)
            })
    }

    pub fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.responses.insert(url.to_string(), Ok(body.to_vec()));
        self
    }

    pub fn with_error(mut self, url: &str, msg: &str) -> Self {
        self.responses
            .insert(url.to_string(), Err(IndexerError::Network(msg.to_string())));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str) -> Result<Box<dyn Read + Send>, IndexerError> {
        self.calls.lock().push(url.to_string());
        match self.responses.get(url) {
            Some(Ok(body)) => Ok(Box::new(Cursor::new(body.clone()))),
            Some(Err(e)) => Err(e.clone()),
            None => Err(IndexerError::Network(format!("no route to {url}"))),
        }
    }
}
