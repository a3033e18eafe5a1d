//! Shared test utilities for the rewriting pipeline

use crate::{config::IndexerConfig, error::IndexerError, fetch::Transport};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    io::{Cursor, Read},
};
use tempfile::TempDir;

/// Create `<temp_dir>/vault` with an empty attachment root and return its config.
pub fn create_root(temp_dir: &TempDir) -> IndexerConfig {
    let root = temp_dir.path().join("vault");
    std::fs::create_dir_all(&root).unwrap();
    let config = IndexerConfig::new(&root).unwrap();
    std::fs::create_dir_all(config.attachment_root()).unwrap();
    config
}

/// In-memory transport that serves canned bodies and records every requested url.
#[derive(Default)]
pub struct MockTransport {
    responses: HashMap<String, Result<Vec<u8>, IndexerError>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
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
