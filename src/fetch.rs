//! Resource fetching into the attachment store.
//!
//! [`Fetcher::fetch`] always works on the normalized locator and is idempotent by existence: once
//! `<dest>/<filename>` is present, later calls return the same filename without touching the
//! network. The check does not look at size or validity, so a partially written file left by an
//! interrupted body copy is treated as complete on every subsequent call.

use crate::{
    config::FetchConfig,
    error::IndexerError,
    locator::{local_filename, normalize},
};
use std::{
    fs::{self, OpenOptions},
    io::{self, Read},
    path::Path,
    sync::Arc,
};

/// Blocking retrieval of a remote locator. Implementations return the response body as a
/// reader; the fetcher streams it to disk.
pub trait Transport {
    fn get(&self, url: &str) -> Result<Box<dyn Read + Send>, IndexerError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<Box<dyn Read + Send>, IndexerError> {
        (**self).get(url)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &str) -> Result<Box<dyn Read + Send>, IndexerError> {
        (**self).get(url)
    }
}

/// HTTP GET over `reqwest::blocking`, following redirects with the client defaults.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    require_success: bool,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, IndexerError> {
        // reqwest's blocking client defaults to a 30s timeout; None here really means none.
        let mut builder = reqwest::blocking::Client::builder().timeout(config.timeout());
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        Ok(HttpTransport {
            client: builder.build()?,
            require_success: config.require_success,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Box<dyn Read + Send>, IndexerError> {
        tracing::debug!("[Fetcher] GET {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            if self.require_success {
                return Err(IndexerError::HttpStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            tracing::warn!(
                "[Fetcher] {} answered HTTP {}; storing the response body anyway",
                url,
                status.as_u16()
            );
        }
        Ok(Box::new(response))
    }
}

pub struct Fetcher<T: Transport> {
    transport: T,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T) -> Self {
        Fetcher { transport }
    }

    /// Make the resource behind `locator` available in `dest` and return its file name.
    pub fn fetch(&self, locator: &str, dest: &Path) -> Result<String, IndexerError> {
        let normalized = normalize(locator);
        let filename = local_filename(&normalized);
        if matches!(filename, "" | "." | "..") {
            return Err(IndexerError::InvalidLocator(normalized.clone()));
        }

        let full_path = dest.join(filename);
        match fs::symlink_metadata(&full_path) {
            Ok(_) => {
                tracing::debug!("[Fetcher] {:?} already present, skipping download", full_path);
                return Ok(filename.to_string());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(IndexerError::from(e).at(&full_path)),
        }

        tracing::info!("[Fetcher] Downloading {} to {:?}", normalized, full_path);
        let mut body = self.transport.get(&normalized)?;

        let mut out = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
        {
            Ok(out) => out,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(filename.to_string());
            }
            Err(e) => return Err(IndexerError::from(e).at(&full_path)),
        };
        let written =
            io::copy(&mut body, &mut out).map_err(|e| IndexerError::from(e).at(&full_path))?;
        tracing::info!("[Fetcher] Stored {} bytes at {:?}", written, full_path);

        Ok(filename.to_string())
    }
}
