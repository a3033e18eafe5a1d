use std::io;

use thiserror::Error;
use walkdir::Error as WalkdirError;

#[cfg(feature = "service")]
use notify::{Error as NotifyError, ErrorKind as NotifyErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexerError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("Remote returned HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("Invalid locator '{0}': no file name segment")]
    InvalidLocator(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource: {0}")]
    PermissionDenied(String),
    #[error("Watch error: {0}")]
    Watch(String),
}

impl From<io::Error> for IndexerError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => IndexerError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => IndexerError::PermissionDenied(format!("{x}")),
            _ => IndexerError::Io(format!("IOError ({}): {x}", x.kind())),
        }
    }
}

impl From<toml::de::Error> for IndexerError {
    fn from(src: toml::de::Error) -> IndexerError {
        IndexerError::Config(format!("Toml deserialization error: {src}"))
    }
}

// Status codes are checked by the HTTP transport; anything reqwest raises is a transport failure.
impl From<reqwest::Error> for IndexerError {
    fn from(x: reqwest::Error) -> Self {
        IndexerError::Network(format!("{x}"))
    }
}

impl From<WalkdirError> for IndexerError {
    fn from(x: WalkdirError) -> Self {
        let path = x.path().map(|p| p.to_path_buf());
        match x.into_io_error() {
            Some(io_error) => match path {
                Some(path) => IndexerError::from(io_error).at(&path),
                None => IndexerError::from(io_error),
            },
            None => IndexerError::Io(format!("directory walk failed at {path:?}: filesystem loop")),
        }
    }
}

#[cfg(feature = "service")]
impl From<NotifyError> for IndexerError {
    fn from(notify_error: NotifyError) -> Self {
        match notify_error.kind {
            NotifyErrorKind::Generic(msg) => {
                IndexerError::Watch(format!("{}, paths: {:?}", msg, notify_error.paths))
            }
            NotifyErrorKind::Io(io_error) => IndexerError::Watch(format!(
                "io error {}, paths: {:?}",
                io_error.kind(),
                notify_error.paths
            )),
            NotifyErrorKind::PathNotFound => {
                IndexerError::NotFound(format!("watch path(s) not found: {:?}", notify_error.paths))
            }
            NotifyErrorKind::WatchNotFound => {
                IndexerError::NotFound(format!("watch not found, paths: {:?}", notify_error.paths))
            }
            NotifyErrorKind::InvalidConfig(_) => {
                IndexerError::Watch("invalid watcher config".to_string())
            }
            NotifyErrorKind::MaxFilesWatch => {
                IndexerError::Watch("max file watch limit reached".to_string())
            }
        }
    }
}

impl IndexerError {
    /// Prefix the message with the path it concerns. Variants without a free-form message are
    /// returned unchanged.
    pub fn at(self, path: &std::path::Path) -> Self {
        match self {
            IndexerError::Io(msg) => IndexerError::Io(format!("{}: {msg}", path.display())),
            IndexerError::NotFound(msg) => {
                IndexerError::NotFound(format!("{}: {msg}", path.display()))
            }
            IndexerError::PermissionDenied(msg) => {
                IndexerError::PermissionDenied(format!("{}: {msg}", path.display()))
            }
            other => other,
        }
    }

    /// Network-class failures abort only the document whose reference triggered them.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            IndexerError::Network(_) | IndexerError::HttpStatus { .. }
        )
    }
}
