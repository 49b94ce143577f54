//! Where a backend should connect.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Connection target for a database backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    /// A backend URL, passed through untouched.
    Url(String),
    /// A database file on disk.
    File(PathBuf),
    /// A private in-memory database.
    InMemory,
}

impl ConnectionConfig {
    pub fn open(path: impl AsRef<Path>) -> Self {
        ConnectionConfig::File(path.as_ref().to_path_buf())
    }

    pub fn in_memory() -> Self {
        ConnectionConfig::InMemory
    }

    /// The URL handed to the driver.
    pub fn url(&self) -> Cow<'_, str> {
        match self {
            ConnectionConfig::Url(url) => Cow::Borrowed(url),
            ConnectionConfig::File(path) => Cow::Owned(format!("sqlite:{}", path.display())),
            ConnectionConfig::InMemory => Cow::Borrowed("sqlite::memory:"),
        }
    }
}

impl From<&str> for ConnectionConfig {
    fn from(url: &str) -> Self {
        ConnectionConfig::Url(url.to_owned())
    }
}

impl From<String> for ConnectionConfig {
    fn from(url: String) -> Self {
        ConnectionConfig::Url(url)
    }
}

impl From<&String> for ConnectionConfig {
    fn from(url: &String) -> Self {
        ConnectionConfig::Url(url.to_owned())
    }
}
