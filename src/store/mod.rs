//! Page storage module
//!
//! One flat file per page: the body of page `<title>` lives in
//! `<storage dir>/<title>.txt`. Titles are trusted as given; the router's
//! title grammar is the only validation in front of this layer.

mod fs;
mod locks;

pub use fs::PageStore;

use thiserror::Error;

/// Suffix appended to a title to form its file name
pub const PAGE_SUFFIX: &str = ".txt";

/// A titled body of opaque bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub body: Vec<u8>,
}

impl Page {
    pub fn new(title: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Page with the given title and no content
    pub fn empty(title: impl Into<String>) -> Self {
        Self::new(title, Vec::new())
    }
}

/// Result of reading a page
#[derive(Debug)]
pub enum LoadOutcome {
    Found(Page),
    /// No file for this title
    NotFound,
    /// The file may exist but could not be read
    StorageFault(StoreError),
}

/// Storage failure; `Display` is the raw text shown to users
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("open {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("remove {path}: {source}")]
    Remove {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("readdir {path}: {source}")]
    List {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Underlying I/O error
    pub const fn io(&self) -> &std::io::Error {
        match self {
            Self::Read { source, .. }
            | Self::Write { source, .. }
            | Self::Remove { source, .. }
            | Self::List { source, .. } => source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.io().kind() == std::io::ErrorKind::NotFound
    }
}
