//! Error type shared by the archive reader, the loader and the thin
//! collaborators around them.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Error, Debug)]
pub enum LoadError {
    /// The buffer could not be opened as a ZIP archive.
    #[error("not a readable ZIP archive: {0}")]
    ArchiveFormat(#[from] zip::result::ZipError),

    /// The destination could not report the live columns of `table`.
    #[error("failed to read columns of table `{table}`: {source}")]
    SchemaLookup {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A member's bytes could not be decoded as CSV.
    #[error("failed to decode `{table}`: {source}")]
    Decode {
        table: String,
        #[source]
        source: csv::Error,
    },

    /// The destination rejected a batch, the begin or the commit.
    #[error("failed to write `{table}`: {source}")]
    Write {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("HTTP {status} while fetching {url}: {body}")]
    Fetch {
        url: String,
        status: u16,
        body: String,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("schema file {path:?}: {source}")]
    SchemaFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("load task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl LoadError {
    /// Table the failure belongs to, when it happened inside a member load.
    pub fn table(&self) -> Option<&str> {
        match self {
            LoadError::SchemaLookup { table, .. }
            | LoadError::Decode { table, .. }
            | LoadError::Write { table, .. } => Some(table),
            _ => None,
        }
    }
}
