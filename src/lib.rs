//! Load GTFS static archives into SQLite.
//!
//! [`ArchiveReader`] walks the members of an in-memory ZIP, and
//! [`TableLoader`] streams each table member into the destination in
//! batched transactions, upserting on the natural keys in [`KeyColumns`].

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod import;
pub mod loader;
pub mod schema;
pub mod store;

pub use archive::{ArchiveMember, ArchiveReader, EntryKind};
pub use config::AppConfig;
pub use error::{LoadError, Result};
pub use fetch::StaticClient;
pub use import::Importer;
pub use loader::{LoadSummary, TableLoader, TableReport, WriteMode};
pub use schema::{ColumnSet, KeyColumns, ProjectedHeader, UpsertPolicy};
pub use store::SqliteStore;
