// src/import.rs
use bytes::Bytes;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::fetch::StaticClient;
use crate::loader::{LoadSummary, TableLoader};
use crate::schema::KeyColumns;
use crate::store::SqliteStore;

/// Download-then-load for one category.
pub struct Importer {
    client: StaticClient,
    loader: TableLoader,
    db_path: PathBuf,
}

impl Importer {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: StaticClient::new(&config.base_url, config.timeout)?,
            loader: TableLoader::new(KeyColumns::gtfs_default())
                .with_batch_size(config.batch_size),
            db_path: config.db_path.clone(),
        })
    }

    pub async fn import_category(&self, category: &str) -> Result<LoadSummary> {
        info!(category, "starting GTFS static import");
        let start = Instant::now();

        let archive = self.client.get_static_zip(category).await?;
        let summary = self.import_buffer(archive).await?;

        info!(
            category,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "completed GTFS static import"
        );
        Ok(summary)
    }

    /// Load an archive already in memory. SQLite and the CSV decoder are
    /// blocking, so the load runs on the blocking pool.
    pub async fn import_buffer(&self, archive: Bytes) -> Result<LoadSummary> {
        let loader = self.loader.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut store = SqliteStore::open(&db_path)?;
            loader.load_from_archive(&mut store, &archive)
        })
        .await?
    }
}
