// src/loader/mod.rs
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::io::Read;
use std::time::Instant;
use tracing::{debug, error, info, instrument, trace};

use crate::archive::{is_table_member, table_name, ArchiveReader};
use crate::error::{LoadError, Result};
use crate::schema::{KeyColumns, ProjectedHeader, UpsertPolicy};
use crate::store::{InsertStatement, Row, SqliteStore};

pub const DEFAULT_BATCH_SIZE: usize = 3000;

/// How a member ended up being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Upsert,
    Insert,
    /// No header, or no header column the destination knows about.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub columns: usize,
    pub rows: u64,
    pub batches: u64,
    pub mode: WriteMode,
}

impl TableReport {
    fn skipped(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: 0,
            rows: 0,
            batches: 0,
            mode: WriteMode::Skipped,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub tables: Vec<TableReport>,
}

impl LoadSummary {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }

    pub fn loaded_tables(&self) -> usize {
        self.tables
            .iter()
            .filter(|t| t.mode != WriteMode::Skipped)
            .count()
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }
}

/// Streams GTFS tables out of an archive into SQLite.
#[derive(Debug, Clone)]
pub struct TableLoader {
    keys: KeyColumns,
    batch_size: usize,
}

impl TableLoader {
    pub fn new(keys: KeyColumns) -> Self {
        Self {
            keys,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Rows per write. Values below one are raised to one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Load every table member of `archive`, one after another.
    ///
    /// Each member commits on its own. The archive as a whole is not
    /// atomic: when a member fails its transaction is rolled back, the
    /// error is returned, and tables committed before it stay in the store.
    /// Decode failures stop the load the same way; later members are not
    /// attempted.
    #[instrument(level = "info", skip_all, fields(bytes = archive.len()))]
    pub fn load_from_archive(
        &self,
        store: &mut SqliteStore,
        archive: &[u8],
    ) -> Result<LoadSummary> {
        let start = Instant::now();
        let mut reader = ArchiveReader::open(archive)?;
        let mut summary = LoadSummary::default();

        while let Some(member) = reader.next_member() {
            let member = member?;
            if !member.is_file() || !is_table_member(&member.name) {
                trace!(name = %member.name, kind = ?member.kind, "skipping member");
                continue;
            }

            let table = table_name(&member.name);
            info!(file = %member.name, table = %table, "processing GTFS file");
            let report = self.load_member(store, &table, member).inspect_err(|e| {
                error!(table = %table, error = %e, "error processing GTFS file");
            })?;
            summary.tables.push(report);
        }

        info!(
            tables = summary.loaded_tables(),
            rows = summary.total_rows(),
            elapsed = ?start.elapsed(),
            "all GTFS static files processed"
        );
        Ok(summary)
    }

    /// Load one member's CSV stream into `table`.
    #[instrument(level = "debug", skip(self, store, input))]
    pub fn load_member<R: Read>(
        &self,
        store: &mut SqliteStore,
        table: &str,
        input: R,
    ) -> Result<TableReport> {
        let columns = store
            .table_columns(table)
            .map_err(|source| LoadError::SchemaLookup {
                table: table.to_string(),
                source,
            })?;

        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input);
        let mut records = rdr.records();

        let decode = |source| LoadError::Decode {
            table: table.to_string(),
            source,
        };

        let raw_header = loop {
            match records.next() {
                Some(record) => {
                    let record = record.map_err(decode)?;
                    if !is_blank(&record) {
                        break record;
                    }
                }
                None => {
                    debug!(table, "member has no header row");
                    return Ok(TableReport::skipped(table));
                }
            }
        };

        let header = ProjectedHeader::project(&raw_header, &columns);
        if header.is_empty() {
            debug!(
                table,
                known_columns = columns.len(),
                "no header column exists in the destination; skipping"
            );
            return Ok(TableReport::skipped(table));
        }

        let policy = UpsertPolicy::resolve(table, &header, &self.keys);
        let stmt = InsertStatement::new(table, &header, &policy);
        debug!(table, sql = stmt.sql(), "prepared insert");

        let write = |source| LoadError::Write {
            table: table.to_string(),
            source,
        };

        let tx = store.transaction().map_err(write)?;
        let mut batch: Vec<Row> = Vec::with_capacity(self.batch_size);
        let mut rows = 0u64;
        let mut batches = 0u64;

        for record in records {
            let record = record.map_err(decode)?;
            if is_blank(&record) {
                continue;
            }
            batch.push(header.extract(&record));
            rows += 1;

            if batch.len() >= self.batch_size {
                SqliteStore::write_batch(&tx, &stmt, &batch).map_err(write)?;
                batches += 1;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            SqliteStore::write_batch(&tx, &stmt, &batch).map_err(write)?;
            batches += 1;
        }

        tx.commit().map_err(write)?;

        let mode = if policy.is_upsert() {
            WriteMode::Upsert
        } else {
            WriteMode::Insert
        };
        info!(table, rows, batches, ?mode, "upserted rows into table");

        Ok(TableReport {
            table: table.to_string(),
            columns: header.len(),
            rows,
            batches,
            mode,
        })
    }
}

/// A line holding only whitespace. Rows of bare delimiters are data and
/// load as all-NULL tuples.
fn is_blank(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0).is_some_and(|cell| cell.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(ddl: &str) -> anyhow::Result<SqliteStore> {
        let store = SqliteStore::open_in_memory()?;
        store.connection().execute_batch(ddl)?;
        Ok(store)
    }

    fn count(store: &SqliteStore, table: &str) -> anyhow::Result<i64> {
        let n = store
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
        Ok(n)
    }

    const STOPS: &str = "CREATE TABLE stops (stop_id TEXT PRIMARY KEY, stop_name TEXT, stop_desc TEXT);";
    const FREQUENCIES: &str = "CREATE TABLE frequencies (trip_id TEXT, headway_secs TEXT);";

    #[test]
    fn batches_are_flushed_at_the_configured_size() -> anyhow::Result<()> {
        let mut store = store_with(FREQUENCIES)?;
        let loader = TableLoader::new(KeyColumns::gtfs_default()).with_batch_size(3);

        let mut csv = String::from("trip_id,headway_secs\n");
        for i in 0..7 {
            csv.push_str(&format!("T{i},600\n"));
        }

        let report = loader.load_member(&mut store, "frequencies", csv.as_bytes())?;
        assert_eq!(report.rows, 7);
        assert_eq!(report.batches, 3);
        assert_eq!(report.mode, WriteMode::Insert);
        assert_eq!(count(&store, "frequencies")?, 7);
        Ok(())
    }

    #[test]
    fn exact_multiple_of_batch_size() -> anyhow::Result<()> {
        let mut store = store_with(STOPS)?;
        let loader = TableLoader::new(KeyColumns::gtfs_default()).with_batch_size(2);
        let csv = "stop_id,stop_name\nA,a\nB,b\nC,c\nD,d\n";

        let report = loader.load_member(&mut store, "stops", csv.as_bytes())?;
        assert_eq!(report.batches, 2);
        assert_eq!(report.mode, WriteMode::Upsert);
        assert_eq!(count(&store, "stops")?, 4);
        Ok(())
    }

    #[test]
    fn upsert_deduplicates_within_a_member() -> anyhow::Result<()> {
        let mut store = store_with(STOPS)?;
        let loader = TableLoader::new(KeyColumns::gtfs_default()).with_batch_size(2);
        let csv = "stop_id,stop_name\nA,first\nB,b\nA,second\n";

        let report = loader.load_member(&mut store, "stops", csv.as_bytes())?;
        assert_eq!(report.rows, 3);
        assert_eq!(count(&store, "stops")?, 2);
        let name: String = store.connection().query_row(
            "SELECT stop_name FROM stops WHERE stop_id = 'A'",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(name, "second");
        Ok(())
    }

    #[test]
    fn empty_cells_and_short_rows_become_null() -> anyhow::Result<()> {
        let mut store = store_with(STOPS)?;
        let loader = TableLoader::new(KeyColumns::gtfs_default());
        let csv = "stop_id,stop_name,stop_desc\nA,,desc\nB\n";

        loader.load_member(&mut store, "stops", csv.as_bytes())?;

        let conn = store.connection();
        let nulls: i64 = conn.query_row(
            "SELECT COUNT(*) FROM stops WHERE stop_name IS NULL",
            [],
            |r| r.get(0),
        )?;
        let empties: i64 =
            conn.query_row("SELECT COUNT(*) FROM stops WHERE stop_name = ''", [], |r| r.get(0))?;
        let desc: Option<String> =
            conn.query_row("SELECT stop_desc FROM stops WHERE stop_id = 'B'", [], |r| r.get(0))?;
        assert_eq!(nulls, 2);
        assert_eq!(empties, 0);
        assert_eq!(desc, None);
        Ok(())
    }

    #[test]
    fn delimiter_only_rows_load_as_all_null() -> anyhow::Result<()> {
        let mut store = store_with(FREQUENCIES)?;
        let loader = TableLoader::new(KeyColumns::gtfs_default());
        let csv = "trip_id,headway_secs\nT1,1\n,\n  , \n";

        let report = loader.load_member(&mut store, "frequencies", csv.as_bytes())?;
        assert_eq!(report.rows, 3);
        assert_eq!(count(&store, "frequencies")?, 3);
        let all_null: i64 = store.connection().query_row(
            "SELECT COUNT(*) FROM frequencies WHERE trip_id IS NULL AND headway_secs IS NULL",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(all_null, 1);
        Ok(())
    }

    #[test]
    fn bom_and_blank_lines_are_tolerated() -> anyhow::Result<()> {
        let mut store = store_with(STOPS)?;
        let loader = TableLoader::new(KeyColumns::gtfs_default());
        let csv = "\u{feff}stop_id , stop_name\n\nA,a\n   \nB,b\n";

        let report = loader.load_member(&mut store, "stops", csv.as_bytes())?;
        assert_eq!(report.rows, 2);
        assert_eq!(report.mode, WriteMode::Upsert);
        assert_eq!(count(&store, "stops")?, 2);
        Ok(())
    }

    #[test]
    fn empty_member_writes_nothing() -> anyhow::Result<()> {
        let mut store = store_with(STOPS)?;
        let loader = TableLoader::new(KeyColumns::gtfs_default());

        let report = loader.load_member(&mut store, "stops", &b""[..])?;
        assert_eq!(report.mode, WriteMode::Skipped);
        assert_eq!(report.batches, 0);
        Ok(())
    }

    #[test]
    fn unknown_columns_and_unknown_tables_are_skipped() -> anyhow::Result<()> {
        let mut store = store_with(STOPS)?;
        let loader = TableLoader::new(KeyColumns::gtfs_default());

        let report = loader.load_member(&mut store, "stops", "foo,bar\n1,2\n".as_bytes())?;
        assert_eq!(report.mode, WriteMode::Skipped);
        assert_eq!(count(&store, "stops")?, 0);

        let report = loader.load_member(&mut store, "pathways", "pathway_id\nP1\n".as_bytes())?;
        assert_eq!(report.mode, WriteMode::Skipped);
        Ok(())
    }

    #[test]
    fn invalid_utf8_rolls_back_the_member() -> anyhow::Result<()> {
        let mut store = store_with(STOPS)?;
        let loader = TableLoader::new(KeyColumns::gtfs_default()).with_batch_size(1);
        let mut bytes = b"stop_id,stop_name\nA,a\nB,".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);

        let err = loader
            .load_member(&mut store, "stops", bytes.as_slice())
            .unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
        assert_eq!(err.table(), Some("stops"));
        assert_eq!(count(&store, "stops")?, 0);
        Ok(())
    }

    #[test]
    fn constraint_failure_rolls_back_the_member() -> anyhow::Result<()> {
        let mut store =
            store_with("CREATE TABLE frequencies (trip_id TEXT NOT NULL, headway_secs TEXT);")?;
        let loader = TableLoader::new(KeyColumns::gtfs_default()).with_batch_size(1);
        let csv = "trip_id,headway_secs\nT1,600\n,300\n";

        let err = loader
            .load_member(&mut store, "frequencies", csv.as_bytes())
            .unwrap_err();
        assert!(matches!(err, LoadError::Write { .. }));
        assert_eq!(count(&store, "frequencies")?, 0);
        Ok(())
    }

    #[test]
    fn batch_size_has_a_floor_of_one() {
        let loader = TableLoader::new(KeyColumns::default()).with_batch_size(0);
        assert_eq!(loader.batch_size(), 1);
    }
}
