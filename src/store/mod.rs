// src/store/mod.rs
use rusqlite::{params_from_iter, Connection, Transaction};
use std::path::Path;
use tracing::trace;

use crate::schema::{ColumnSet, ProjectedHeader, UpsertPolicy};

pub mod init;

pub use init::init_schema;

/// A projected row ready to bind: one value per projected column.
pub type Row = Vec<Option<String>>;

/// SQLite destination. One load owns the connection at a time.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> rusqlite::Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Columns the live schema defines for `table`. A table that does not
    /// exist yields an empty set.
    pub fn table_columns(&self, table: &str) -> rusqlite::Result<ColumnSet> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ColumnSet::new(names))
    }

    /// Begin the transaction a member load runs in. Dropping it without
    /// committing rolls back.
    pub fn transaction(&mut self) -> rusqlite::Result<Transaction<'_>> {
        self.conn.transaction()
    }

    /// Write every row of `rows` through `stmt`, in order.
    pub fn write_batch(
        tx: &Transaction<'_>,
        stmt: &InsertStatement,
        rows: &[Row],
    ) -> rusqlite::Result<usize> {
        let mut prepared = tx.prepare_cached(stmt.sql())?;
        let mut written = 0;
        for row in rows {
            written += prepared.execute(params_from_iter(row.iter()))?;
        }
        trace!(rows = rows.len(), written, "batch written");
        Ok(written)
    }
}

/// Parameterized INSERT for one member, optionally with an upsert clause.
/// Built once per member; only identifiers are spliced into the text.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    sql: String,
}

impl InsertStatement {
    pub fn new(table: &str, header: &ProjectedHeader, policy: &UpsertPolicy) -> Self {
        let columns = quote_list(header.names());
        let placeholders = (1..=header.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(",");
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns,
            placeholders
        );

        if policy.is_upsert() {
            let target = quote_list(policy.conflict_target());
            if policy.updatable().is_empty() {
                sql.push_str(&format!(" ON CONFLICT ({target}) DO NOTHING"));
            } else {
                let set = policy
                    .updatable()
                    .iter()
                    .map(|c| {
                        let q = quote_ident(c);
                        format!("{q} = excluded.{q}")
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                sql.push_str(&format!(" ON CONFLICT ({target}) DO UPDATE SET {set}"));
            }
        }

        Self { sql }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Double-quote an identifier, doubling any embedded quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(",")
}
