use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::error::{LoadError, Result};

/// Create `db_path` (and its parent directory) if needed and run the DDL in
/// `ddl_path` inside a single transaction.
pub fn init_schema(db_path: &Path, ddl_path: &Path) -> Result<()> {
    let ddl = fs::read_to_string(ddl_path).map_err(|source| LoadError::SchemaFile {
        path: ddl_path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| LoadError::SchemaFile {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut conn = Connection::open(db_path)?;
    apply_ddl(&mut conn, &ddl).inspect_err(|e| {
        error!(error = %e, "failed to initialize schema");
    })?;

    info!(db = %db_path.display(), schema = %ddl_path.display(), "schema ensured");
    Ok(())
}

/// Execute `ddl` atomically on an open connection.
pub fn apply_ddl(conn: &mut Connection, ddl: &str) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(ddl)?;
    tx.commit()?;
    Ok(())
}
