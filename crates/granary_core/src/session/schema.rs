//! Store schema registry and bootstrap.
//!
//! # Responsibility
//! - Register store schema revisions in strictly increasing order.
//! - Bring a fresh or older store up to the latest revision atomically.
//!
//! # Invariants
//! - The applied revision is mirrored to `PRAGMA user_version`.
//! - A store written by a newer build is rejected, never half-read.

use super::{SessionError, SessionResult};
use rusqlite::Connection;

const REVISIONS: &[(u32, &str)] = &[(1, include_str!("migrations/0001_records.sql"))];

/// Returns the latest schema revision known by this build.
pub fn latest_version() -> u32 {
    REVISIONS.last().map_or(0, |(version, _)| *version)
}

/// Applies all pending schema revisions on the provided connection.
pub fn apply_schema(conn: &mut Connection) -> SessionResult<()> {
    let current = current_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(SessionError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in REVISIONS {
        if *version > current {
            tx.execute_batch(sql)?;
        }
    }
    tx.execute_batch(&format!("PRAGMA user_version = {latest};"))?;
    tx.commit()?;

    Ok(())
}

fn current_version(conn: &Connection) -> SessionResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
