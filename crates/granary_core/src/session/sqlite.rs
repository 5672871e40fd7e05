//! SQLite-backed persistence session.
//!
//! # Responsibility
//! - Own the store connection and its ambient transaction state.
//! - Apply staged entity changes on flush, atomically when autonomous.
//! - Materialize eager includes while scanning.
//!
//! # Invariants
//! - Scans return records in creation order.
//! - Every read returns detached owned data; closing the session never
//!   invalidates values already handed out.
//! - `close` rolls back an open transaction, never commits it.

use super::schema::apply_schema;
use super::{RawRecord, Session, SessionError, SessionResult};
use crate::model::entity::EntityId;
use log::{error, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Statement};
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};
use uuid::Uuid;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Entity change staged in a session, pending the next flush.
#[derive(Debug)]
enum StagedChange {
    Insert {
        set: String,
        id: EntityId,
        body: Value,
    },
    Update {
        set: String,
        id: EntityId,
        body: Value,
    },
    Remove {
        set: String,
        id: EntityId,
    },
}

impl StagedChange {
    fn targets(&self, set: &str, id: EntityId) -> bool {
        match self {
            Self::Insert { set: s, id: i, .. }
            | Self::Update { set: s, id: i, .. }
            | Self::Remove { set: s, id: i } => s == set && *i == id,
        }
    }
}

/// Persistence session over a single SQLite connection.
///
/// Records are stored as JSON bodies in per-set partitions of one `records`
/// table. File-backed stores run in WAL mode, so independent sessions on the
/// same store read a consistent snapshot while one writer holds a
/// transaction.
#[derive(Debug)]
pub struct SqliteSession {
    conn: Option<Connection>,
    staged: Vec<StagedChange>,
    tx_open: bool,
}

impl SqliteSession {
    /// Opens a file-backed store, creating and migrating it as needed.
    pub fn open(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref().to_path_buf();
        Self::open_inner("file", true, move || Connection::open(path))
    }

    /// Opens a volatile in-memory store, private to this session.
    pub fn open_in_memory() -> SessionResult<Self> {
        Self::open_inner("memory", false, Connection::open_in_memory)
    }

    fn open_inner(
        mode: &str,
        wal: bool,
        open: impl FnOnce() -> rusqlite::Result<Connection>,
    ) -> SessionResult<Self> {
        let started_at = Instant::now();
        info!("event=session_open module=session status=start mode={mode}");

        let opened = open().map_err(SessionError::from).and_then(|mut conn| {
            bootstrap(&mut conn, wal)?;
            Ok(conn)
        });

        match opened {
            Ok(conn) => {
                info!(
                    "event=session_open module=session status=ok mode={mode} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(Self {
                    conn: Some(conn),
                    staged: Vec::new(),
                    tx_open: false,
                })
            }
            Err(err) => {
                error!(
                    "event=session_open module=session status=error mode={mode} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn conn(&self) -> SessionResult<&Connection> {
        self.conn.as_ref().ok_or(SessionError::Closed)
    }
}

impl Session for SqliteSession {
    fn get(&self, set: &str, id: EntityId) -> SessionResult<Option<RawRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT body FROM records WHERE id = ?1 AND set_name = ?2;")?;
        let mut rows = stmt.query(params![id.to_string(), set])?;

        if let Some(row) = rows.next()? {
            let body_text: String = row.get(0)?;
            return Ok(Some(RawRecord {
                id,
                body: parse_body(&body_text, &id.to_string())?,
            }));
        }

        Ok(None)
    }

    fn scan(&self, set: &str, includes: &[&str]) -> SessionResult<Vec<RawRecord>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, body FROM records WHERE set_name = ?1 ORDER BY rowid ASC;")?;
        let mut rows = stmt.query([set])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            let body_text: String = row.get(1)?;
            records.push(RawRecord {
                id: parse_record_id(&id_text)?,
                body: parse_body(&body_text, &id_text)?,
            });
        }

        if !includes.is_empty() {
            let mut lookup = conn.prepare("SELECT body FROM records WHERE id = ?1;")?;
            for relation in includes {
                for record in &mut records {
                    expand_relation(&mut record.body, relation, &mut lookup)?;
                }
            }
        }

        Ok(records)
    }

    fn add(&mut self, set: &str, id: EntityId, body: Value) -> SessionResult<()> {
        self.conn()?;
        self.staged.push(StagedChange::Insert {
            set: set.to_string(),
            id,
            body,
        });
        Ok(())
    }

    fn mark_modified(&mut self, set: &str, id: EntityId, body: Value) -> SessionResult<()> {
        self.conn()?;
        self.staged.push(StagedChange::Update {
            set: set.to_string(),
            id,
            body,
        });
        Ok(())
    }

    fn mark_removed(&mut self, set: &str, id: EntityId) -> SessionResult<()> {
        self.conn()?;
        self.staged.push(StagedChange::Remove {
            set: set.to_string(),
            id,
        });
        Ok(())
    }

    fn detach(&mut self, set: &str, id: EntityId) -> SessionResult<()> {
        self.conn()?;
        self.staged.retain(|change| !change.targets(set, id));
        Ok(())
    }

    fn flush(&mut self) -> SessionResult<usize> {
        // Staged changes are consumed by the attempt, applied or not.
        let staged = std::mem::take(&mut self.staged);
        let autonomous = !self.tx_open;
        let conn = self.conn()?;

        if staged.is_empty() {
            return Ok(0);
        }

        if autonomous {
            conn.execute_batch("BEGIN IMMEDIATE;")?;
        }

        match apply_staged(conn, &staged) {
            Ok(affected) => {
                if autonomous {
                    conn.execute_batch("COMMIT;")?;
                }
                Ok(affected)
            }
            Err(err) => {
                if autonomous {
                    if let Err(rollback_err) = conn.execute_batch("ROLLBACK;") {
                        error!(
                            "event=flush module=session status=error detail=rollback_failed error={rollback_err}"
                        );
                    }
                }
                error!(
                    "event=flush module=session status=error staged={} error={err}",
                    staged.len()
                );
                Err(err)
            }
        }
    }

    fn begin(&mut self) -> SessionResult<()> {
        self.conn()?.execute_batch("BEGIN IMMEDIATE;")?;
        self.tx_open = true;
        Ok(())
    }

    fn commit(&mut self) -> SessionResult<()> {
        self.conn()?.execute_batch("COMMIT;")?;
        self.tx_open = false;
        Ok(())
    }

    fn rollback(&mut self) -> SessionResult<()> {
        if !self.tx_open {
            return Ok(());
        }
        self.conn()?.execute_batch("ROLLBACK;")?;
        self.tx_open = false;
        Ok(())
    }

    fn execute_raw(&mut self, sql: &str, params: &[Value]) -> SessionResult<usize> {
        let conn = self.conn()?;
        let bound = params
            .iter()
            .map(bind_parameter)
            .collect::<SessionResult<Vec<SqlValue>>>()?;

        let mut stmt = conn.prepare(sql)?;
        let affected = stmt.execute(params_from_iter(bound))?;
        Ok(affected)
    }

    fn close(&mut self) -> SessionResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.staged.clear();

        if self.tx_open {
            self.tx_open = false;
            if let Err(err) = conn.execute_batch("ROLLBACK;") {
                error!(
                    "event=session_close module=session status=error detail=rollback_failed error={err}"
                );
            }
        }

        conn.close().map_err(|(_, err)| SessionError::Sqlite(err))?;
        Ok(())
    }
}

fn bootstrap(conn: &mut Connection, wal: bool) -> SessionResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if wal {
        // journal_mode reports the resulting mode as a result row
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    }
    apply_schema(conn)?;
    Ok(())
}

fn apply_staged(conn: &Connection, staged: &[StagedChange]) -> SessionResult<usize> {
    let mut affected = 0;
    for change in staged {
        affected += match change {
            StagedChange::Insert { set, id, body } => conn.execute(
                "INSERT INTO records (id, set_name, body) VALUES (?1, ?2, ?3);",
                params![id.to_string(), set, body.to_string()],
            )?,
            StagedChange::Update { set, id, body } => conn.execute(
                "UPDATE records SET body = ?3 WHERE id = ?1 AND set_name = ?2;",
                params![id.to_string(), set, body.to_string()],
            )?,
            StagedChange::Remove { set, id } => conn.execute(
                "DELETE FROM records WHERE id = ?1 AND set_name = ?2;",
                params![id.to_string(), set],
            )?,
        };
    }
    Ok(affected)
}

/// Replaces id references under `relation` with the bodies they point at.
///
/// Only uuid-shaped strings resolve; plain string fields, already-expanded
/// objects and references to missing records are left untouched.
fn expand_relation(
    body: &mut Value,
    relation: &str,
    lookup: &mut Statement<'_>,
) -> SessionResult<()> {
    let Some(slot) = body.get_mut(relation) else {
        return Ok(());
    };

    match slot {
        Value::String(_) => {
            if let Some(loaded) = resolve_reference(slot, lookup)? {
                *slot = loaded;
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Some(loaded) = resolve_reference(item, lookup)? {
                    *item = loaded;
                }
            }
        }
        _ => {}
    }

    Ok(())
}

fn resolve_reference(
    slot: &Value,
    lookup: &mut Statement<'_>,
) -> SessionResult<Option<Value>> {
    let Value::String(text) = slot else {
        return Ok(None);
    };
    if Uuid::parse_str(text).is_err() {
        return Ok(None);
    }

    let mut rows = lookup.query([text.as_str()])?;
    if let Some(row) = rows.next()? {
        let body_text: String = row.get(0)?;
        return parse_body(&body_text, text).map(Some);
    }

    Ok(None)
}

fn parse_record_id(text: &str) -> SessionResult<EntityId> {
    Uuid::parse_str(text)
        .map_err(|_| SessionError::InvalidData(format!("invalid record id `{text}`")))
}

fn parse_body(text: &str, id: &str) -> SessionResult<Value> {
    serde_json::from_str(text).map_err(|err| {
        SessionError::InvalidData(format!("record `{id}` holds a malformed body: {err}"))
    })
}

fn bind_parameter(value: &Value) -> SessionResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Ok(SqlValue::Integer(int))
            } else if number.as_u64().is_some() {
                // u64 values past i64::MAX would round through f64
                Err(SessionError::UnsupportedParameter(format!(
                    "integer `{number}` does not fit a signed 64-bit column"
                )))
            } else if let Some(real) = number.as_f64() {
                Ok(SqlValue::Real(real))
            } else {
                Err(SessionError::UnsupportedParameter(format!(
                    "number `{number}` has no 64-bit representation"
                )))
            }
        }
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        // compound values bind as their JSON text, the same encoding bodies use
        other => Ok(SqlValue::Text(other.to_string())),
    }
}
