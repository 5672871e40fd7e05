//! Persistence session boundary and the bundled SQLite engine.
//!
//! # Responsibility
//! - Define the session contract the repository layer consumes.
//! - Keep engine details (SQL, schema, staging) behind that contract.
//!
//! # Invariants
//! - Reads return fully detached data; nothing is lazily fetched later.
//! - Staged changes are only written by `flush`, never as a side effect of
//!   a read.
//! - A session is exclusively owned by one unit of work at a time.

use crate::model::entity::EntityId;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod schema;
mod sqlite;

pub use sqlite::SqliteSession;

pub type SessionResult<T> = Result<T, SessionError>;

/// Engine-level error for session lifecycle, staging and query execution.
#[derive(Debug)]
pub enum SessionError {
    /// Underlying SQLite failure (connection, statement, constraint).
    Sqlite(rusqlite::Error),
    /// Store schema was written by a newer build than this one supports.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The session was already released.
    Closed,
    /// Persisted record cannot be decoded into a usable body.
    InvalidData(String),
    /// Raw-statement parameter has no SQL representation.
    UnsupportedParameter(String),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "store schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Closed => write!(f, "session is closed"),
            Self::InvalidData(message) => write!(f, "invalid stored record: {message}"),
            Self::UnsupportedParameter(message) => {
                write!(f, "unsupported statement parameter: {message}")
            }
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::Closed => None,
            Self::InvalidData(_) => None,
            Self::UnsupportedParameter(_) => None,
        }
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// One stored record as the engine hands it out: stable id plus JSON body.
///
/// The body is always fully materialized; includes requested on the scan have
/// already been expanded in place.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: EntityId,
    pub body: Value,
}

/// Contract between a unit of work and the persistence engine it owns.
///
/// A session holds one open connection, a list of staged entity changes and
/// at most one ambient transaction. Implementations are synchronous and are
/// not required to be thread-safe; exclusive access is the caller's job.
pub trait Session {
    /// Direct identity lookup in one entity set.
    ///
    /// Reads through to the store: staged-but-unflushed changes are not
    /// visible until `flush` has run.
    fn get(&self, set: &str, id: EntityId) -> SessionResult<Option<RawRecord>>;

    /// Full entity-set scan in record-creation order.
    ///
    /// Relation names in `includes` are expanded in the given order before
    /// the records are returned; names that match no reference field are
    /// left untouched.
    fn scan(&self, set: &str, includes: &[&str]) -> SessionResult<Vec<RawRecord>>;

    /// Stages an insert of a new record.
    fn add(&mut self, set: &str, id: EntityId, body: Value) -> SessionResult<()>;

    /// Attaches a record and stages a full-body update for it.
    fn mark_modified(&mut self, set: &str, id: EntityId, body: Value) -> SessionResult<()>;

    /// Stages removal of a record.
    fn mark_removed(&mut self, set: &str, id: EntityId) -> SessionResult<()>;

    /// Drops every staged change for one record, leaving the store untouched.
    fn detach(&mut self, set: &str, id: EntityId) -> SessionResult<()>;

    /// Writes all staged changes in staging order and returns the total
    /// affected-row count.
    ///
    /// The staged list is consumed even when a statement fails. Without an
    /// ambient transaction the batch is applied atomically on its own;
    /// inside one, the changes simply join it.
    fn flush(&mut self) -> SessionResult<usize>;

    /// Opens the ambient transaction.
    fn begin(&mut self) -> SessionResult<()>;

    /// Commits the ambient transaction.
    fn commit(&mut self) -> SessionResult<()>;

    /// Rolls back the ambient transaction; a no-op when none is open.
    fn rollback(&mut self) -> SessionResult<()>;

    /// Executes a raw parametrized statement against the underlying
    /// connection, bypassing entity sets. Parameters bind positionally.
    fn execute_raw(&mut self, sql: &str, params: &[Value]) -> SessionResult<usize>;

    /// Rolls back any open transaction and releases the connection.
    /// Idempotent; every call after the first returns `Ok`.
    fn close(&mut self) -> SessionResult<()>;
}
