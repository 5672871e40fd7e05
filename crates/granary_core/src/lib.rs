//! Generic data-access layer: typed repositories over a unit of work.
//!
//! Entities are plain serde structs persisted as records in named entity
//! sets. A [`UnitOfWork`] owns one persistence session and the ambient
//! transaction; [`Repository`] instances borrow it and expose CRUD,
//! predicate queries, pagination and eager relation loading. The bundled
//! engine stores records in SQLite; the [`Session`] trait keeps the layer
//! open to other engines and to test doubles.

pub mod logging;
pub mod model;
pub mod repo;
pub mod session;
pub mod uow;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{Entity, EntityId};
pub use model::link::Link;
pub use repo::{Page, PageRequest, RepoError, RepoResult, Repository};
pub use session::{RawRecord, Session, SessionError, SessionResult, SqliteSession};
pub use uow::{UnitOfWork, UnitOfWorkError, UowResult};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
