//! Generic repository surface over units of work.
//!
//! # Responsibility
//! - Expose typed CRUD, predicate query and pagination APIs per entity set.
//! - Keep session and record-codec details out of caller code.
//!
//! # Invariants
//! - Every operation reports failure through `RepoResult`; absence is
//!   `Ok(None)` or a zero count, never an error.
//! - Repositories never dispose the shared session; that right is the
//!   unit of work's alone.

use crate::model::entity::EntityId;
use crate::session::SessionError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entity_repo;

pub use entity_repo::Repository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Session(SessionError),
    SessionClosed,
    NotFound(EntityId),
    InvalidData(String),
    ZeroPageSize,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session(err) => write!(f, "{err}"),
            Self::SessionClosed => write!(f, "unit of work is closed"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record: {message}"),
            Self::ZeroPageSize => write!(f, "page size must be greater than zero"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Session(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionError> for RepoError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

/// Zero-based page coordinates: `index` picks the page, `size` its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub index: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(index: u32, size: u32) -> Self {
        Self { index, size }
    }

    /// Records skipped before the page starts.
    pub fn skip(&self) -> usize {
        self.index as usize * self.size as usize
    }
}

/// One page of matches plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}
