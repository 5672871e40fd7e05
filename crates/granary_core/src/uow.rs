//! Unit of work: session ownership, transaction boundary, disposal.
//!
//! # Responsibility
//! - Own exactly one persistence session and hand it to bound repositories.
//! - Carry the single ambient transaction and its start/commit lifecycle.
//! - Dispose the session exactly once, rolling back uncommitted work.
//!
//! # Invariants
//! - At most one transaction is active per unit of work; a second start is
//!   an error, not a nested scope.
//! - `commit` flushes staged changes before committing.
//! - `close` is idempotent and never panics; repositories never dispose the
//!   shared session themselves.

use crate::session::{Session, SessionError, SqliteSession};
use log::{error, info};
use std::cell::{Cell, RefCell, RefMut};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

pub type UowResult<T> = Result<T, UnitOfWorkError>;

/// Lifecycle and transaction errors of a unit of work.
#[derive(Debug)]
pub enum UnitOfWorkError {
    Initialization(SessionError),
    Closed,
    TransactionAlreadyActive,
    TransactionNotStarted,
    Session(SessionError),
}

impl Display for UnitOfWorkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialization(err) => write!(f, "store initialization failed: {err}"),
            Self::Closed => write!(f, "unit of work is closed"),
            Self::TransactionAlreadyActive => write!(f, "a transaction is already active"),
            Self::TransactionNotStarted => write!(f, "no transaction has been started"),
            Self::Session(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UnitOfWorkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Initialization(err) => Some(err),
            Self::Session(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionError> for UnitOfWorkError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

/// Owner of one persistence session and its ambient transaction.
///
/// The session slot uses interior mutability so every operation takes
/// `&self`; the type is deliberately not `Sync`. Work is synchronous and
/// single-threaded per unit of work, while independent instances over the
/// same file store coexist under the engine's own isolation.
pub struct UnitOfWork {
    session: RefCell<Option<Box<dyn Session>>>,
    tx_active: Cell<bool>,
}

impl UnitOfWork {
    /// Opens a unit of work over a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> UowResult<Self> {
        let session = SqliteSession::open(path).map_err(UnitOfWorkError::Initialization)?;
        Ok(Self::from_session(Box::new(session)))
    }

    /// Opens a unit of work over a private in-memory store.
    pub fn open_in_memory() -> UowResult<Self> {
        let session =
            SqliteSession::open_in_memory().map_err(UnitOfWorkError::Initialization)?;
        Ok(Self::from_session(Box::new(session)))
    }

    /// Wraps an already-open session.
    pub fn from_session(session: Box<dyn Session>) -> Self {
        Self {
            session: RefCell::new(Some(session)),
            tx_active: Cell::new(false),
        }
    }

    /// Replaces the owned session, closing the previous one best-effort.
    pub fn set_session(&self, session: Box<dyn Session>) {
        let previous = self.session.borrow_mut().replace(session);
        self.tx_active.set(false);
        if let Some(mut old) = previous {
            if let Err(err) = old.close() {
                error!(
                    "event=uow_set_session module=uow status=error detail=previous_close_failed error={err}"
                );
            }
        }
    }

    /// Borrows the owned session for one operation; `None` once closed.
    ///
    /// The borrow must be released before the next call that needs the
    /// session; holding it across calls is a caller contract violation and
    /// panics.
    pub fn session_mut(&self) -> Option<RefMut<'_, dyn Session>> {
        RefMut::filter_map(self.session.borrow_mut(), |slot| {
            slot.as_deref_mut().map(|session| session as &mut dyn Session)
        })
        .ok()
    }

    pub fn is_open(&self) -> bool {
        self.session.borrow().is_some()
    }

    pub fn is_in_transaction(&self) -> bool {
        self.tx_active.get()
    }

    /// Starts the ambient transaction.
    ///
    /// Staged and flushed changes from this point on take effect only on
    /// `commit`; closing without committing rolls them back.
    pub fn start_transaction(&self) -> UowResult<()> {
        if self.tx_active.get() {
            return Err(UnitOfWorkError::TransactionAlreadyActive);
        }
        let mut session = self.session_mut().ok_or(UnitOfWorkError::Closed)?;
        session.begin()?;
        drop(session);
        self.tx_active.set(true);
        Ok(())
    }

    /// Flushes staged changes and commits the ambient transaction.
    ///
    /// On failure the transaction stays active, so a later `close` still
    /// rolls it back.
    pub fn commit(&self) -> UowResult<()> {
        if !self.tx_active.get() {
            return Err(UnitOfWorkError::TransactionNotStarted);
        }
        let started_at = Instant::now();

        let outcome = self
            .session_mut()
            .ok_or(UnitOfWorkError::Closed)
            .and_then(|mut session| {
                let flushed = session.flush()?;
                session.commit()?;
                Ok(flushed)
            });

        match outcome {
            Ok(flushed) => {
                self.tx_active.set(false);
                info!(
                    "event=uow_commit module=uow status=ok flushed={flushed} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!("event=uow_commit module=uow status=error error={err}");
                Err(err)
            }
        }
    }

    /// Releases the session, rolling back any still-active transaction.
    ///
    /// Safe to call any number of times; failures are logged, never raised.
    pub fn close(&self) {
        let taken = match self.session.try_borrow_mut() {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                error!("event=uow_close module=uow status=error detail=session_borrowed");
                return;
            }
        };
        let Some(mut session) = taken else {
            return;
        };

        let rolled_back = self.tx_active.replace(false);
        match session.close() {
            Ok(()) => info!("event=uow_close module=uow status=ok rolled_back={rolled_back}"),
            Err(err) => {
                error!(
                    "event=uow_close module=uow status=error rolled_back={rolled_back} error={err}"
                );
            }
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("open", &self.is_open())
            .field("tx_active", &self.tx_active.get())
            .finish_non_exhaustive()
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.close();
    }
}
