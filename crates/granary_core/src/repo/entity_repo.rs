//! Typed repository over one entity set of a unit of work.
//!
//! # Responsibility
//! - Encode and decode entity bodies at the session boundary.
//! - Run predicate queries over fully-detached, decoded values.
//! - Stage writes and flush them within the ambient transaction policy.
//!
//! # Invariants
//! - The session borrow is released before predicates run; predicates may
//!   re-enter the repository.
//! - Results follow record-creation order.
//! - Writes are full-record; partial updates do not exist.

use super::{Page, PageRequest, RepoError, RepoResult};
use crate::model::entity::{Entity, EntityId};
use crate::session::Session;
use crate::uow::UnitOfWork;
use serde_json::Value;
use std::cell::RefMut;
use std::marker::PhantomData;

/// Entity-set facade bound to a unit of work for its whole life.
///
/// A repository borrows its unit of work, so it can never outlive it, and it
/// holds no disposal rights over the shared session. Reads return owned,
/// detached values; nothing is loaded lazily.
#[derive(Debug)]
pub struct Repository<'uow, T: Entity> {
    uow: &'uow UnitOfWork,
    set_name: &'static str,
    _entity: PhantomData<fn() -> T>,
}

impl<'uow, T: Entity> Repository<'uow, T> {
    /// Binds a repository for `T`'s entity set.
    ///
    /// Fails with `SessionClosed` when the unit of work has already been
    /// disposed.
    pub fn new(uow: &'uow UnitOfWork) -> RepoResult<Self> {
        if !uow.is_open() {
            return Err(RepoError::SessionClosed);
        }
        Ok(Self {
            uow,
            set_name: T::SET_NAME,
            _entity: PhantomData,
        })
    }

    pub fn set_name(&self) -> &'static str {
        self.set_name
    }

    /// Direct identity lookup.
    ///
    /// Reads through to the store; changes staged but not yet flushed are
    /// not visible.
    pub fn get_by_id(&self, id: EntityId) -> RepoResult<Option<T>> {
        let raw = {
            let session = self.session()?;
            session.get(self.set_name, id)?
        };
        match raw {
            Some(record) => Ok(Some(self.decode(record.body)?)),
            None => Ok(None),
        }
    }

    /// Every entity in the set, in creation order, includes expanded.
    pub fn all(&self, includes: &[&str]) -> RepoResult<Vec<T>> {
        self.load_all(includes)
    }

    /// First entity matching `predicate`, in creation order.
    pub fn find_one(
        &self,
        predicate: impl Fn(&T) -> bool,
        includes: &[&str],
    ) -> RepoResult<Option<T>> {
        Ok(self
            .load_all(includes)?
            .into_iter()
            .find(|entity| predicate(entity)))
    }

    /// All entities matching `predicate`, in creation order.
    pub fn filter(
        &self,
        predicate: impl Fn(&T) -> bool,
        includes: &[&str],
    ) -> RepoResult<Vec<T>> {
        Ok(self
            .load_all(includes)?
            .into_iter()
            .filter(|entity| predicate(entity))
            .collect())
    }

    /// One page of the filtered set plus the pre-pagination match total.
    ///
    /// The whole set is materialized and filtered before the page is cut,
    /// so `total` always counts every match, on any page. A page starting
    /// past the last match is empty and still carries the true total.
    pub fn filter_page(
        &self,
        predicate: impl Fn(&T) -> bool,
        page: PageRequest,
        includes: &[&str],
    ) -> RepoResult<Page<T>> {
        if page.size == 0 {
            return Err(RepoError::ZeroPageSize);
        }

        let matched: Vec<T> = self
            .load_all(includes)?
            .into_iter()
            .filter(|entity| predicate(entity))
            .collect();
        let total = matched.len();

        let size = page.size as usize;
        let skip = page.skip();
        let items: Vec<T> = if skip == 0 {
            matched.into_iter().take(size).collect()
        } else {
            matched.into_iter().skip(skip).take(size).collect()
        };

        Ok(Page { items, total })
    }

    /// Persists a new entity and returns the stored record, read back.
    ///
    /// An id collision surfaces as the engine's constraint violation.
    pub fn create(&self, entity: &T) -> RepoResult<T> {
        let id = entity.entity_id();
        let body = self.encode(entity)?;
        {
            let mut session = self.session()?;
            session.add(self.set_name, id, body)?;
            session.flush()?;
        }
        match self.get_by_id(id)? {
            Some(persisted) => Ok(persisted),
            None => Err(RepoError::NotFound(id)),
        }
    }

    /// Replaces the stored record with `entity`, whole-body.
    ///
    /// Fields absent from `entity` are gone after the update; there is no
    /// field-level merge. Updating a record that does not exist is
    /// `NotFound`.
    pub fn update(&self, entity: &T) -> RepoResult<usize> {
        let id = entity.entity_id();
        let body = self.encode(entity)?;
        let affected = {
            let mut session = self.session()?;
            session.mark_modified(self.set_name, id, body)?;
            session.flush()?
        };
        if affected == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(affected)
    }

    /// Removes the entity's record. Links held by other records are left
    /// as dangling stubs; nothing cascades.
    pub fn delete(&self, entity: &T) -> RepoResult<usize> {
        let id = entity.entity_id();
        let affected = {
            let mut session = self.session()?;
            session.mark_removed(self.set_name, id)?;
            session.flush()?
        };
        if affected == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(affected)
    }

    /// Removes every entity matching `predicate` in one flush.
    ///
    /// Zero matches is an ordinary `Ok(0)`.
    pub fn delete_where(&self, predicate: impl Fn(&T) -> bool) -> RepoResult<usize> {
        let matches: Vec<EntityId> = self
            .load_all(&[])?
            .into_iter()
            .filter(|entity| predicate(entity))
            .map(|entity| entity.entity_id())
            .collect();
        if matches.is_empty() {
            return Ok(0);
        }

        let mut session = self.session()?;
        for id in &matches {
            session.mark_removed(self.set_name, *id)?;
        }
        let affected = session.flush()?;
        Ok(affected)
    }

    /// Whether any entity matches `predicate`.
    pub fn contains(&self, predicate: impl Fn(&T) -> bool) -> RepoResult<bool> {
        Ok(self
            .load_all(&[])?
            .iter()
            .any(|entity| predicate(entity)))
    }

    /// Runs a raw parametrized statement against the store, side effects
    /// only. Parameters bind positionally from JSON values.
    pub fn execute_raw(&self, sql: &str, params: &[Value]) -> RepoResult<()> {
        let mut session = self.session()?;
        session.execute_raw(sql, params)?;
        Ok(())
    }

    /// Writes all staged session changes and returns the affected count.
    pub fn flush(&self) -> RepoResult<usize> {
        let mut session = self.session()?;
        Ok(session.flush()?)
    }

    fn session(&self) -> RepoResult<RefMut<'uow, dyn Session>> {
        self.uow.session_mut().ok_or(RepoError::SessionClosed)
    }

    fn load_all(&self, includes: &[&str]) -> RepoResult<Vec<T>> {
        let raw = {
            let session = self.session()?;
            session.scan(self.set_name, includes)?
        };
        raw.into_iter()
            .map(|record| self.decode(record.body))
            .collect()
    }

    fn decode(&self, body: Value) -> RepoResult<T> {
        serde_json::from_value(body)
            .map_err(|err| RepoError::InvalidData(format!("set `{}`: {err}", self.set_name)))
    }

    fn encode(&self, entity: &T) -> RepoResult<Value> {
        serde_json::to_value(entity)
            .map_err(|err| RepoError::InvalidData(format!("set `{}`: {err}", self.set_name)))
    }
}
