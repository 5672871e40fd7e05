//! Typed relation reference.
//!
//! # Responsibility
//! - Represent a relation field as either an id stub or a loaded child.
//! - Keep the persisted form a bare id so writing a parent never re-embeds
//!   child data.
//!
//! # Invariants
//! - Serialization always emits the id only, regardless of load state.
//! - Deserialization accepts an id string (stub) or an object (loaded).

use crate::model::entity::{Entity, EntityId};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Reference from one entity to another, named after the body field it lives in.
///
/// A freshly constructed or freshly stored reference is a stub holding only the
/// target id. An eager include on a query upgrades matching stubs to `Loaded`
/// values; references to rows that no longer exist stay stubs.
///
/// Use `Option<Link<T>>` for a to-one relation and `Vec<Link<T>>` for to-many.
#[derive(Debug, Clone, PartialEq)]
pub enum Link<T> {
    /// Unresolved reference; the persisted form.
    Id(EntityId),
    /// Materialized child produced by eager include expansion.
    Loaded(T),
}

impl<T: Entity> Link<T> {
    /// Creates a stub reference to the given entity id.
    pub fn to(id: EntityId) -> Self {
        Self::Id(id)
    }

    /// Returns the referenced entity id, loaded or not.
    pub fn id(&self) -> EntityId {
        match self {
            Self::Id(id) => *id,
            Self::Loaded(entity) => entity.entity_id(),
        }
    }

    /// Returns the loaded child, if this reference has been materialized.
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Loaded(entity) => Some(entity),
        }
    }

    /// Consumes the reference, returning the loaded child if present.
    pub fn into_loaded(self) -> Option<T> {
        match self {
            Self::Id(_) => None,
            Self::Loaded(entity) => Some(entity),
        }
    }

    /// Returns whether the reference has been materialized.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

impl<T: Entity> Serialize for Link<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.id().serialize(serializer)
    }
}

impl<'de, T: Entity> Deserialize<'de> for Link<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(text) => {
                let id = Uuid::parse_str(&text).map_err(|_| {
                    D::Error::custom(format!("invalid entity reference `{text}`"))
                })?;
                Ok(Self::Id(id))
            }
            serde_json::Value::Object(_) => {
                let entity = serde_json::from_value::<T>(value).map_err(D::Error::custom)?;
                Ok(Self::Loaded(entity))
            }
            other => Err(D::Error::custom(format!(
                "entity reference must be an id string or an object, got `{other}`"
            ))),
        }
    }
}
