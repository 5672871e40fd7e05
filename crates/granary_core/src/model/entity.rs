//! Structural entity contract.
//!
//! # Responsibility
//! - Name the entity set a type is stored in.
//! - Expose the stable identity used for direct lookup.
//!
//! # Invariants
//! - `SET_NAME` is constant for a type and unique within one store.
//! - `entity_id()` never changes over an entity instance's lifetime.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Stable identifier for every stored entity.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
/// Identifiers are globally unique across entity sets, so a relation
/// reference can be resolved without knowing the target set.
pub type EntityId = Uuid;

/// Capability set an entity type satisfies to be managed by a repository.
///
/// The contract is structural: any record type with a stable identity and a
/// serde representation qualifies. Row/struct mapping is not part of this
/// layer; serde is the codec the bundled engine persists.
///
/// ```
/// use granary_core::{Entity, EntityId};
/// use serde::{Deserialize, Serialize};
/// use uuid::Uuid;
///
/// #[derive(Serialize, Deserialize)]
/// struct Grower {
///     id: EntityId,
///     name: String,
/// }
///
/// impl Entity for Grower {
///     const SET_NAME: &'static str = "growers";
///
///     fn entity_id(&self) -> EntityId {
///         self.id
///     }
/// }
///
/// let grower = Grower { id: Uuid::new_v4(), name: "Ines".into() };
/// assert_eq!(grower.entity_id(), grower.id);
/// ```
pub trait Entity: Serialize + DeserializeOwned {
    /// Name of the entity set this type is stored in.
    const SET_NAME: &'static str;

    /// Returns the stable identity of this instance.
    fn entity_id(&self) -> EntityId;
}
