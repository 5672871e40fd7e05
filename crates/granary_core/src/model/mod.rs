//! Entity contract shared by the session and repository layers.
//!
//! # Responsibility
//! - Define the structural capability set an entity type must satisfy.
//! - Define the typed relation reference used for eager loading.
//!
//! # Invariants
//! - Every entity carries exactly one stable `EntityId` for its lifetime.
//! - Relations persist as id references, never as embedded child bodies.

pub mod entity;
pub mod link;
