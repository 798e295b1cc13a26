//! Domain layer types and invariants.

pub mod behavior;
pub mod entities;
pub mod types;
