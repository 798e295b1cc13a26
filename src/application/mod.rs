//! Application services: link scanning, annotation, chunk rewriting and the
//! per-request pipeline, plus the store contract they depend on.

pub mod annotation;
pub mod delivery;
pub mod error;
pub mod pipeline;
pub mod repos;
pub mod rewrite;
pub mod scanner;

#[cfg(test)]
pub(crate) mod testing;
