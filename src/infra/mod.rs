//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod stream;
pub mod telemetry;
