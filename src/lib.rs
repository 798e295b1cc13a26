//! Streaming HTML link annotation backed by a cache state store.
//!
//! Outbound links in HTML responses are marked with the location and date of a
//! captured copy and the fallback behavior a client script should apply when
//! the live page is unreachable. Links the store has never seen are queued for
//! capture.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
