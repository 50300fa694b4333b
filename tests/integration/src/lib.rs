//! Integration test utilities for the session server
//!
//! This crate provides helpers for running end-to-end tests against the
//! REST API over a real TCP listener, backed either by the in-memory
//! credential store or by PostgreSQL.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
