//! Shared helpers for the analytics engine integration tests.

pub mod containers;
pub mod fixtures;
pub mod setup;
