//! CLI command implementations.

pub mod identity;
pub mod migrate;
pub mod patient;
