//! Nutri patient provisioning service.
//!
//! Provisions a patient in three steps against two systems that share no
//! transaction: a login identity on the identity platform, a profile row in
//! `PostgreSQL` keyed by that identity, and an invitation email. A failed
//! row insert deletes the identity again.
//!
//! The crate is a library so the router and workflow can be exercised with
//! in-memory gateways; `main.rs` wires the real ones.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use error::AppError;
pub use routes::app;
pub use state::AppState;
