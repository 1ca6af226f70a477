//! Nutri Core - Shared types library.
//!
//! This crate provides the types shared by every Nutri component:
//! - `api` - Patient provisioning HTTP service
//! - `cli` - Command-line tools for migrations and operator tasks
//! - `integration-tests` - Fakes and end-to-end checks
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP clients. The optional `postgres` feature adds sqlx
//! encode/decode impls for the newtypes.
//!
//! # Modules
//!
//! - [`types`] - IDs, emails, gender normalization, role claims, and the
//!   patient provisioning request/record

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
