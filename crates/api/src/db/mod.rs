//! Database operations for the patient record store.
//!
//! ## Tables
//!
//! - `nutritionists` - Owners of patients (managed outside this service)
//! - `patients` - Patient profile rows, primary key = identity user id
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p nutri-cli -- migrate
//! ```

pub mod patients;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use nutri_core::{NewPatient, PatientId, PatientRecord};

pub use patients::PgPatientStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Unique constraint violation (e.g., duplicate email or id).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Referential constraint violation (e.g., unknown nutritionist).
    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// Persistence for patient rows.
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Insert a patient row keyed by the identity id and return it as stored.
    async fn insert(
        &self,
        id: &PatientId,
        patient: &NewPatient,
    ) -> Result<PatientRecord, RepositoryError>;

    /// Fetch a patient row by id.
    async fn find_by_id(&self, id: &PatientId) -> Result<Option<PatientRecord>, RepositoryError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
