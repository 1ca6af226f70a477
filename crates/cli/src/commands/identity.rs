//! Identity role commands.
//!
//! # Usage
//!
//! ```bash
//! # Assign a role claim to an existing identity
//! nutri-cli identity set-role --id 7c1e... --role nutritionist
//! ```
//!
//! # Environment Variables
//!
//! - `IDENTITY_URL` - Identity platform base URL
//! - `IDENTITY_SERVICE_KEY` - Privileged service key

use thiserror::Error;

use nutri_api::config::{ConfigError, IdentityConfig};
use nutri_api::identity::{IdentityClient, IdentityError};
use nutri_core::{IdError, PatientId, RoleClaim};

/// Errors that can occur during identity commands.
#[derive(Debug, Error)]
pub enum IdentityCommandError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The identity platform call failed.
    #[error("{0}")]
    Identity(#[from] IdentityError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: patient, nutritionist, admin")]
    InvalidRole(String),

    /// Invalid identity id.
    #[error("Invalid identity id: {0}")]
    InvalidId(IdError),
}

/// Parse the role argument.
///
/// # Errors
///
/// Returns `IdentityCommandError::InvalidRole` for unknown roles.
pub fn parse_role(role: &str) -> Result<RoleClaim, IdentityCommandError> {
    role.parse()
        .map_err(|_| IdentityCommandError::InvalidRole(role.to_owned()))
}

/// Replace the role claim of an identity.
///
/// # Errors
///
/// Returns an error if the arguments are invalid, configuration is missing,
/// or the platform rejects the update.
pub async fn set_role(id: &str, role: &str) -> Result<(), IdentityCommandError> {
    dotenvy::dotenv().ok();

    let role = parse_role(role)?;
    let id = PatientId::parse(id).map_err(IdentityCommandError::InvalidId)?;

    let client = IdentityClient::new(&IdentityConfig::from_env()?)?;

    tracing::info!("Assigning role {} to identity {}", role, id);
    client.set_role(&id, role).await?;
    tracing::info!("Role claim updated");

    Ok(())
}
