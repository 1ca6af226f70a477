//! Identity platform gateway.
//!
//! This module provides:
//! - [`IdentityProvider`] for creating and deleting login identities
//! - [`InvitationSender`] for dispatching the password-setup email
//! - [`IdentityClient`], the HTTP implementation of both against the
//!   platform's admin API
//!
//! The workflow depends only on the traits, so tests can swap in fakes.

mod client;
mod error;
mod types;

use async_trait::async_trait;
use url::Url;

use nutri_core::{Email, PatientId};

pub use client::IdentityClient;
pub use error::IdentityError;
pub use types::{IdentityRecord, NewIdentity};

/// Creates and deletes login identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a login identity.
    ///
    /// Implementations must return [`IdentityError::Conflict`] when the email
    /// is already registered.
    async fn create_identity(&self, identity: NewIdentity) -> Result<IdentityRecord, IdentityError>;

    /// Delete a login identity. Used only to compensate a failed provisioning.
    async fn delete_identity(&self, id: &PatientId) -> Result<(), IdentityError>;
}

/// Sends the invitation (password-setup) email to an identity.
#[async_trait]
pub trait InvitationSender: Send + Sync {
    /// Send the invitation to `email`, optionally redirecting to `redirect_to`
    /// once the patient has set a password.
    async fn send_invitation(
        &self,
        email: &Email,
        redirect_to: Option<&Url>,
    ) -> Result<(), IdentityError>;
}
