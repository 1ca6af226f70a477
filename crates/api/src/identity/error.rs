//! Identity platform errors.

use thiserror::Error;

/// Errors that can occur when calling the identity platform.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP request failed before a response arrived.
    #[error("identity request failed: {0}")]
    Request(String),

    /// Failed to parse a successful response.
    #[error("identity response error: {0}")]
    Response(String),

    /// The email is already registered with another identity.
    #[error("{0}")]
    Conflict(String),

    /// The identity does not exist.
    #[error("identity not found: {0}")]
    NotFound(String),

    /// The platform rejected the call.
    #[error("identity API error ({status}): {message}")]
    Api {
        /// HTTP status returned by the platform.
        status: u16,
        /// Provider-supplied message.
        message: String,
    },

    /// Client could not be configured.
    #[error("identity configuration error: {0}")]
    Config(String),
}

impl IdentityError {
    /// Returns true if the platform reported a duplicate email.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
