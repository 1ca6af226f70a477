//! Identity platform admin API client.
//!
//! Talks to the GoTrue-compatible endpoints under `{base}/auth/v1` with the
//! privileged service key. Every call maps platform failures to
//! [`IdentityError`], recognizing duplicate-email responses as
//! [`IdentityError::Conflict`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use secrecy::ExposeSecret;
use tracing::{debug, instrument, warn};
use url::Url;

use nutri_core::{Email, PatientId, RoleClaim};

use super::error::IdentityError;
use super::types::{
    AppMetadata, CreateUserRequest, ErrorBody, IdentityRecord, InvitationRequest, NewIdentity,
    UpdateRoleRequest, UserResponse,
};
use super::{IdentityProvider, InvitationSender};
use crate::config::IdentityConfig;

/// Path of the auth API relative to the platform base URL.
const AUTH_API_PATH: &str = "auth/v1/";

/// Connect timeout; per-call deadlines are enforced by the workflow.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error codes the platform uses for an already-registered email.
const CONFLICT_ERROR_CODES: &[&str] = &["email_exists", "user_already_exists"];

/// Admin API client for the identity platform.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    auth_url: Url,
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityClient")
            .field("auth_url", &self.auth_url.as_str())
            .finish_non_exhaustive()
    }
}

impl IdentityClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Config` if the service key is not a valid
    /// header value or the HTTP client fails to build.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let key = config.service_key.expose_secret();

        let mut headers = HeaderMap::new();
        let mut apikey = HeaderValue::from_str(key)
            .map_err(|e| IdentityError::Config(format!("invalid service key: {e}")))?;
        apikey.set_sensitive(true);
        headers.insert("apikey", apikey);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| IdentityError::Config(format!("invalid service key: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Config(e.to_string()))?;

        let base = format!("{}/", config.base_url.as_str().trim_end_matches('/'));
        let auth_url = Url::parse(&base)
            .and_then(|base| base.join(AUTH_API_PATH))
            .map_err(|e| IdentityError::Config(format!("invalid base url: {e}")))?;

        Ok(Self { client, auth_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.auth_url
            .join(path)
            .map_err(|e| IdentityError::Config(format!("invalid endpoint {path}: {e}")))
    }

    /// Create a user through the admin API.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Conflict` if the email is already registered,
    /// or another variant if the request fails.
    #[instrument(skip(self, identity), fields(email = %identity.email, role = %identity.role))]
    pub async fn create_user(&self, identity: &NewIdentity) -> Result<IdentityRecord, IdentityError> {
        let response = self
            .client
            .post(self.endpoint("admin/users")?)
            .json(&CreateUserRequest::from_identity(identity))
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        let response = check_status(response).await?;
        let user = response
            .json::<UserResponse>()
            .await
            .map_err(|e| IdentityError::Response(e.to_string()))?
            .into_user();

        if user.id.trim().is_empty() {
            return Err(IdentityError::Response("user id missing".to_string()));
        }

        let email = match user.email.as_deref().map(Email::parse) {
            Some(Ok(email)) => email,
            Some(Err(e)) => {
                warn!(error = %e, "Identity platform echoed an unparseable email");
                identity.email.clone()
            }
            None => identity.email.clone(),
        };

        debug!(user_id = %user.id, "Identity created");

        Ok(IdentityRecord {
            id: PatientId::new(user.id),
            email,
            role: user.app_metadata.and_then(|m| m.role_claim()),
        })
    }

    /// Delete a user through the admin API.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NotFound` if the user does not exist, or
    /// another variant if the request fails.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: &PatientId) -> Result<(), IdentityError> {
        let response = self
            .client
            .delete(self.endpoint(&format!("admin/users/{id}"))?)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        check_status(response).await?;
        debug!("Identity deleted");
        Ok(())
    }

    /// Send the password-setup email to an existing user.
    ///
    /// Provisioned identities are created with a confirmed email, which the
    /// platform's `/invite` endpoint refuses; the recovery endpoint sends the
    /// same "set your password" link for confirmed users.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the platform rejects it.
    #[instrument(skip(self, redirect_to), fields(email = %email))]
    pub async fn send_password_setup(
        &self,
        email: &Email,
        redirect_to: Option<&Url>,
    ) -> Result<(), IdentityError> {
        let mut url = self.endpoint("recover")?;
        if let Some(redirect) = redirect_to {
            url.query_pairs_mut()
                .append_pair("redirect_to", redirect.as_str());
        }

        let response = self
            .client
            .post(url)
            .json(&InvitationRequest {
                email: email.as_str(),
            })
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        match check_status(response).await {
            Ok(_) => {
                debug!("Invitation dispatched");
                Ok(())
            }
            // The user exists by construction; a "conflict" here is a plain failure.
            Err(IdentityError::Conflict(message)) => Err(IdentityError::Api {
                status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                message,
            }),
            Err(e) => Err(e),
        }
    }

    /// Replace the role claim in a user's application metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the user does not exist.
    #[instrument(skip(self), fields(user_id = %id, role = %role))]
    pub async fn set_role(&self, id: &PatientId, role: RoleClaim) -> Result<(), IdentityError> {
        let response = self
            .client
            .put(self.endpoint(&format!("admin/users/{id}"))?)
            .json(&UpdateRoleRequest {
                app_metadata: AppMetadata { role },
            })
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        check_status(response).await?;
        debug!("Role claim updated");
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn create_identity(&self, identity: NewIdentity) -> Result<IdentityRecord, IdentityError> {
        self.create_user(&identity).await
    }

    async fn delete_identity(&self, id: &PatientId) -> Result<(), IdentityError> {
        self.delete_user(id).await
    }
}

#[async_trait]
impl InvitationSender for IdentityClient {
    async fn send_invitation(
        &self,
        email: &Email,
        redirect_to: Option<&Url>,
    ) -> Result<(), IdentityError> {
        self.send_password_setup(email, redirect_to).await
    }
}

/// Pass successful responses through and map failures to `IdentityError`.
async fn check_status(response: Response) -> Result<Response, IdentityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(classify_failure(status, &text))
}

fn classify_failure(status: StatusCode, text: &str) -> IdentityError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = body
        .message()
        .map(str::to_owned)
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_owned()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_owned()
        });

    let conflict_code = body
        .error_code
        .as_deref()
        .is_some_and(|code| CONFLICT_ERROR_CODES.contains(&code));
    let conflict_message = message.to_lowercase().contains("already been registered");

    if status == StatusCode::CONFLICT || conflict_code || conflict_message {
        return IdentityError::Conflict(message);
    }

    if status == StatusCode::NOT_FOUND {
        return IdentityError::NotFound(message);
    }

    IdentityError::Api {
        status: status.as_u16(),
        message,
    }
}
