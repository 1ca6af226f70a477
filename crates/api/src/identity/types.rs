//! Identity records and the admin API wire format.
//!
//! Wire types follow the GoTrue admin API used by the hosted platform.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use nutri_core::{Email, PatientId, RoleClaim};

/// Parameters for creating a login identity.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    /// Login email.
    pub email: Email,
    /// Temporary password; the platform refuses to create users without one.
    pub password: SecretString,
    /// Mark the email as confirmed so the patient is not asked to verify it.
    pub email_confirmed: bool,
    /// Role claim stored in application metadata.
    pub role: RoleClaim,
    /// Display name stored in user metadata.
    pub full_name: String,
}

/// A login identity as returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    /// Platform user id; becomes the patient primary key.
    pub id: PatientId,
    /// Login email.
    pub email: Email,
    /// Role claim, when the platform echoed one back.
    pub role: Option<RoleClaim>,
}

/// Role claim in `app_metadata`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AppMetadata {
    pub role: RoleClaim,
}

/// `app_metadata` as returned by the platform; unknown roles are kept as text.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawAppMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

impl RawAppMetadata {
    pub(crate) fn role_claim(&self) -> Option<RoleClaim> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }
}

/// Display attributes in `user_metadata`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserMetadata<'a> {
    pub full_name: &'a str,
}

/// Body of `POST /admin/users`.
#[derive(Serialize)]
pub(crate) struct CreateUserRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub email_confirm: bool,
    pub app_metadata: AppMetadata,
    pub user_metadata: UserMetadata<'a>,
}

impl<'a> CreateUserRequest<'a> {
    pub(crate) fn from_identity(identity: &'a NewIdentity) -> Self {
        Self {
            email: identity.email.as_str(),
            password: identity.password.expose_secret(),
            email_confirm: identity.email_confirmed,
            app_metadata: AppMetadata {
                role: identity.role,
            },
            user_metadata: UserMetadata {
                full_name: &identity.full_name,
            },
        }
    }
}

/// Body of `PUT /admin/users/{id}` when assigning a role.
#[derive(Serialize)]
pub(crate) struct UpdateRoleRequest {
    pub app_metadata: AppMetadata,
}

/// Body of the invitation (`POST /recover`) call.
#[derive(Serialize)]
pub(crate) struct InvitationRequest<'a> {
    pub email: &'a str,
}

/// User object returned by the admin API.
///
/// Some platform versions wrap it as `{ "user": {...} }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UserResponse {
    Wrapped { user: UserObject },
    Bare(UserObject),
}

impl UserResponse {
    pub(crate) fn into_user(self) -> UserObject {
        match self {
            Self::Wrapped { user } | Self::Bare(user) => user,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserObject {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: Option<RawAppMetadata>,
}

/// Error body returned by the platform.
///
/// Field names differ between endpoints and platform versions.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl ErrorBody {
    /// Most specific human-readable message available.
    pub(crate) fn message(&self) -> Option<&str> {
        self.msg
            .as_deref()
            .or(self.message.as_deref())
            .or(self.error_description.as_deref())
            .or(self.error.as_deref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_request_shape() {
        let identity = NewIdentity {
            email: Email::parse("maria@example.com").unwrap(),
            password: SecretString::from("Tmp0rary"),
            email_confirmed: true,
            role: RoleClaim::Patient,
            full_name: "Maria Silva".to_owned(),
        };

        let json = serde_json::to_value(CreateUserRequest::from_identity(&identity)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "email": "maria@example.com",
                "password": "Tmp0rary",
                "email_confirm": true,
                "app_metadata": { "role": "patient" },
                "user_metadata": { "full_name": "Maria Silva" }
            })
        );
    }

    #[test]
    fn test_new_identity_debug_redacts_password() {
        let identity = NewIdentity {
            email: Email::parse("maria@example.com").unwrap(),
            password: SecretString::from("do-not-print-me"),
            email_confirmed: true,
            role: RoleClaim::Patient,
            full_name: "Maria Silva".to_owned(),
        };
        assert!(!format!("{identity:?}").contains("do-not-print-me"));
    }

    #[test]
    fn test_user_response_both_shapes() {
        let bare: UserResponse =
            serde_json::from_str(r#"{"id":"u1","email":"maria@example.com"}"#).unwrap();
        assert_eq!(bare.into_user().id, "u1");

        let wrapped: UserResponse = serde_json::from_str(
            r#"{"user":{"id":"u2","email":"maria@example.com","app_metadata":{"role":"patient"}}}"#,
        )
        .unwrap();
        let user = wrapped.into_user();
        assert_eq!(user.id, "u2");
        assert_eq!(
            user.app_metadata.and_then(|m| m.role_claim()),
            Some(RoleClaim::Patient)
        );
    }

    #[test]
    fn test_error_body_message_precedence() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"code":422,"error_code":"email_exists","msg":"A user with this email address has already been registered"}"#,
        )
        .unwrap();
        assert_eq!(
            body.message(),
            Some("A user with this email address has already been registered")
        );
        assert_eq!(body.error_code.as_deref(), Some("email_exists"));

        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"bad key"}"#)
                .unwrap();
        assert_eq!(body.message(), Some("bad key"));
    }
}
