//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before the JSON error body is written.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::ProvisioningError;

/// Message returned for every client-side input error.
pub const INSUFFICIENT_DATA: &str = "insufficient data";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Provisioning workflow failed.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// Request body could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Provisioning(err) => match err {
                ProvisioningError::Validation(_) => StatusCode::BAD_REQUEST,
                ProvisioningError::Conflict(_) => StatusCode::CONFLICT,
                ProvisioningError::NotFound(_) => StatusCode::NOT_FOUND,
                ProvisioningError::DependencyTimeout { .. }
                | ProvisioningError::InvitationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                ProvisioningError::IdentityCreation(_)
                | ProvisioningError::PatientRecord(_)
                | ProvisioningError::Invitation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Provisioning(ProvisioningError::Validation(err)) => ErrorBody {
                error: INSUFFICIENT_DATA.to_owned(),
                detail: Some(err.to_string()),
            },
            Self::BadRequest(detail) => ErrorBody {
                error: INSUFFICIENT_DATA.to_owned(),
                detail: Some(detail.clone()),
            },
            Self::Provisioning(err) => ErrorBody {
                error: err.to_string(),
                detail: None,
            },
            Self::Internal(_) => ErrorBody {
                error: "Internal server error".to_owned(),
                detail: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                status = status.as_u16(),
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use nutri_core::{PatientId, ValidationError};

    use super::*;
    use crate::services::ProvisioningStep;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        fn status(err: ProvisioningError) -> StatusCode {
            AppError::from(err).status()
        }

        assert_eq!(
            status(ProvisioningError::Validation(ValidationError::MissingField(
                "name"
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ProvisioningError::Conflict("taken".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ProvisioningError::NotFound(PatientId::new("u1"))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ProvisioningError::DependencyTimeout {
                step: ProvisioningStep::InsertRecord,
                timeout: Duration::from_secs(15),
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status(ProvisioningError::PatientRecord("boom".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal("join".to_owned()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_body() {
        let (status, body) = body_json(AppError::from(ProvisioningError::Validation(
            ValidationError::MissingField("email"),
        )))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "insufficient data");
        assert_eq!(body["detail"], "email is required");
    }

    #[tokio::test]
    async fn test_server_error_body_has_no_detail() {
        let (status, body) = body_json(AppError::from(ProvisioningError::IdentityCreation(
            "platform down".to_owned(),
        )))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "failed to create identity: platform down");
        assert!(body.get("detail").is_none());
    }
}
