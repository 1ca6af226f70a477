//! Patient provisioning workflow.
//!
//! Provisioning touches two systems that share no transaction: the identity
//! platform and the patient record store. The workflow runs forward in a
//! fixed order and undoes the identity if the record cannot be written:
//!
//! 1. Validate the request (no side effects on failure)
//! 2. Create a confirmed identity with a temporary password and the
//!    `patient` role claim
//! 3. Insert the patient row keyed by the identity id; on failure delete
//!    the identity again. A timed-out insert may still have committed, so
//!    the row is looked up first and the identity is only deleted when the
//!    row is known to be absent
//! 4. Send the invitation; on failure or timeout keep both records
//!
//! Every remote call is bounded by [`ProvisioningConfig::step_timeout`];
//! the compensating delete has its own bound.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{Span, error, field, info, instrument, warn};

use nutri_core::{PatientId, PatientProvisioningRequest, PatientRecord, RoleClaim, ValidationError};

use super::password::generate_temporary_password;
use crate::config::ProvisioningConfig;
use crate::db::PatientStore;
use crate::identity::{IdentityError, IdentityProvider, InvitationSender, NewIdentity};

/// A remote step of the workflow, used to label timeouts and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStep {
    /// Creating the login identity.
    CreateIdentity,
    /// Inserting the patient row.
    InsertRecord,
    /// Dispatching the invitation email.
    SendInvitation,
    /// Looking up an existing patient row.
    LookupRecord,
}

impl ProvisioningStep {
    /// Returns a short label for logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateIdentity => "identity creation",
            Self::InsertRecord => "patient record insert",
            Self::SendInvitation => "invitation dispatch",
            Self::LookupRecord => "patient lookup",
        }
    }
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the provisioning workflow.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The request is missing or has malformed fields. Nothing was created.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The email is already registered with the identity platform.
    #[error("{0}")]
    Conflict(String),

    /// The identity platform refused to create the identity.
    #[error("failed to create identity: {0}")]
    IdentityCreation(String),

    /// The patient row could not be written or read.
    #[error("failed to store patient record: {0}")]
    PatientRecord(String),

    /// Both records exist but the invitation was not sent.
    #[error("patient created but invitation failed: {message}")]
    Invitation {
        /// The persisted patient.
        patient: Box<PatientRecord>,
        /// Provider-supplied failure message.
        message: String,
    },

    /// Both records exist but the invitation did not answer in time.
    #[error("patient created but invitation dispatch timed out after {timeout:?}")]
    InvitationTimeout {
        /// The persisted patient.
        patient: Box<PatientRecord>,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// A remote step did not answer in time.
    #[error("{step} timed out after {timeout:?}")]
    DependencyTimeout {
        /// The step that timed out.
        step: ProvisioningStep,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// No patient with this id exists.
    #[error("patient not found: {0}")]
    NotFound(PatientId),
}

impl ProvisioningError {
    /// Returns the persisted patient when the failure left both records in place.
    #[must_use]
    pub fn persisted_patient(&self) -> Option<&PatientRecord> {
        match self {
            Self::Invitation { patient, .. } | Self::InvitationTimeout { patient, .. } => {
                Some(patient.as_ref())
            }
            _ => None,
        }
    }
}

/// Runs the provisioning workflow against injected gateways.
#[derive(Clone)]
pub struct ProvisioningService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn PatientStore>,
    invitations: Arc<dyn InvitationSender>,
    config: ProvisioningConfig,
}

impl fmt::Debug for ProvisioningService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProvisioningService {
    /// Create a new provisioning service.
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn PatientStore>,
        invitations: Arc<dyn InvitationSender>,
        config: ProvisioningConfig,
    ) -> Self {
        Self {
            identity,
            store,
            invitations,
            config,
        }
    }

    /// Provision a new patient: identity, record, invitation.
    ///
    /// Not idempotent. A second call with the same email fails with
    /// [`ProvisioningError::Conflict`].
    ///
    /// # Errors
    ///
    /// See [`ProvisioningError`]. If the record step fails or times out the
    /// identity has been deleted (best effort) before the error is returned.
    #[instrument(
        skip(self, request),
        fields(nutritionist_id = field::Empty, patient_id = field::Empty)
    )]
    pub async fn provision_patient(
        &self,
        request: &PatientProvisioningRequest,
    ) -> Result<PatientRecord, ProvisioningError> {
        let patient = request.validate()?;
        Span::current().record("nutritionist_id", field::display(&patient.nutritionist_id));

        let identity = NewIdentity {
            email: patient.email.clone(),
            password: generate_temporary_password(),
            email_confirmed: true,
            role: RoleClaim::Patient,
            full_name: patient.name.clone(),
        };

        let created = bounded(
            ProvisioningStep::CreateIdentity,
            self.config.step_timeout,
            self.identity.create_identity(identity),
        )
        .await?
        .map_err(|e| match e {
            IdentityError::Conflict(message) => ProvisioningError::Conflict(message),
            other => ProvisioningError::IdentityCreation(other.to_string()),
        })?;

        Span::current().record("patient_id", field::display(&created.id));
        info!("Identity created");

        let insert = bounded(
            ProvisioningStep::InsertRecord,
            self.config.step_timeout,
            self.store.insert(&created.id, &patient),
        )
        .await;

        let record = match insert {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                let message = e.to_string();
                self.compensate(&created.id, &message).await;
                return Err(ProvisioningError::PatientRecord(message));
            }
            Err(timeout) => self.recover_timed_out_insert(&created.id, timeout).await?,
        };

        info!("Patient record stored");

        self.dispatch_invitation(record).await
    }

    /// Send the invitation again for an existing patient.
    ///
    /// Creates and changes nothing; safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::NotFound`] if no such patient exists, or
    /// an invitation/timeout error if the dispatch fails.
    #[instrument(skip(self), fields(patient_id = %id))]
    pub async fn resend_invitation(
        &self,
        id: &PatientId,
    ) -> Result<PatientRecord, ProvisioningError> {
        let record = bounded(
            ProvisioningStep::LookupRecord,
            self.config.step_timeout,
            self.store.find_by_id(id),
        )
        .await?
        .map_err(|e| ProvisioningError::PatientRecord(e.to_string()))?
        .ok_or_else(|| ProvisioningError::NotFound(id.clone()))?;

        self.dispatch_invitation(record).await
    }

    async fn dispatch_invitation(
        &self,
        record: PatientRecord,
    ) -> Result<PatientRecord, ProvisioningError> {
        let sent = bounded(
            ProvisioningStep::SendInvitation,
            self.config.step_timeout,
            self.invitations
                .send_invitation(&record.email, self.config.invitation_redirect.as_ref()),
        )
        .await;

        match sent {
            Ok(Ok(())) => {
                info!(patient_id = %record.id, "Invitation sent");
                Ok(record)
            }
            Ok(Err(e)) => {
                warn!(patient_id = %record.id, error = %e, "Invitation failed; records kept");
                Err(ProvisioningError::Invitation {
                    patient: Box::new(record),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                warn!(patient_id = %record.id, "Invitation timed out; records kept");
                Err(ProvisioningError::InvitationTimeout {
                    patient: Box::new(record),
                    timeout: self.config.step_timeout,
                })
            }
        }
    }

    /// Settle an insert whose reply missed the deadline.
    ///
    /// Returns the row if it committed anyway. Otherwise returns `timeout`,
    /// after deleting the identity when the row is known to be absent.
    async fn recover_timed_out_insert(
        &self,
        id: &PatientId,
        timeout: ProvisioningError,
    ) -> Result<PatientRecord, ProvisioningError> {
        let lookup = bounded(
            ProvisioningStep::LookupRecord,
            self.config.step_timeout,
            self.store.find_by_id(id),
        )
        .await;

        match lookup {
            Ok(Ok(Some(record))) => {
                warn!(patient_id = %id, "Insert reply timed out but the row was written; continuing");
                Ok(record)
            }
            Ok(Ok(None)) => {
                self.compensate(id, &timeout.to_string()).await;
                Err(timeout)
            }
            Ok(Err(e)) => {
                error!(
                    patient_id = %id,
                    error = %e,
                    "Insert timed out and the row could not be checked; identity kept"
                );
                Err(timeout)
            }
            Err(lookup_timeout) => {
                error!(
                    patient_id = %id,
                    error = %lookup_timeout,
                    "Insert timed out and the row could not be checked; identity kept"
                );
                Err(timeout)
            }
        }
    }

    /// Delete an identity whose patient row could not be written.
    ///
    /// Failures are logged and never replace the original error.
    async fn compensate(&self, id: &PatientId, cause: &str) {
        let limit = self.config.compensation_timeout;
        match tokio::time::timeout(limit, self.identity.delete_identity(id)).await {
            Ok(Ok(())) => {
                info!(patient_id = %id, cause, "Identity deleted after failed record insert");
            }
            Ok(Err(e)) => {
                error!(
                    patient_id = %id,
                    cause,
                    error = %e,
                    "Failed to delete identity after failed record insert; identity left orphaned"
                );
            }
            Err(_) => {
                error!(
                    patient_id = %id,
                    cause,
                    timeout_secs = limit.as_secs(),
                    "Timed out deleting identity after failed record insert; identity may be orphaned"
                );
            }
        }
    }
}

/// Await `fut`, mapping an elapsed deadline to `DependencyTimeout`.
async fn bounded<F: Future>(
    step: ProvisioningStep,
    timeout: Duration,
    fut: F,
) -> Result<F::Output, ProvisioningError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ProvisioningError::DependencyTimeout { step, timeout })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_output_through() {
        let out = bounded(ProvisioningStep::InsertRecord, Duration::from_secs(1), async {
            7
        })
        .await
        .unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let err = bounded(
            ProvisioningStep::SendInvitation,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::DependencyTimeout {
                step: ProvisioningStep::SendInvitation,
                ..
            }
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = ProvisioningError::DependencyTimeout {
            step: ProvisioningStep::CreateIdentity,
            timeout: Duration::from_secs(15),
        };
        assert_eq!(err.to_string(), "identity creation timed out after 15s");

        let err = ProvisioningError::Validation(ValidationError::MissingField("email"));
        assert_eq!(err.to_string(), "email is required");

        let err = ProvisioningError::Conflict(
            "A user with this email address has already been registered".to_owned(),
        );
        assert_eq!(
            err.to_string(),
            "A user with this email address has already been registered"
        );
    }
}
