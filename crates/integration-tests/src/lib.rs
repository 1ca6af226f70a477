//! Integration test support for Nutri.
//!
//! In-memory stand-ins for the three gateways the provisioning workflow
//! depends on. Each fake counts its calls and can be switched to fail or to
//! stall, so tests can drive every branch of the workflow without a database
//! or identity platform.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p nutri-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use secrecy::ExposeSecret;
use url::Url;

use nutri_api::config::ProvisioningConfig;
use nutri_api::db::{PatientStore, RepositoryError};
use nutri_api::identity::{
    IdentityError, IdentityProvider, IdentityRecord, InvitationSender, NewIdentity,
};
use nutri_api::services::ProvisioningService;
use nutri_api::{AppState, app};
use nutri_core::{Email, NewPatient, PatientId, PatientRecord, RoleClaim};

/// Message the fake platform returns for a duplicate email.
pub const DUPLICATE_EMAIL_MESSAGE: &str =
    "A user with this email address has already been registered";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Identity provider
// =============================================================================

/// What the fake identity provider was asked to create.
#[derive(Debug, Clone)]
pub struct CreatedIdentity {
    pub id: PatientId,
    pub email: Email,
    pub email_confirmed: bool,
    pub role: RoleClaim,
    pub full_name: String,
    pub password_len: usize,
}

#[derive(Debug, Default)]
struct IdentityState {
    by_email: HashMap<String, PatientId>,
    created: Vec<CreatedIdentity>,
    deleted: Vec<PatientId>,
    create_failure: Option<String>,
    delete_failure: Option<String>,
    create_delay: Option<Duration>,
    delete_delay: Option<Duration>,
    next_id: u64,
}

/// In-memory identity provider with unique emails.
#[derive(Debug, Default)]
pub struct FakeIdentityProvider {
    state: Mutex<IdentityState>,
}

impl FakeIdentityProvider {
    /// Make every subsequent create fail with `message`.
    pub fn fail_creates_with(&self, message: &str) {
        lock(&self.state).create_failure = Some(message.to_owned());
    }

    /// Make every subsequent delete fail with `message`.
    pub fn fail_deletes_with(&self, message: &str) {
        lock(&self.state).delete_failure = Some(message.to_owned());
    }

    /// Stall every subsequent create by `delay`.
    pub fn delay_creates(&self, delay: Duration) {
        lock(&self.state).create_delay = Some(delay);
    }

    /// Stall every subsequent delete by `delay`.
    pub fn delay_deletes(&self, delay: Duration) {
        lock(&self.state).delete_delay = Some(delay);
    }

    /// Number of identities created (including ones later deleted).
    #[must_use]
    pub fn created_count(&self) -> usize {
        lock(&self.state).created.len()
    }

    /// Identities created, in order.
    #[must_use]
    pub fn created(&self) -> Vec<CreatedIdentity> {
        lock(&self.state).created.clone()
    }

    /// Ids passed to successful deletes, in order.
    #[must_use]
    pub fn deleted(&self) -> Vec<PatientId> {
        lock(&self.state).deleted.clone()
    }

    /// Returns true if a live identity has this id.
    #[must_use]
    pub fn is_live(&self, id: &PatientId) -> bool {
        lock(&self.state).by_email.values().any(|live| live == id)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn create_identity(&self, identity: NewIdentity) -> Result<IdentityRecord, IdentityError> {
        let delay = lock(&self.state).create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if let Some(message) = &state.create_failure {
            return Err(IdentityError::Api {
                status: 500,
                message: message.clone(),
            });
        }
        if state.by_email.contains_key(identity.email.as_str()) {
            return Err(IdentityError::Conflict(DUPLICATE_EMAIL_MESSAGE.to_owned()));
        }

        state.next_id += 1;
        let id = PatientId::new(format!("user-{}", state.next_id));
        state
            .by_email
            .insert(identity.email.as_str().to_owned(), id.clone());
        state.created.push(CreatedIdentity {
            id: id.clone(),
            email: identity.email.clone(),
            email_confirmed: identity.email_confirmed,
            role: identity.role,
            full_name: identity.full_name.clone(),
            password_len: identity.password.expose_secret().len(),
        });

        Ok(IdentityRecord {
            id,
            email: identity.email,
            role: Some(identity.role),
        })
    }

    async fn delete_identity(&self, id: &PatientId) -> Result<(), IdentityError> {
        let delay = lock(&self.state).delete_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if let Some(message) = &state.delete_failure {
            return Err(IdentityError::Api {
                status: 500,
                message: message.clone(),
            });
        }

        let before = state.by_email.len();
        state.by_email.retain(|_, live| live != id);
        if state.by_email.len() == before {
            return Err(IdentityError::NotFound(id.to_string()));
        }
        state.deleted.push(id.clone());
        Ok(())
    }
}

// =============================================================================
// Patient store
// =============================================================================

#[derive(Debug, Default)]
struct StoreState {
    rows: HashMap<PatientId, PatientRecord>,
    insert_attempts: usize,
    insert_failure: Option<String>,
    insert_delay: Option<Duration>,
    reply_delay: Option<Duration>,
    lookup_failure: Option<String>,
    unreachable: bool,
}

/// In-memory patient store with unique ids and emails.
#[derive(Debug, Default)]
pub struct FakePatientStore {
    state: Mutex<StoreState>,
}

impl FakePatientStore {
    /// Make every subsequent insert fail with a constraint error carrying `message`.
    pub fn fail_inserts_with(&self, message: &str) {
        lock(&self.state).insert_failure = Some(message.to_owned());
    }

    /// Stall every subsequent insert by `delay`.
    pub fn delay_inserts(&self, delay: Duration) {
        lock(&self.state).insert_delay = Some(delay);
    }

    /// Write the row, then stall the reply by `delay`.
    pub fn delay_insert_replies(&self, delay: Duration) {
        lock(&self.state).reply_delay = Some(delay);
    }

    /// Make every subsequent lookup fail with `message`.
    pub fn fail_lookups_with(&self, message: &str) {
        lock(&self.state).lookup_failure = Some(message.to_owned());
    }

    /// Make `ping` fail.
    pub fn set_unreachable(&self) {
        lock(&self.state).unreachable = true;
    }

    /// Number of insert calls, successful or not.
    #[must_use]
    pub fn insert_attempts(&self) -> usize {
        lock(&self.state).insert_attempts
    }

    /// Number of stored rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        lock(&self.state).rows.len()
    }

    /// Number of stored rows with this email.
    #[must_use]
    pub fn rows_with_email(&self, email: &str) -> usize {
        lock(&self.state)
            .rows
            .values()
            .filter(|row| row.email.as_str() == email)
            .count()
    }

    /// Stored row by id.
    #[must_use]
    pub fn get(&self, id: &PatientId) -> Option<PatientRecord> {
        lock(&self.state).rows.get(id).cloned()
    }
}

#[async_trait]
impl PatientStore for FakePatientStore {
    async fn insert(
        &self,
        id: &PatientId,
        patient: &NewPatient,
    ) -> Result<PatientRecord, RepositoryError> {
        let delay = {
            let mut state = lock(&self.state);
            state.insert_attempts += 1;
            state.insert_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (record, reply_delay) = {
            let mut state = lock(&self.state);
            if let Some(message) = &state.insert_failure {
                return Err(RepositoryError::Constraint(message.clone()));
            }
            if state.rows.contains_key(id)
                || state.rows.values().any(|r| r.email == patient.email)
            {
                return Err(RepositoryError::Conflict(
                    "duplicate key value violates unique constraint".to_owned(),
                ));
            }

            let record = PatientRecord {
                id: id.clone(),
                auth_user_id: id.clone(),
                nutritionist_id: patient.nutritionist_id.clone(),
                name: patient.name.clone(),
                email: patient.email.clone(),
                profile: patient.profile.clone(),
                created_at: Utc::now(),
            };
            state.rows.insert(id.clone(), record.clone());
            (record, state.reply_delay)
        };

        if let Some(delay) = reply_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(record)
    }

    async fn find_by_id(&self, id: &PatientId) -> Result<Option<PatientRecord>, RepositoryError> {
        let state = lock(&self.state);
        if let Some(message) = &state.lookup_failure {
            return Err(RepositoryError::DataCorruption(message.clone()));
        }
        Ok(state.rows.get(id).cloned())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        if lock(&self.state).unreachable {
            return Err(RepositoryError::DataCorruption(
                "store unreachable".to_owned(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Invitation sender
// =============================================================================

/// An invitation the fake sender accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentInvitation {
    pub email: Email,
    pub redirect_to: Option<Url>,
}

#[derive(Debug, Default)]
struct InvitationState {
    sent: Vec<SentInvitation>,
    attempts: usize,
    failure: Option<String>,
    delay: Option<Duration>,
}

/// In-memory invitation sender.
#[derive(Debug, Default)]
pub struct FakeInvitationSender {
    state: Mutex<InvitationState>,
}

impl FakeInvitationSender {
    /// Make every subsequent send fail with `message`.
    pub fn fail_with(&self, message: &str) {
        lock(&self.state).failure = Some(message.to_owned());
    }

    /// Let sends succeed again.
    pub fn recover(&self) {
        lock(&self.state).failure = None;
    }

    /// Stall every subsequent send by `delay`.
    pub fn delay_sends(&self, delay: Duration) {
        lock(&self.state).delay = Some(delay);
    }

    /// Number of send calls, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        lock(&self.state).attempts
    }

    /// Invitations sent, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentInvitation> {
        lock(&self.state).sent.clone()
    }
}

#[async_trait]
impl InvitationSender for FakeInvitationSender {
    async fn send_invitation(
        &self,
        email: &Email,
        redirect_to: Option<&Url>,
    ) -> Result<(), IdentityError> {
        let delay = {
            let mut state = lock(&self.state);
            state.attempts += 1;
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if let Some(message) = &state.failure {
            return Err(IdentityError::Api {
                status: 500,
                message: message.clone(),
            });
        }
        state.sent.push(SentInvitation {
            email: email.clone(),
            redirect_to: redirect_to.cloned(),
        });
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Redirect URL used by [`Harness::test_config`].
pub const TEST_REDIRECT: &str = "https://app.example.com/confirm-invitation";

/// The three fakes plus helpers to build a service, state, or router on them.
#[derive(Debug, Default, Clone)]
pub struct Harness {
    pub identity: Arc<FakeIdentityProvider>,
    pub store: Arc<FakePatientStore>,
    pub invitations: Arc<FakeInvitationSender>,
}

impl Harness {
    /// Create a harness with fresh fakes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Short timeouts so timeout tests finish quickly.
    #[must_use]
    pub fn test_config() -> ProvisioningConfig {
        ProvisioningConfig {
            step_timeout: Duration::from_millis(200),
            compensation_timeout: Duration::from_millis(200),
            invitation_redirect: Url::parse(TEST_REDIRECT).ok(),
        }
    }

    /// Provisioning service over the fakes with [`Harness::test_config`].
    #[must_use]
    pub fn service(&self) -> ProvisioningService {
        self.service_with(Self::test_config())
    }

    /// Provisioning service over the fakes with a custom configuration.
    #[must_use]
    pub fn service_with(&self, config: ProvisioningConfig) -> ProvisioningService {
        ProvisioningService::new(
            self.identity.clone(),
            self.store.clone(),
            self.invitations.clone(),
            config,
        )
    }

    /// Application state over the fakes.
    #[must_use]
    pub fn state(&self) -> AppState {
        AppState::new(self.service(), self.store.clone())
    }

    /// Full application router over the fakes.
    #[must_use]
    pub fn router(&self) -> Router {
        app(self.state())
    }
}
