//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::PatientStore;
use crate::services::ProvisioningService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Gateways are held as trait objects so the
/// router can run against the real platform or in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    provisioning: ProvisioningService,
    store: Arc<dyn PatientStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `store` should be the same store the provisioning service writes to;
    /// it backs the readiness probe.
    #[must_use]
    pub fn new(provisioning: ProvisioningService, store: Arc<dyn PatientStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                provisioning,
                store,
            }),
        }
    }

    /// Get a reference to the provisioning workflow.
    #[must_use]
    pub fn provisioning(&self) -> &ProvisioningService {
        &self.inner.provisioning
    }

    /// Get a reference to the patient store.
    #[must_use]
    pub fn store(&self) -> &dyn PatientStore {
        self.inner.store.as_ref()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("provisioning", &self.inner.provisioning)
            .finish_non_exhaustive()
    }
}
