//! Business logic services.
//!
//! # Services
//!
//! - `provisioning` - Patient provisioning workflow (identity, record, invitation)
//! - `password` - Temporary credential generation

pub mod password;
pub mod provisioning;

pub use password::generate_temporary_password;
pub use provisioning::{ProvisioningError, ProvisioningService, ProvisioningStep};
