//! Core types for Nutri.
//!
//! This module provides type-safe wrappers for the provisioning domain.

pub mod email;
pub mod gender;
pub mod id;
pub mod patient;
pub mod role;

pub use email::{Email, EmailError};
pub use gender::{Gender, normalize_gender};
pub use id::*;
pub use patient::{
    NewPatient, PatientProfile, PatientProvisioningRequest, PatientRecord, ValidationError,
};
pub use role::RoleClaim;
