//! Patient provisioning commands.
//!
//! # Usage
//!
//! ```bash
//! # Provision a patient and send the invitation
//! nutri-cli patient provision -e maria@example.com -n "Maria Silva" --nutritionist n1 \
//!     --gender female --height 165 --initial-weight 68 --goal "weight loss"
//!
//! # Send the invitation again
//! nutri-cli patient resend-invite --id 7c1e...
//! ```
//!
//! # Environment Variables
//!
//! - `NUTRI_DATABASE_URL` - `PostgreSQL` connection string
//! - `IDENTITY_URL`, `IDENTITY_SERVICE_KEY` - Identity platform admin API
//! - `FRONTEND_URL` - Invitation redirect base (optional)

use std::sync::Arc;

use clap::Args;
use thiserror::Error;

use nutri_api::config::{ConfigError, IdentityConfig, ProvisioningConfig, database_url_from_env};
use nutri_api::db::{self, PgPatientStore};
use nutri_api::identity::{IdentityClient, IdentityError};
use nutri_api::services::{ProvisioningError, ProvisioningService};
use nutri_core::{IdError, PatientId, PatientProvisioningRequest, PatientRecord};

/// Errors that can occur during patient commands.
#[derive(Debug, Error)]
pub enum PatientCommandError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Identity client could not be built.
    #[error("Identity client error: {0}")]
    Identity(#[from] IdentityError),

    /// The workflow failed.
    #[error("{0}")]
    Provisioning(#[from] ProvisioningError),

    /// Invalid patient id.
    #[error("Invalid patient id: {0}")]
    InvalidId(IdError),

    /// Output could not be encoded.
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Profile fields accepted by `patient provision`.
#[derive(Debug, Clone, Default, Args)]
pub struct ProvisionArgs {
    /// Patient email address
    #[arg(short, long)]
    pub email: String,

    /// Patient full name
    #[arg(short, long)]
    pub name: String,

    /// Owning nutritionist id
    #[arg(long)]
    pub nutritionist: String,

    /// Phone number
    #[arg(long)]
    pub phone: Option<String>,

    /// Gender code (`male`, `female`, `m`, `f`, `masculino`, `feminino`)
    #[arg(long)]
    pub gender: Option<String>,

    /// Birth date (`YYYY-MM-DD`)
    #[arg(long)]
    pub birth_date: Option<String>,

    /// Height in centimetres
    #[arg(long)]
    pub height: Option<f64>,

    /// Initial weight in kilograms
    #[arg(long)]
    pub initial_weight: Option<f64>,

    /// Treatment goal
    #[arg(long)]
    pub goal: Option<String>,

    /// Body fat percentage
    #[arg(long)]
    pub body_fat: Option<f64>,

    /// Basal metabolic rate (kcal/day)
    #[arg(long)]
    pub bmr: Option<f64>,
}

impl From<ProvisionArgs> for PatientProvisioningRequest {
    fn from(args: ProvisionArgs) -> Self {
        Self {
            name: Some(args.name),
            email: Some(args.email),
            phone: args.phone,
            gender: args.gender,
            birth_date: args.birth_date,
            height_cm: args.height,
            initial_weight_kg: args.initial_weight,
            goal: args.goal,
            body_fat_percentage: args.body_fat,
            basal_metabolic_rate: args.bmr,
            nutritionist_id: Some(args.nutritionist),
        }
    }
}

/// Provision a patient and print the stored record as JSON.
///
/// # Errors
///
/// Returns an error if configuration is missing or any workflow step fails.
/// When only the invitation fails or times out, the record is still printed.
pub async fn provision(args: ProvisionArgs) -> Result<(), PatientCommandError> {
    let service = build_service().await?;
    let request = PatientProvisioningRequest::from(args);

    tracing::info!("Provisioning patient...");
    match service.provision_patient(&request).await {
        Ok(patient) => {
            tracing::info!(patient_id = %patient.id, "Patient provisioned and invitation sent");
            print_record(&patient)
        }
        Err(e) => {
            if let Some(patient) = e.persisted_patient() {
                tracing::warn!(
                    patient_id = %patient.id,
                    "Patient created but invitation was not sent; retry with `patient resend-invite --id {}`",
                    patient.id
                );
                print_record(patient)?;
            }
            Err(e.into())
        }
    }
}

/// Send the invitation again for an existing patient.
///
/// # Errors
///
/// Returns an error if the id is invalid, the patient does not exist, or the
/// invitation fails.
pub async fn resend_invite(id: &str) -> Result<(), PatientCommandError> {
    let id = PatientId::parse(id).map_err(PatientCommandError::InvalidId)?;
    let service = build_service().await?;

    let patient = service.resend_invitation(&id).await?;
    tracing::info!(patient_id = %patient.id, email = %patient.email, "Invitation sent");
    Ok(())
}

async fn build_service() -> Result<ProvisioningService, PatientCommandError> {
    dotenvy::dotenv().ok();

    let database_url = database_url_from_env()?;
    let identity_config = IdentityConfig::from_env()?;
    let provisioning_config = ProvisioningConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    let store = Arc::new(PgPatientStore::new(pool));
    let identity = Arc::new(IdentityClient::new(&identity_config)?);

    Ok(ProvisioningService::new(
        identity.clone(),
        store,
        identity,
        provisioning_config,
    ))
}

fn print_record(patient: &PatientRecord) -> Result<(), PatientCommandError> {
    let json = serde_json::to_string_pretty(patient)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_args_become_request() {
        let args = ProvisionArgs {
            email: "maria@example.com".to_owned(),
            name: "Maria Silva".to_owned(),
            nutritionist: "n1".to_owned(),
            gender: Some("female".to_owned()),
            height: Some(165.0),
            ..Default::default()
        };

        let patient = PatientProvisioningRequest::from(args).validate().unwrap();
        assert_eq!(patient.nutritionist_id.as_str(), "n1");
        assert_eq!(patient.profile.gender.as_deref(), Some("Feminino"));
        assert_eq!(patient.profile.height_cm, Some(165.0));
        assert_eq!(patient.profile.initial_weight_kg, None);
    }
}
