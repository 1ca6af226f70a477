//! Patient provisioning route handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use nutri_core::{PatientId, PatientProvisioningRequest, PatientRecord};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Body of `POST /patients`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientBody {
    /// Intake form payload.
    pub patient_data: Option<PatientProvisioningRequest>,
    /// Owning nutritionist; takes precedence over `patientData.nutritionist_id`.
    pub nutritionist_id: Option<String>,
}

/// Success body for provisioning routes.
#[derive(Debug, Serialize)]
pub struct PatientResponse {
    pub message: &'static str,
    pub patient: PatientRecord,
}

/// Provision a new patient.
///
/// The workflow runs on its own task so that a client disconnect cannot
/// interrupt it between the identity and record steps.
///
/// # Route
///
/// `POST /patients`
pub async fn create_patient(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreatePatientBody>, JsonRejection>,
) -> Result<Json<PatientResponse>> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut request = body
        .patient_data
        .ok_or_else(|| AppError::BadRequest("patientData is required".to_owned()))?;
    if body.nutritionist_id.is_some() {
        request.nutritionist_id = body.nutritionist_id;
    }

    let service = state.provisioning().clone();
    let patient = tokio::spawn(
        async move { service.provision_patient(&request).await }
            .instrument(tracing::Span::current()),
    )
    .await
    .map_err(|e| AppError::Internal(format!("provisioning task failed: {e}")))??;

    Ok(Json(PatientResponse {
        message: "Patient created and invitation sent",
        patient,
    }))
}

/// Send the invitation again for an existing patient.
///
/// # Route
///
/// `POST /patients/{id}/invitation`
pub async fn resend_invitation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PatientResponse>> {
    let id = PatientId::parse(&id).map_err(|e| AppError::BadRequest(format!("invalid id: {e}")))?;

    let patient = state.provisioning().resend_invitation(&id).await?;

    Ok(Json(PatientResponse {
        message: "Invitation sent",
        patient,
    }))
}
