//! Patient provisioning request and record types.
//!
//! [`PatientProvisioningRequest`] is the raw intake payload as the frontend
//! sends it. [`PatientProvisioningRequest::validate`] turns it into a
//! [`NewPatient`] with every field checked and normalized, and the store
//! returns a [`PatientRecord`] once the row exists.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::email::{Email, EmailError};
use super::gender::normalize_gender;
use super::id::{IdError, NutritionistId, PatientId};

/// Errors produced while validating a provisioning request.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The email address is malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The nutritionist identifier is malformed.
    #[error("invalid nutritionist id: {0}")]
    InvalidNutritionistId(IdError),

    /// The birth date is not an ISO `YYYY-MM-DD` date.
    #[error("invalid birth_date: {0}")]
    InvalidBirthDate(String),

    /// A measurement is negative, non-finite, or out of range.
    #[error("invalid {field}: {value}")]
    InvalidMeasurement {
        /// Wire name of the field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
}

/// Intake payload for a new patient.
///
/// Field names match the intake form (`height`, `initial_weight`, `bmr`);
/// the column names are accepted as aliases. Every field is optional at the
/// type level so that a missing required field becomes a
/// [`ValidationError`] instead of a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientProvisioningRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
    #[serde(rename = "height", alias = "height_cm")]
    pub height_cm: Option<f64>,
    #[serde(rename = "initial_weight", alias = "initial_weight_kg")]
    pub initial_weight_kg: Option<f64>,
    pub goal: Option<String>,
    pub body_fat_percentage: Option<f64>,
    #[serde(rename = "bmr", alias = "basal_metabolic_rate")]
    pub basal_metabolic_rate: Option<f64>,
    #[serde(alias = "nutritionistId", skip_serializing_if = "Option::is_none")]
    pub nutritionist_id: Option<String>,
}

/// Optional profile fields shared by [`NewPatient`] and [`PatientRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub initial_weight_kg: Option<f64>,
    pub goal: Option<String>,
    pub body_fat_percentage: Option<f64>,
    pub basal_metabolic_rate: Option<f64>,
}

/// A validated request, ready to be provisioned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
    pub name: String,
    pub email: Email,
    pub nutritionist_id: NutritionistId,
    pub profile: PatientProfile,
}

/// A persisted patient row.
///
/// `id` and `auth_user_id` always hold the identity provider's user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: PatientId,
    pub auth_user_id: PatientId,
    pub nutritionist_id: NutritionistId,
    pub name: String,
    pub email: Email,
    #[serde(flatten)]
    pub profile: PatientProfile,
    pub created_at: DateTime<Utc>,
}

impl PatientProvisioningRequest {
    /// Validate and normalize the request.
    ///
    /// Required: `name`, `email`, `nutritionist_id`. Blank strings and zero
    /// measurements (the form's untouched defaults) are treated as absent.
    /// Unknown gender codes are dropped rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered; required fields are
    /// checked before optional ones.
    pub fn validate(&self) -> Result<NewPatient, ValidationError> {
        let name = non_blank(self.name.as_deref()).ok_or(ValidationError::MissingField("name"))?;
        let email =
            non_blank(self.email.as_deref()).ok_or(ValidationError::MissingField("email"))?;
        let nutritionist_id = non_blank(self.nutritionist_id.as_deref())
            .ok_or(ValidationError::MissingField("nutritionist_id"))?;

        let email = Email::parse(email)?;
        let nutritionist_id =
            NutritionistId::parse(nutritionist_id).map_err(ValidationError::InvalidNutritionistId)?;

        let birth_date = non_blank(self.birth_date.as_deref())
            .map(|raw| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| ValidationError::InvalidBirthDate(raw.to_owned()))
            })
            .transpose()?;

        let body_fat_percentage = measurement("body_fat_percentage", self.body_fat_percentage)?;
        if let Some(value) = body_fat_percentage
            && value > 100.0
        {
            return Err(ValidationError::InvalidMeasurement {
                field: "body_fat_percentage",
                value,
            });
        }

        let profile = PatientProfile {
            phone: non_blank(self.phone.as_deref()).map(str::to_owned),
            gender: normalize_gender(self.gender.as_deref()).map(str::to_owned),
            birth_date,
            height_cm: measurement("height", self.height_cm)?,
            initial_weight_kg: measurement("initial_weight", self.initial_weight_kg)?,
            goal: non_blank(self.goal.as_deref()).map(str::to_owned),
            body_fat_percentage,
            basal_metabolic_rate: measurement("bmr", self.basal_metabolic_rate)?,
        };

        Ok(NewPatient {
            name: name.to_owned(),
            email,
            nutritionist_id,
            profile,
        })
    }
}

/// Trimmed value, or `None` when missing or blank.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Zero means "not filled in"; negative and non-finite values are rejected.
fn measurement(field: &'static str, value: Option<f64>) -> Result<Option<f64>, ValidationError> {
    match value {
        None => Ok(None),
        Some(v) if v.abs() < f64::EPSILON => Ok(None),
        Some(v) if !v.is_finite() || v < 0.0 => {
            Err(ValidationError::InvalidMeasurement { field, value: v })
        }
        Some(v) => Ok(Some(v)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn maria() -> PatientProvisioningRequest {
        PatientProvisioningRequest {
            name: Some("Maria Silva".to_owned()),
            email: Some("maria@example.com".to_owned()),
            nutritionist_id: Some("n1".to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn test_deserialize_form_payload() {
        let request: PatientProvisioningRequest = serde_json::from_value(serde_json::json!({
            "name": "Maria Silva",
            "email": "maria@example.com",
            "height": 165,
            "initial_weight": 68,
            "goal": "weight loss",
            "gender": "female",
            "bmr": 0
        }))
        .unwrap();

        assert_eq!(request.height_cm, Some(165.0));
        assert_eq!(request.initial_weight_kg, Some(68.0));
        assert_eq!(request.basal_metabolic_rate, Some(0.0));
        assert_eq!(request.nutritionist_id, None);
    }

    #[test]
    fn test_validate_required_fields() {
        let mut request = maria();
        request.name = Some("   ".to_owned());
        assert_eq!(
            request.validate(),
            Err(ValidationError::MissingField("name"))
        );

        let mut request = maria();
        request.email = None;
        assert_eq!(
            request.validate(),
            Err(ValidationError::MissingField("email"))
        );

        let mut request = maria();
        request.nutritionist_id = Some(String::new());
        assert_eq!(
            request.validate(),
            Err(ValidationError::MissingField("nutritionist_id"))
        );
    }

    #[test]
    fn test_validate_rejects_bad_email() {
        let mut request = maria();
        request.email = Some("maria@localhost".to_owned());
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidEmail(EmailError::InvalidDomain))
        ));
    }

    #[test]
    fn test_validate_normalizes_profile() {
        let mut request = maria();
        request.phone = Some(String::new());
        request.gender = Some("female".to_owned());
        request.height_cm = Some(165.0);
        request.initial_weight_kg = Some(0.0);
        request.goal = Some(" weight loss ".to_owned());
        request.birth_date = Some("1990-04-12".to_owned());

        let patient = request.validate().unwrap();
        assert_eq!(patient.name, "Maria Silva");
        assert_eq!(patient.nutritionist_id.as_str(), "n1");
        assert_eq!(patient.profile.phone, None);
        assert_eq!(patient.profile.gender.as_deref(), Some("Feminino"));
        assert_eq!(patient.profile.height_cm, Some(165.0));
        assert_eq!(patient.profile.initial_weight_kg, None);
        assert_eq!(patient.profile.goal.as_deref(), Some("weight loss"));
        assert_eq!(
            patient.profile.birth_date,
            NaiveDate::from_ymd_opt(1990, 4, 12)
        );
    }

    #[test]
    fn test_validate_unknown_gender_is_not_an_error() {
        let mut request = maria();
        request.gender = Some("x".to_owned());
        assert_eq!(request.validate().unwrap().profile.gender, None);
    }

    #[test]
    fn test_validate_rejects_bad_birth_date() {
        let mut request = maria();
        request.birth_date = Some("12/04/1990".to_owned());
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidBirthDate(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_measurements() {
        let mut request = maria();
        request.height_cm = Some(-1.0);
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidMeasurement { field: "height", .. })
        ));

        let mut request = maria();
        request.body_fat_percentage = Some(140.0);
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidMeasurement {
                field: "body_fat_percentage",
                ..
            })
        ));
    }

    #[test]
    fn test_record_serializes_flat_profile() {
        let record = PatientRecord {
            id: PatientId::new("u1"),
            auth_user_id: PatientId::new("u1"),
            nutritionist_id: NutritionistId::new("n1"),
            name: "Maria Silva".to_owned(),
            email: Email::parse("maria@example.com").unwrap(),
            profile: PatientProfile {
                gender: Some("Feminino".to_owned()),
                ..Default::default()
            },
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["gender"], "Feminino");
        assert!(json["phone"].is_null());
    }
}
