//! Patient repository backed by `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::instrument;

use nutri_core::{Email, NewPatient, NutritionistId, PatientId, PatientProfile, PatientRecord};

use super::{PatientStore, RepositoryError};

const PATIENT_COLUMNS: &str = "id, auth_user_id, nutritionist_id, name, email, phone, gender, \
     birth_date, height_cm, initial_weight_kg, goal, body_fat_percentage, \
     basal_metabolic_rate, created_at";

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
struct PatientRow {
    id: String,
    auth_user_id: Option<String>,
    nutritionist_id: String,
    name: String,
    email: String,
    phone: Option<String>,
    gender: Option<String>,
    birth_date: Option<NaiveDate>,
    height_cm: Option<f64>,
    initial_weight_kg: Option<f64>,
    goal: Option<String>,
    body_fat_percentage: Option<f64>,
    basal_metabolic_rate: Option<f64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PatientRow> for PatientRecord {
    type Error = RepositoryError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let id = PatientId::new(row.id);
        let auth_user_id = row.auth_user_id.map_or_else(|| id.clone(), PatientId::new);

        Ok(Self {
            id,
            auth_user_id,
            nutritionist_id: NutritionistId::new(row.nutritionist_id),
            name: row.name,
            email,
            profile: PatientProfile {
                phone: row.phone,
                gender: row.gender,
                birth_date: row.birth_date,
                height_cm: row.height_cm,
                initial_weight_kg: row.initial_weight_kg,
                goal: row.goal,
                body_fat_percentage: row.body_fat_percentage,
                basal_metabolic_rate: row.basal_metabolic_rate,
            },
            created_at: row.created_at,
        })
    }
}

/// Patient store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgPatientStore {
    pool: PgPool,
}

impl PgPatientStore {
    /// Create a new patient store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatientStore for PgPatientStore {
    /// Insert a patient row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the id or email already exists,
    /// `RepositoryError::Constraint` if the nutritionist does not exist, and
    /// `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, patient), fields(patient_id = %id, nutritionist_id = %patient.nutritionist_id))]
    async fn insert(
        &self,
        id: &PatientId,
        patient: &NewPatient,
    ) -> Result<PatientRecord, RepositoryError> {
        let profile = &patient.profile;
        let sql = format!(
            r"
            INSERT INTO patients (
                id, auth_user_id, nutritionist_id, name, email, phone, gender,
                birth_date, height_cm, initial_weight_kg, goal,
                body_fat_percentage, basal_metabolic_rate
            )
            VALUES ($1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {PATIENT_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(id)
            .bind(&patient.nutritionist_id)
            .bind(&patient.name)
            .bind(&patient.email)
            .bind(profile.phone.as_deref())
            .bind(profile.gender.as_deref())
            .bind(profile.birth_date)
            .bind(profile.height_cm)
            .bind(profile.initial_weight_kg)
            .bind(profile.goal.as_deref())
            .bind(profile.body_fat_percentage)
            .bind(profile.basal_metabolic_rate)
            .fetch_one(&self.pool)
            .await
            .map_err(map_insert_error)?;

        row.try_into()
    }

    /// Fetch a patient by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(patient_id = %id))]
    async fn find_by_id(&self, id: &PatientId) -> Result<Option<PatientRecord>, RepositoryError> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1");

        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn map_insert_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(db_err.message().to_owned());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Constraint(db_err.message().to_owned());
        }
    }
    RepositoryError::Database(e)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row() -> PatientRow {
        PatientRow {
            id: "u1".to_owned(),
            auth_user_id: None,
            nutritionist_id: "n1".to_owned(),
            name: "Maria Silva".to_owned(),
            email: "maria@example.com".to_owned(),
            phone: None,
            gender: Some("Feminino".to_owned()),
            birth_date: None,
            height_cm: Some(165.0),
            initial_weight_kg: Some(68.0),
            goal: Some("weight loss".to_owned()),
            body_fat_percentage: None,
            basal_metabolic_rate: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let record = PatientRecord::try_from(row()).unwrap();
        assert_eq!(record.id.as_str(), "u1");
        assert_eq!(record.auth_user_id, record.id);
        assert_eq!(record.profile.gender.as_deref(), Some("Feminino"));
    }

    #[test]
    fn test_row_conversion_rejects_corrupt_email() {
        let mut bad = row();
        bad.email = "broken".to_owned();
        assert!(matches!(
            PatientRecord::try_from(bad),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        assert!(matches!(
            map_insert_error(sqlx::Error::RowNotFound),
            RepositoryError::Database(_)
        ));
    }
}
