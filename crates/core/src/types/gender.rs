//! Gender code normalization.
//!
//! The intake form submits short codes (`male`, `female`) while the patient
//! table stores the display labels shown to nutritionists. Normalization is
//! lenient: an unknown code yields `None` and is stored as `NULL`.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Patient gender as recorded on the intake form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Map a form code or an already-localized label to a `Gender`.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "male" | "m" | "masculino" => Some(Self::Male),
            "female" | "f" | "feminino" => Some(Self::Female),
            _ => None,
        }
    }

    /// Display label stored in the patient record.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Masculino",
            Self::Female => "Feminino",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalize a raw gender code into the stored label.
///
/// Returns `None` for missing, blank, or unrecognized codes.
#[must_use]
pub fn normalize_gender(code: Option<&str>) -> Option<&'static str> {
    code.and_then(Gender::from_code).map(Gender::label)
}
