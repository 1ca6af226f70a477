//! Role claims carried in identity application metadata.

use serde::{Deserialize, Serialize};

/// Role claim attached to an identity by the platform's admin API.
///
/// The frontend routes users to the patient or nutritionist area based on
/// this claim, so provisioning always stamps new patients with
/// [`RoleClaim::Patient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleClaim {
    /// A patient under a nutritionist's care.
    Patient,
    /// A nutritionist who owns patients.
    Nutritionist,
    /// Platform administrator.
    Admin,
}

impl RoleClaim {
    /// Wire value used in `app_metadata.role`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Nutritionist => "nutritionist",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for RoleClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoleClaim {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Self::Patient),
            "nutritionist" => Ok(Self::Nutritionist),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role claim: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_claim_wire_format() {
        assert_eq!(
            serde_json::to_value(RoleClaim::Patient).unwrap(),
            serde_json::json!("patient")
        );
        assert_eq!("admin".parse::<RoleClaim>().unwrap(), RoleClaim::Admin);
        assert!("superuser".parse::<RoleClaim>().is_err());
    }
}
