//! Newtype IDs for type-safe entity references.
//!
//! Identifiers in this system are opaque strings minted by the identity
//! platform (UUIDs in practice, but nothing here depends on that). The
//! `define_id!` macro wraps them so a patient id cannot be passed where a
//! nutritionist id is expected.

/// Errors that can occur when parsing an identifier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input is empty or only whitespace.
    #[error("identifier cannot be empty")]
    Empty,
    /// The input is longer than [`MAX_ID_LENGTH`].
    #[error("identifier must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// Upper bound on identifier length.
pub const MAX_ID_LENGTH: usize = 128;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `parse()` (validated) and `new()` (trusted source) constructors
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use nutri_core::define_id;
/// define_id!(PatientId);
/// define_id!(NutritionistId);
///
/// let patient = PatientId::parse("5b0c").unwrap();
/// let nutritionist = NutritionistId::parse("5b0c").unwrap();
///
/// // Same text, different types, so this won't compile:
/// // let _: PatientId = nutritionist;
/// # let _ = (patient, nutritionist);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier coming from a trusted source (database, identity provider).
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parse an identifier supplied by a caller.
            ///
            /// # Errors
            ///
            /// Returns an error if the trimmed input is empty or too long.
            pub fn parse(id: &str) -> ::core::result::Result<Self, $crate::IdError> {
                let id = id.trim();
                if id.is_empty() {
                    return Err($crate::IdError::Empty);
                }
                if id.len() > $crate::MAX_ID_LENGTH {
                    return Err($crate::IdError::TooLong {
                        max: $crate::MAX_ID_LENGTH,
                    });
                }
                Ok(Self(id.to_owned()))
            }

            /// Get the underlying identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

// The identity provider's user id doubles as the patient primary key.
define_id!(PatientId);
define_id!(NutritionistId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        let id = PatientId::parse("  abc-123 ").unwrap();
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(NutritionistId::parse(""), Err(IdError::Empty));
        assert_eq!(NutritionistId::parse("  \t"), Err(IdError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "x".repeat(MAX_ID_LENGTH + 1);
        assert!(matches!(
            PatientId::parse(&long),
            Err(IdError::TooLong { .. })
        ));
    }

    #[test]
    fn test_serde_transparent() {
        let id = NutritionistId::new("n1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"n1\"");
    }
}
