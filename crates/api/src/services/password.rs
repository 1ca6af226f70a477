//! Temporary credential generation.

use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::SecretString;

/// Length of generated temporary passwords.
pub const TEMPORARY_PASSWORD_LENGTH: usize = 24;

/// Generate a random single-use password for a new identity.
///
/// The patient never sees it; they set their own password through the
/// invitation link.
#[must_use]
pub fn generate_temporary_password() -> SecretString {
    let password: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_PASSWORD_LENGTH)
        .map(char::from)
        .collect();
    SecretString::from(password)
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_password_shape() {
        let password = generate_temporary_password();
        let raw = password.expose_secret();
        assert_eq!(raw.len(), TEMPORARY_PASSWORD_LENGTH);
        assert!(raw.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_passwords_differ() {
        let a = generate_temporary_password();
        let b = generate_temporary_password();
        assert_ne!(a.expose_secret(), b.expose_secret());
    }
}
