//! Input validation for phone numbers and passwords
//!
//! `PhoneNumber` keeps its field private to force validation through `new()`.

use std::fmt;

use crate::error::WalletError;

/// Digits following the leading `+` in a valid phone number.
pub const PHONE_DIGITS: usize = 12;

/// Exact password length accepted by the policy.
pub const PASSWORD_LENGTH: usize = 8;

// ============================================================================
// Validation Errors
// ============================================================================

/// Validation errors for user-supplied identifiers
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Phone must start with '+': got '{got}'")]
    MissingPlus { got: String },

    #[error("Invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid format for {field}: '{value}' (expected: {expected})")]
    InvalidFormat {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl From<ValidationError> for WalletError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::InvalidLength {
                field: "password", ..
            } => WalletError::WeakPassword,
            _ => WalletError::InvalidPhone,
        }
    }
}

// ============================================================================
// PhoneNumber - Validated Phone (Private Fields)
// ============================================================================

/// Validated phone number: `+` followed by exactly 12 ASCII digits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Create a new validated PhoneNumber
    ///
    /// The input is taken as-is; surrounding whitespace is a format error.
    ///
    /// # Examples
    /// ```
    /// use walletx::account::validation::PhoneNumber;
    ///
    /// let phone = PhoneNumber::new("+998901234567").unwrap();
    /// assert_eq!(phone.as_str(), "+998901234567");
    ///
    /// assert!(PhoneNumber::new("998901234567").is_err()); // no '+'
    /// ```
    pub fn new(phone: &str) -> Result<Self, ValidationError> {
        let Some(digits) = phone.strip_prefix('+') else {
            return Err(ValidationError::MissingPlus {
                got: phone.to_string(),
            });
        };

        if digits.len() != PHONE_DIGITS {
            return Err(ValidationError::InvalidLength {
                field: "phone",
                expected: PHONE_DIGITS,
                actual: digits.chars().count(),
            });
        }

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "phone",
                value: phone.to_string(),
                expected: "'+' followed by 12 digits",
            });
        }

        Ok(Self(phone.to_string()))
    }

    /// Get the validated phone as &str
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ephemeral-store key holding this phone's verification code
    pub fn code_key(&self) -> String {
        format!("verify:{}", self.0)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Password policy
// ============================================================================

/// Check the password policy: exactly 8 characters.
pub fn check_password_policy(password: &str) -> Result<(), ValidationError> {
    let actual = password.chars().count();
    if actual != PASSWORD_LENGTH {
        return Err(ValidationError::InvalidLength {
            field: "password",
            expected: PASSWORD_LENGTH,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("+998901234567")]
    #[case("+000000000000")]
    fn test_phone_valid(#[case] input: &str) {
        let phone = PhoneNumber::new(input).unwrap();
        assert_eq!(phone.as_str(), input);
        assert_eq!(phone.to_string(), input);
    }

    #[rstest]
    #[case("")]
    #[case("+")]
    #[case("998901234567")]
    #[case("+99890123456")]
    #[case("+9989012345678")]
    #[case("+99890123456a")]
    #[case(" +998901234567")]
    #[case("+998 90123456")]
    #[case("+٩٩٨٩٠١٢٣٤٥٦٧")]
    fn test_phone_invalid(#[case] input: &str) {
        assert!(PhoneNumber::new(input).is_err());
    }

    #[test]
    fn test_phone_error_maps_to_invalid_phone() {
        let err: WalletError = PhoneNumber::new("12345").unwrap_err().into();
        assert_eq!(err, WalletError::InvalidPhone);
    }

    #[test]
    fn test_code_key() {
        let phone = PhoneNumber::new("+998901234567").unwrap();
        assert_eq!(phone.code_key(), "verify:+998901234567");
    }

    #[rstest]
    #[case("abcd1234", true)]
    #[case("пароль12", true)]
    #[case("short", false)]
    #[case("", false)]
    #[case("muchtoolong", false)]
    fn test_password_policy(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(check_password_policy(input).is_ok(), ok);
    }

    #[test]
    fn test_password_error_maps_to_weak_password() {
        let err: WalletError = check_password_policy("1234567").unwrap_err().into();
        assert_eq!(err, WalletError::WeakPassword);
    }
}
