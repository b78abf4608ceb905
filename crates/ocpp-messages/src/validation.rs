//! Field-level validation for OCPP messages
//!
//! OCPP 1.6J constrains most string fields to case-insensitive strings of a
//! fixed maximum length (`CiString20Type`, `CiString50Type`, ...). The
//! helpers here are used by the `validate()` implementations of the message
//! structs.

use ocpp_types::{OcppError, OcppResult};

/// Maximum length of a `CiString20Type` field (e.g. idTag)
pub const CI_STRING_20: usize = 20;
/// Maximum length of a `CiString25Type` field
pub const CI_STRING_25: usize = 25;
/// Maximum length of a `CiString50Type` field (e.g. configuration keys)
pub const CI_STRING_50: usize = 50;
/// Maximum length of a `CiString255Type` field (e.g. vendorId)
pub const CI_STRING_255: usize = 255;

/// Check a CiString field against its maximum length.
///
/// OCPP requires the content to be printable ASCII; anything else is a
/// PropertyConstraintViolation on the wire.
pub fn check_ci_string(field: &str, value: &str, max_len: usize) -> OcppResult<()> {
    if value.len() > max_len {
        return Err(OcppError::ValidationError {
            message: format!(
                "Field '{}' exceeds maximum length {} (got {})",
                field,
                max_len,
                value.len()
            ),
        });
    }
    if !value.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err(OcppError::ValidationError {
            message: format!("Field '{}' contains non-printable or non-ASCII characters", field),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_limit() {
        assert!(check_ci_string("idTag", "ABCDEF", CI_STRING_20).is_ok());
        assert!(check_ci_string("idTag", &"A".repeat(20), CI_STRING_20).is_ok());
        assert!(check_ci_string("idTag", &"A".repeat(21), CI_STRING_20).is_err());
    }

    #[test]
    fn test_ascii_only() {
        assert!(check_ci_string("idTag", "café", CI_STRING_20).is_err());
        assert!(check_ci_string("idTag", "tab\there", CI_STRING_20).is_err());
        assert!(check_ci_string("idTag", "plain text 123", CI_STRING_20).is_ok());
    }

    #[test]
    fn test_empty_is_valid() {
        assert!(check_ci_string("info", "", CI_STRING_50).is_ok());
    }
}
