//! Boundary checks shared by the builder and the service.
//!
//! Tokens and uids are opaque: any non-empty string is accepted and compared byte for byte,
//! so no trimming or case folding happens here.

use crate::error::ValidationError;

/// Validates a presented or stored token
///
/// # Examples
///
/// ```rust
/// use kagi_core::validation::validate_token;
///
/// assert!(validate_token("0f9c2e").is_ok());
/// assert!(validate_token("").is_err());
/// ```
pub fn validate_token(token: &str) -> Result<(), ValidationError> {
    require_non_empty(token, "token")
}

/// Validates a user identifier
///
/// # Examples
///
/// ```rust
/// use kagi_core::validation::validate_uid;
///
/// assert!(validate_uid("user@example.com").is_ok());
/// assert!(validate_uid("").is_err());
/// ```
pub fn validate_uid(uid: &str) -> Result<(), ValidationError> {
    require_non_empty(uid, "uid")
}

fn require_non_empty(value: &str, field_name: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::MissingField(field_name.to_string()));
    }
    Ok(())
}
