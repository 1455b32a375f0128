//! Field validation run before any store access.

use crate::auth::luhn;
use crate::error::{EngineError, Result};

/// Minimum password length.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Present and not blank. Returns the trimmed value.
pub fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EngineError::bad_request(format!("value {field} is required")))
}

/// Required, syntactically valid email, normalized to lowercase.
pub fn email(value: Option<&str>) -> Result<String> {
    let email = required("email", value)?.to_lowercase();
    if is_email(&email) {
        Ok(email)
    } else {
        Err(EngineError::bad_request("value email is invalid"))
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

/// Required password of at least [`PASSWORD_MIN_LENGTH`] characters with an
/// uppercase letter, a lowercase letter, a digit and a symbol.
pub fn password(value: Option<&str>) -> Result<&str> {
    // Passwords are not trimmed: surrounding spaces are part of the secret.
    let password = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| EngineError::bad_request("value password is required"))?;
    let strong = password.chars().count() >= PASSWORD_MIN_LENGTH
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if strong {
        Ok(password)
    } else {
        Err(EngineError::bad_request("value password is invalid"))
    }
}

/// Required validation code with a valid check digit.
pub fn code(value: Option<&str>) -> Result<&str> {
    let code = required("token", value)?;
    if luhn::verify(code) {
        Ok(code)
    } else {
        Err(EngineError::bad_request("value token is invalid"))
    }
}

/// A flag that must be present and set, such as accepted terms of use.
pub fn accepted(field: &str, value: Option<bool>) -> Result<()> {
    match value {
        Some(true) => Ok(()),
        _ => Err(EngineError::bad_request(format!("value {field} is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn required_rejects_missing_and_blank() {
        assert_eq!(required("id", Some(" abc ")).unwrap(), "abc");
        let err = required("id", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.message(), "value id is required");
        assert_eq!(required("id", Some("   ")).unwrap_err().message(), "value id is required");
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(email(Some("  A@X.com ")).unwrap(), "a@x.com");
        for bad in ["ax.com", "a@x", "@x.com", "a@@x.com", "a b@x.com", "a@x..com"] {
            assert_eq!(
                email(Some(bad)).unwrap_err().message(),
                "value email is invalid",
                "{bad}"
            );
        }
        assert_eq!(email(None).unwrap_err().message(), "value email is required");
    }

    #[test]
    fn password_strength() {
        assert!(password(Some("Valid1@Pass")).is_ok());
        assert!(password(Some("Short1@A")).is_ok());
        for weak in ["alllower1@", "ALLUPPER1@", "NoDigits@@", "NoSymbol12"] {
            assert_eq!(
                password(Some(weak)).unwrap_err().message(),
                "value password is invalid",
                "{weak}"
            );
        }
        assert_eq!(password(Some("Sh0rt@")).unwrap_err().message(), "value password is invalid");
        assert_eq!(password(None).unwrap_err().message(), "value password is required");
    }

    #[test]
    fn codes_are_checksummed() {
        assert_eq!(code(Some("123455")).unwrap(), "123455");
        assert_eq!(code(Some("123456")).unwrap_err().message(), "value token is invalid");
        assert_eq!(code(Some("12a455")).unwrap_err().message(), "value token is invalid");
        assert_eq!(code(None).unwrap_err().message(), "value token is required");
    }

    #[test]
    fn accepted_requires_true() {
        assert!(accepted("cgu", Some(true)).is_ok());
        assert_eq!(accepted("cgu", Some(false)).unwrap_err().message(), "value cgu is required");
        assert!(accepted("cgu", None).is_err());
    }
}
