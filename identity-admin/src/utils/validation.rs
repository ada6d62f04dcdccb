//! Fail-fast argument checks. Nothing here performs I/O.

use serde_json::{Map, Value};
use validator::ValidateEmail;

use crate::services::AuthError;

pub const MAX_UID_LENGTH: usize = 128;
pub const MAX_CLAIMS_PAYLOAD_SIZE: usize = 1000;

/// Claim names owned by the token format itself.
pub const RESERVED_CLAIMS: [&str; 9] = [
    "sub",
    "iss",
    "aud",
    "exp",
    "iat",
    "nbf",
    "jti",
    "auth_time",
    "firebase",
];

pub fn validate_uid(uid: &str) -> Result<(), AuthError> {
    if uid.is_empty() || uid.chars().count() > MAX_UID_LENGTH {
        return Err(AuthError::InvalidUid(format!(
            "uid must be a non-empty string with at most {} characters",
            MAX_UID_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if !email.to_owned().validate_email() {
        return Err(AuthError::InvalidEmail(format!(
            "\"{}\" is not a valid email address",
            email
        )));
    }
    Ok(())
}

/// `+` followed by 1 to 15 digits, the first non-zero.
pub fn is_e164(phone_number: &str) -> bool {
    let Some(digits) = phone_number.strip_prefix('+') else {
        return false;
    };
    !digits.is_empty()
        && digits.len() <= 15
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !digits.starts_with('0')
}

pub fn validate_phone_number(phone_number: &str) -> Result<(), AuthError> {
    if !is_e164(phone_number) {
        return Err(AuthError::InvalidPhoneNumber(format!(
            "\"{}\" is not an E.164 phone number",
            phone_number
        )));
    }
    Ok(())
}

pub fn validate_provider_link(provider_id: &str, provider_uid: &str) -> Result<(), AuthError> {
    if provider_id.is_empty() {
        return Err(AuthError::InvalidProviderId(
            "Provider ID must be a non-empty string".to_string(),
        ));
    }
    if provider_uid.is_empty() {
        return Err(AuthError::InvalidProviderUid(
            "Provider uid must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

/// Developer claims must avoid reserved names and stay within
/// `MAX_CLAIMS_PAYLOAD_SIZE` bytes once serialized.
pub fn validate_developer_claims(claims: &Map<String, Value>) -> Result<(), AuthError> {
    if let Some(reserved) = claims
        .keys()
        .find(|key| RESERVED_CLAIMS.contains(&key.as_str()))
    {
        return Err(AuthError::invalid_argument(format!(
            "Developer claim \"{}\" is reserved and cannot be specified",
            reserved
        )));
    }

    let size = serde_json::to_vec(claims)?.len();
    if size > MAX_CLAIMS_PAYLOAD_SIZE {
        return Err(AuthError::invalid_argument(format!(
            "Developer claims payload is {} bytes, the maximum is {}",
            size, MAX_CLAIMS_PAYLOAD_SIZE
        )));
    }

    Ok(())
}

pub fn validate_page_token(page_token: Option<&str>) -> Result<(), AuthError> {
    if matches!(page_token, Some("")) {
        return Err(AuthError::InvalidPageToken(
            "Page token must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uid_bounds() {
        assert!(validate_uid("user_123").is_ok());
        assert!(matches!(validate_uid(""), Err(AuthError::InvalidUid(_))));
        assert!(validate_uid(&"a".repeat(128)).is_ok());
        assert!(matches!(
            validate_uid(&"a".repeat(129)),
            Err(AuthError::InvalidUid(_))
        ));
    }

    #[test]
    fn email_format() {
        assert!(validate_email("b@x.com").is_ok());
        assert!(matches!(
            validate_email("not-an-email"),
            Err(AuthError::InvalidEmail(_))
        ));
    }

    #[test]
    fn e164_numbers() {
        assert!(is_e164("+15551234567"));
        assert!(is_e164("+15551234"));
        assert!(!is_e164("15551234567"));
        assert!(!is_e164("+"));
        assert!(!is_e164("+0555"));
        assert!(!is_e164("+1 555 123"));
        assert!(!is_e164("+1234567890123456"));
    }

    #[test]
    fn reserved_claims_are_rejected() {
        let claims = json!({ "premium": true, "auth_time": 5 });
        let claims = claims.as_object().cloned().unwrap_or_default();
        let err = validate_developer_claims(&claims).unwrap_err();
        assert!(matches!(err, AuthError::InvalidArgument(_)));
        assert!(err.to_string().contains("auth_time"));
    }

    #[test]
    fn oversized_claims_are_rejected() {
        let mut claims = Map::new();
        claims.insert("blob".to_string(), Value::String("x".repeat(1000)));
        assert!(matches!(
            validate_developer_claims(&claims),
            Err(AuthError::InvalidArgument(_))
        ));

        let mut small = Map::new();
        small.insert("role".to_string(), Value::String("admin".to_string()));
        assert!(validate_developer_claims(&small).is_ok());
    }

    #[test]
    fn empty_page_token_is_rejected() {
        assert!(validate_page_token(None).is_ok());
        assert!(validate_page_token(Some("abc")).is_ok());
        assert!(matches!(
            validate_page_token(Some("")),
            Err(AuthError::InvalidPageToken(_))
        ));
    }
}
