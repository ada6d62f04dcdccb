//! Validation of a tenant's test phone numbers.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::services::AuthError;
use crate::utils::validation::is_e164;

pub const MAXIMUM_TEST_PHONE_NUMBERS: usize = 10;
const TEST_CODE_LENGTH: usize = 6;

/// Validate a `phone number -> 6-digit code` map and return it typed.
pub fn validate_test_phone_numbers(value: &Value) -> Result<BTreeMap<String, String>, AuthError> {
    let entries = value.as_object().ok_or_else(|| {
        AuthError::invalid_argument("testPhoneNumbers must be a map of phone numbers to codes")
    })?;

    if entries.len() > MAXIMUM_TEST_PHONE_NUMBERS {
        return Err(AuthError::MaximumTestPhoneNumberExceeded(format!(
            "{} test phone numbers given, at most {} are allowed",
            entries.len(),
            MAXIMUM_TEST_PHONE_NUMBERS
        )));
    }

    let mut numbers = BTreeMap::new();
    for (phone_number, code) in entries {
        if !is_e164(phone_number) {
            return Err(AuthError::InvalidTestingPhoneNumber(format!(
                "\"{}\" is not a valid E.164 phone number",
                phone_number
            )));
        }

        let code = code.as_str().filter(|c| is_test_code(c)).ok_or_else(|| {
            AuthError::InvalidTestingPhoneNumber(format!(
                "\"{}\" for \"{}\" is not a valid {}-digit code",
                code, phone_number, TEST_CODE_LENGTH
            ))
        })?;

        numbers.insert(phone_number.clone(), code.to_string());
    }

    Ok(numbers)
}

fn is_test_code(code: &str) -> bool {
    code.len() == TEST_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
