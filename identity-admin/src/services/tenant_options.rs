//! Tenant options validation and translation into directory requests.

use serde_json::{Map, Value};

use crate::dtos::TenantServerRequest;
use crate::models::{EmailSignInConfig, MultiFactorServerConfig, MultiFactorState};
use crate::services::phone_numbers::validate_test_phone_numbers;
use crate::services::AuthError;

const ALLOWED_TENANT_KEYS: [&str; 4] = [
    "displayName",
    "emailSignInConfig",
    "multiFactorConfig",
    "testPhoneNumbers",
];

/// Validates caller-supplied tenant options and builds the wire request.
pub struct TenantOptionsValidator;

impl TenantOptionsValidator {
    pub fn validate(options: &Value, is_create: bool) -> Result<(), AuthError> {
        let options = Self::as_options_object(options, is_create)?;

        if let Some(key) = options
            .keys()
            .find(|key| !ALLOWED_TENANT_KEYS.contains(&key.as_str()))
        {
            return Err(AuthError::invalid_argument(format!(
                "\"{}\" is not a valid {} tenant option",
                key,
                request_label(is_create)
            )));
        }

        if let Some(display_name) = options.get("displayName") {
            match display_name.as_str() {
                Some(name) if !name.is_empty() => {}
                _ => {
                    return Err(AuthError::invalid_argument(
                        "\"displayName\" must be a non-empty string",
                    ))
                }
            }
        }

        if let Some(email) = options.get("emailSignInConfig") {
            EmailSignInTranslator::validate(email)?;
        }

        if let Some(mfa) = options.get("multiFactorConfig") {
            MultiFactorTranslator::validate(mfa)?;
        }

        match options.get("testPhoneNumbers") {
            Some(Value::Null) if is_create => {
                return Err(AuthError::invalid_argument(
                    "\"testPhoneNumbers\" cannot be null when creating a tenant",
                ));
            }
            Some(Value::Null) | None => {}
            Some(numbers) => {
                validate_test_phone_numbers(numbers)?;
            }
        }

        Ok(())
    }

    pub fn build_server_request(
        options: &Value,
        is_create: bool,
    ) -> Result<TenantServerRequest, AuthError> {
        Self::validate(options, is_create)?;
        let options = Self::as_options_object(options, is_create)?;

        let mut request = TenantServerRequest {
            display_name: options
                .get("displayName")
                .and_then(Value::as_str)
                .map(str::to_string),
            ..Default::default()
        };

        if let Some(email) = options.get("emailSignInConfig") {
            let config = EmailSignInTranslator::validate(email)?;
            request.allow_password_signup = Some(config.enabled);
            request.enable_email_link_signin = config.password_required.map(|required| !required);
        }

        if let Some(mfa) = options.get("multiFactorConfig") {
            request.mfa_config = Some(MultiFactorTranslator::to_server_config(mfa)?);
        }

        request.test_phone_numbers = match options.get("testPhoneNumbers") {
            None => None,
            Some(Value::Null) => Some(Default::default()),
            Some(numbers) => Some(validate_test_phone_numbers(numbers)?),
        };

        Ok(request)
    }

    fn as_options_object(options: &Value, is_create: bool) -> Result<&Map<String, Value>, AuthError> {
        options.as_object().ok_or_else(|| {
            AuthError::invalid_argument(format!(
                "{} tenant options must be a non-null object",
                request_label(is_create)
            ))
        })
    }
}

fn request_label(is_create: bool) -> &'static str {
    if is_create {
        "CreateTenantRequest"
    } else {
        "UpdateTenantRequest"
    }
}

/// `{enabled: bool, passwordRequired?: bool}`
pub struct EmailSignInTranslator;

impl EmailSignInTranslator {
    pub fn validate(value: &Value) -> Result<EmailSignInConfig, AuthError> {
        let config = value.as_object().ok_or_else(|| {
            AuthError::InvalidConfig("\"emailSignInConfig\" must be a non-null object".to_string())
        })?;

        if let Some(key) = config
            .keys()
            .find(|k| !matches!(k.as_str(), "enabled" | "passwordRequired"))
        {
            return Err(AuthError::InvalidConfig(format!(
                "\"{}\" is not a valid EmailSignInConfig parameter",
                key
            )));
        }

        let enabled = config.get("enabled").and_then(Value::as_bool).ok_or_else(|| {
            AuthError::InvalidConfig(
                "\"EmailSignInConfig.enabled\" must be a boolean".to_string(),
            )
        })?;

        let password_required = match config.get("passwordRequired") {
            None => None,
            Some(Value::Bool(required)) => Some(*required),
            Some(_) => {
                return Err(AuthError::InvalidConfig(
                    "\"EmailSignInConfig.passwordRequired\" must be a boolean".to_string(),
                ))
            }
        };

        Ok(EmailSignInConfig {
            enabled,
            password_required,
        })
    }
}

/// `{state: "ENABLED" | "DISABLED", factorIds?: ["phone"]}`
pub struct MultiFactorTranslator;

impl MultiFactorTranslator {
    /// `factorIds` stays `None` when the caller left it out.
    pub fn validate(value: &Value) -> Result<(MultiFactorState, Option<Vec<String>>), AuthError> {
        let config = value.as_object().ok_or_else(|| {
            AuthError::InvalidConfig("\"multiFactorConfig\" must be a non-null object".to_string())
        })?;

        if let Some(key) = config
            .keys()
            .find(|k| !matches!(k.as_str(), "state" | "factorIds"))
        {
            return Err(AuthError::InvalidConfig(format!(
                "\"{}\" is not a valid MultiFactorConfig parameter",
                key
            )));
        }

        let state = match config.get("state").and_then(Value::as_str) {
            Some("ENABLED") => MultiFactorState::Enabled,
            Some("DISABLED") => MultiFactorState::Disabled,
            _ => {
                return Err(AuthError::InvalidConfig(
                    "\"MultiFactorConfig.state\" must be either \"ENABLED\" or \"DISABLED\""
                        .to_string(),
                ))
            }
        };

        let mut factor_ids = None;
        if let Some(ids) = config.get("factorIds") {
            let mut parsed = Vec::new();
            let ids = ids.as_array().ok_or_else(|| {
                AuthError::InvalidConfig(
                    "\"MultiFactorConfig.factorIds\" must be an array".to_string(),
                )
            })?;
            for id in ids {
                match id.as_str() {
                    Some("phone") => parsed.push("phone".to_string()),
                    _ => {
                        return Err(AuthError::InvalidConfig(format!(
                            "{} is not a valid AuthFactorType",
                            id
                        )))
                    }
                }
            }
            factor_ids = Some(parsed);
        }

        Ok((state, factor_ids))
    }

    pub fn to_server_config(value: &Value) -> Result<MultiFactorServerConfig, AuthError> {
        let (state, factor_ids) = Self::validate(value)?;
        let enabled_providers = factor_ids.map(|ids| {
            ids.iter()
                .map(|_| "PHONE_SMS".to_string())
                .collect::<Vec<_>>()
        });

        Ok(MultiFactorServerConfig {
            state: Some(state.as_str().to_string()),
            enabled_providers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_key_is_named_in_error() {
        let err = TenantOptionsValidator::validate(&json!({ "bogusKey": 1 }), true).unwrap_err();
        assert!(matches!(err, AuthError::InvalidArgument(_)));
        assert!(err.to_string().contains("bogusKey"));
    }

    #[test]
    fn non_object_options_are_rejected() {
        for options in [json!(null), json!("tenant"), json!([1, 2])] {
            assert!(matches!(
                TenantOptionsValidator::validate(&options, false),
                Err(AuthError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn display_name_must_be_non_empty_string() {
        assert!(TenantOptionsValidator::validate(&json!({ "displayName": "" }), true).is_err());
        assert!(TenantOptionsValidator::validate(&json!({ "displayName": 7 }), true).is_err());
        assert!(TenantOptionsValidator::validate(&json!({ "displayName": "Acme" }), true).is_ok());
    }

    #[test]
    fn null_test_phone_numbers_only_allowed_on_update() {
        let options = json!({ "testPhoneNumbers": null });
        assert!(matches!(
            TenantOptionsValidator::validate(&options, true),
            Err(AuthError::InvalidArgument(_))
        ));
        assert!(TenantOptionsValidator::validate(&options, false).is_ok());
    }

    #[test]
    fn nested_configs_are_delegated() {
        assert!(matches!(
            TenantOptionsValidator::validate(&json!({ "emailSignInConfig": { "enabled": "yes" } }), true),
            Err(AuthError::InvalidConfig(_))
        ));
        assert!(matches!(
            TenantOptionsValidator::validate(&json!({ "multiFactorConfig": { "state": "ON" } }), true),
            Err(AuthError::InvalidConfig(_))
        ));
        assert!(matches!(
            TenantOptionsValidator::validate(&json!({ "testPhoneNumbers": { "+15551234567": "12" } }), true),
            Err(AuthError::InvalidTestingPhoneNumber(_))
        ));
    }

    #[test]
    fn builds_full_server_request() -> Result<(), AuthError> {
        let request = TenantOptionsValidator::build_server_request(
            &json!({
                "displayName": "Acme",
                "emailSignInConfig": { "enabled": true, "passwordRequired": false },
                "multiFactorConfig": { "state": "ENABLED", "factorIds": ["phone"] },
                "testPhoneNumbers": { "+15551234567": "123456" }
            }),
            true,
        )?;

        assert_eq!(request.display_name.as_deref(), Some("Acme"));
        assert_eq!(request.allow_password_signup, Some(true));
        assert_eq!(request.enable_email_link_signin, Some(true));
        assert_eq!(
            request.mfa_config,
            Some(MultiFactorServerConfig {
                state: Some("ENABLED".to_string()),
                enabled_providers: Some(vec!["PHONE_SMS".to_string()]),
            })
        );
        assert_eq!(
            request
                .test_phone_numbers
                .as_ref()
                .and_then(|n| n.get("+15551234567"))
                .map(String::as_str),
            Some("123456")
        );
        Ok(())
    }

    #[test]
    fn partial_nested_configs_leave_unset_fields_out() -> Result<(), AuthError> {
        let request = TenantOptionsValidator::build_server_request(
            &json!({
                "emailSignInConfig": { "enabled": true },
                "multiFactorConfig": { "state": "DISABLED" }
            }),
            false,
        )?;

        let wire = serde_json::to_value(&request)
            .map_err(|e| AuthError::internal(e.to_string()))?;
        assert_eq!(
            wire,
            json!({
                "allowPasswordSignup": true,
                "mfaConfig": { "state": "DISABLED" }
            })
        );

        let cleared = MultiFactorTranslator::to_server_config(
            &json!({ "state": "DISABLED", "factorIds": [] }),
        )?;
        assert_eq!(cleared.enabled_providers, Some(Vec::new()));
        Ok(())
    }

    #[test]
    fn null_test_phone_numbers_become_empty_map_and_absent_fields_are_omitted() -> Result<(), AuthError> {
        let request =
            TenantOptionsValidator::build_server_request(&json!({ "testPhoneNumbers": null }), false)?;

        assert_eq!(request.test_phone_numbers, Some(Default::default()));
        let wire = serde_json::to_value(&request)
            .map_err(|e| AuthError::internal(e.to_string()))?;
        assert_eq!(wire, json!({ "testPhoneNumbers": {} }));
        Ok(())
    }
}
