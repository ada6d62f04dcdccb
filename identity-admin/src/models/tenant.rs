//! Tenant model - isolated partitions of accounts and configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::services::AuthError;

/// Tenant an `Auth` instance is bound to. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: String,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Result<Self, AuthError> {
        let tenant_id = tenant_id.into();
        if tenant_id.is_empty() {
            return Err(AuthError::InvalidTenantId(
                "Tenant ID must be a non-empty string".to_string(),
            ));
        }
        Ok(Self { tenant_id })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
}

/// Email/password sign-in settings of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSignInConfig {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_required: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MultiFactorState {
    Enabled,
    Disabled,
}

impl MultiFactorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MultiFactorState::Enabled => "ENABLED",
            MultiFactorState::Disabled => "DISABLED",
        }
    }
}

/// Multi-factor settings of a tenant. `factor_ids` uses client names (`phone`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiFactorConfig {
    pub state: MultiFactorState,
    #[serde(default)]
    pub factor_ids: Vec<String>,
}

/// Multi-factor settings in the directory's wire shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiFactorServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_providers: Option<Vec<String>>,
}

/// Tenant in the directory's wire shape. `name` is `projects/{p}/tenants/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_password_signup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_email_link_signin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_config: Option<MultiFactorServerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_phone_numbers: Option<BTreeMap<String, String>>,
}

/// Public tenant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub email_sign_in_config: EmailSignInConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_factor_config: Option<MultiFactorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_phone_numbers: Option<BTreeMap<String, String>>,
}

impl TryFrom<TenantResponse> for Tenant {
    type Error = AuthError;

    fn try_from(response: TenantResponse) -> Result<Self, Self::Error> {
        let tenant_id = response
            .name
            .rsplit_once("/tenants/")
            .map(|(_, id)| id.to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AuthError::internal(format!(
                    "Directory returned a tenant with an invalid name: {:?}",
                    response.name
                ))
            })?;

        let email_sign_in_config = EmailSignInConfig {
            enabled: response.allow_password_signup.unwrap_or(false),
            password_required: Some(!response.enable_email_link_signin.unwrap_or(false)),
        };

        let multi_factor_config = match response.mfa_config {
            Some(mfa) => Some(MultiFactorConfig {
                state: match mfa.state.as_deref() {
                    Some("ENABLED") => MultiFactorState::Enabled,
                    _ => MultiFactorState::Disabled,
                },
                factor_ids: mfa
                    .enabled_providers
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|p| match p.as_str() {
                        "PHONE_SMS" => Some("phone".to_string()),
                        _ => None,
                    })
                    .collect(),
            }),
            None => None,
        };

        Ok(Tenant {
            tenant_id,
            display_name: response.display_name,
            email_sign_in_config,
            multi_factor_config,
            test_phone_numbers: response.test_phone_numbers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tenant_context_is_rejected() {
        assert!(matches!(
            TenantContext::new(""),
            Err(AuthError::InvalidTenantId(_))
        ));
        assert!(TenantContext::new("tenant-1").is_ok());
    }

    #[test]
    fn tenant_id_is_taken_from_resource_name() -> Result<(), AuthError> {
        let tenant = Tenant::try_from(TenantResponse {
            name: "projects/demo/tenants/tenant-1".to_string(),
            display_name: Some("Tenant One".to_string()),
            allow_password_signup: Some(true),
            enable_email_link_signin: Some(false),
            mfa_config: Some(MultiFactorServerConfig {
                state: Some("ENABLED".to_string()),
                enabled_providers: Some(vec!["PHONE_SMS".to_string()]),
            }),
            test_phone_numbers: None,
        })?;

        assert_eq!(tenant.tenant_id, "tenant-1");
        assert!(tenant.email_sign_in_config.enabled);
        assert_eq!(tenant.email_sign_in_config.password_required, Some(true));
        let mfa = tenant.multi_factor_config.ok_or_else(|| AuthError::internal("mfa"))?;
        assert_eq!(mfa.state, MultiFactorState::Enabled);
        assert_eq!(mfa.factor_ids, vec!["phone".to_string()]);
        Ok(())
    }

    #[test]
    fn malformed_tenant_name_is_internal() {
        let result = Tenant::try_from(TenantResponse {
            name: "projects/demo".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
