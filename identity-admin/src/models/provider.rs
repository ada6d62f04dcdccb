//! Federated sign-in provider configurations (OIDC and SAML).

use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

use crate::services::AuthError;

/// Provider id resolved once at the boundary into its closed set of kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Oidc(String),
    Saml(String),
}

impl ProviderId {
    pub fn parse(provider_id: &str) -> Result<Self, AuthError> {
        if provider_id.starts_with("oidc.") && provider_id.len() > "oidc.".len() {
            Ok(ProviderId::Oidc(provider_id.to_string()))
        } else if provider_id.starts_with("saml.") && provider_id.len() > "saml.".len() {
            Ok(ProviderId::Saml(provider_id.to_string()))
        } else {
            Err(AuthError::InvalidProviderId(format!(
                "\"{}\" is neither an oidc. nor a saml. provider ID",
                provider_id
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProviderId::Oidc(id) | ProviderId::Saml(id) => id,
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderId::Oidc(_) => ProviderType::Oidc,
            ProviderId::Saml(_) => ProviderType::Saml,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    Oidc,
    Saml,
}

impl FromStr for ProviderType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oidc" => Ok(ProviderType::Oidc),
            "saml" => Ok(ProviderType::Saml),
            _ => Err(AuthError::invalid_argument(format!(
                "Provider type must be \"oidc\" or \"saml\", got \"{}\"",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcProviderConfig {
    pub provider_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamlProviderConfig {
    pub provider_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idp_entity_id: Option<String>,
    #[serde(rename = "ssoURL", skip_serializing_if = "Option::is_none")]
    pub sso_url: Option<String>,
    pub x509_certificates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rp_entity_id: Option<String>,
    #[serde(rename = "callbackURL", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Oidc(OidcProviderConfig),
    Saml(SamlProviderConfig),
}

impl ProviderConfig {
    pub fn provider_id(&self) -> &str {
        match self {
            ProviderConfig::Oidc(c) => &c.provider_id,
            ProviderConfig::Saml(c) => &c.provider_id,
        }
    }
}

fn resource_id(response: &Value) -> Result<String, AuthError> {
    response
        .get("name")
        .and_then(Value::as_str)
        .and_then(|name| name.rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AuthError::internal("Directory returned a provider config without a name"))
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

impl OidcProviderConfig {
    /// Build from the directory's `oauthIdpConfigs` resource.
    pub fn from_server_response(response: &Value) -> Result<Self, AuthError> {
        Ok(Self {
            provider_id: resource_id(response)?,
            display_name: string_at(response, "/displayName"),
            enabled: response
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            client_id: string_at(response, "/clientId"),
            issuer: string_at(response, "/issuer"),
        })
    }
}

impl SamlProviderConfig {
    /// Build from the directory's `inboundSamlConfigs` resource.
    pub fn from_server_response(response: &Value) -> Result<Self, AuthError> {
        let x509_certificates = response
            .pointer("/idpConfig/idpCertificates")
            .and_then(Value::as_array)
            .map(|certs| {
                certs
                    .iter()
                    .filter_map(|c| c.get("x509Certificate").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            provider_id: resource_id(response)?,
            display_name: string_at(response, "/displayName"),
            enabled: response
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            idp_entity_id: string_at(response, "/idpConfig/idpEntityId"),
            sso_url: string_at(response, "/idpConfig/ssoUrl"),
            x509_certificates,
            rp_entity_id: string_at(response, "/spConfig/spEntityId"),
            callback_url: string_at(response, "/spConfig/callbackUri"),
        })
    }
}
