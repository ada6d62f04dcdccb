//! Routing of provider configuration operations to the OIDC or SAML RPCs.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;
use validator::ValidateUrl;

use crate::dtos::{AuthProviderConfigFilter, ListProviderConfigResult};
use crate::models::{
    OidcProviderConfig, ProviderConfig, ProviderId, ProviderType, SamlProviderConfig,
};
use crate::services::directory::{AccountDirectory, MAX_LIST_PROVIDER_CONFIGS_RESULTS};
use crate::services::AuthError;
use crate::utils::validation::validate_page_token;

fn config_object(config: &Value) -> Result<&Map<String, Value>, AuthError> {
    config.as_object().ok_or_else(|| {
        AuthError::InvalidConfig("Provider configuration must be a non-null object".to_string())
    })
}

fn optional_string(
    fields: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, AuthError> {
    match fields.get(key) {
        None => Ok(None),
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(s.clone())),
        Some(_) => Err(AuthError::InvalidConfig(format!(
            "\"{}\" must be a non-empty string",
            key
        ))),
    }
}

fn optional_url(fields: &Map<String, Value>, key: &str) -> Result<Option<String>, AuthError> {
    let url = optional_string(fields, key)?;
    match url {
        Some(url) if !url.validate_url() => Err(AuthError::InvalidConfig(format!(
            "\"{}\" must be a valid URL",
            key
        ))),
        other => Ok(other),
    }
}

fn required(value: Option<String>, key: &str) -> Result<String, AuthError> {
    value.ok_or_else(|| AuthError::InvalidConfig(format!("\"{}\" must be provided", key)))
}

fn common_fields(fields: &Map<String, Value>, request: &mut Map<String, Value>) -> Result<(), AuthError> {
    if let Some(name) = fields.get("displayName") {
        if !name.is_string() {
            return Err(AuthError::InvalidConfig(
                "\"displayName\" must be a string".to_string(),
            ));
        }
        request.insert("displayName".to_string(), name.clone());
    }
    if let Some(enabled) = fields.get("enabled") {
        if !enabled.is_boolean() {
            return Err(AuthError::InvalidConfig("\"enabled\" must be a boolean".to_string()));
        }
        request.insert("enabled".to_string(), enabled.clone());
    }
    Ok(())
}

/// Client-shaped OIDC config to `oauthIdpConfigs` request.
pub fn oidc_server_request(config: &Value, is_create: bool) -> Result<Value, AuthError> {
    let fields = config_object(config)?;
    let mut request = Map::new();
    common_fields(fields, &mut request)?;

    let client_id = optional_string(fields, "clientId")?;
    let issuer = optional_url(fields, "issuer")?;
    let (client_id, issuer) = if is_create {
        (
            Some(required(client_id, "clientId")?),
            Some(required(issuer, "issuer")?),
        )
    } else {
        (client_id, issuer)
    };

    if let Some(client_id) = client_id {
        request.insert("clientId".to_string(), json!(client_id));
    }
    if let Some(issuer) = issuer {
        request.insert("issuer".to_string(), json!(issuer));
    }
    Ok(Value::Object(request))
}

/// Client-shaped SAML config to `inboundSamlConfigs` request, nesting
/// identity provider and service provider fields.
pub fn saml_server_request(config: &Value, is_create: bool) -> Result<Value, AuthError> {
    let fields = config_object(config)?;
    let mut request = Map::new();
    common_fields(fields, &mut request)?;

    let idp_entity_id = optional_string(fields, "idpEntityId")?;
    let sso_url = optional_url(fields, "ssoURL")?;
    let rp_entity_id = optional_string(fields, "rpEntityId")?;
    let callback_url = optional_url(fields, "callbackURL")?;
    let certificates = match fields.get("x509Certificates") {
        None => None,
        Some(Value::Array(certs)) if certs.iter().all(|c| c.as_str().is_some_and(|s| !s.is_empty())) => {
            Some(certs.clone())
        }
        Some(_) => {
            return Err(AuthError::InvalidConfig(
                "\"x509Certificates\" must be an array of non-empty strings".to_string(),
            ))
        }
    };

    if is_create {
        required(idp_entity_id.clone(), "idpEntityId")?;
        required(sso_url.clone(), "ssoURL")?;
        required(rp_entity_id.clone(), "rpEntityId")?;
        required(callback_url.clone(), "callbackURL")?;
        if certificates.as_ref().map_or(true, Vec::is_empty) {
            return Err(AuthError::InvalidConfig(
                "\"x509Certificates\" must be provided".to_string(),
            ));
        }
    }

    let mut idp = Map::new();
    if let Some(id) = idp_entity_id {
        idp.insert("idpEntityId".to_string(), json!(id));
    }
    if let Some(url) = sso_url {
        idp.insert("ssoUrl".to_string(), json!(url));
    }
    if let Some(certs) = certificates {
        let certs: Vec<Value> = certs
            .into_iter()
            .map(|c| json!({ "x509Certificate": c }))
            .collect();
        idp.insert("idpCertificates".to_string(), Value::Array(certs));
    }
    if !idp.is_empty() {
        request.insert("idpConfig".to_string(), Value::Object(idp));
    }

    let mut sp = Map::new();
    if let Some(id) = rp_entity_id {
        sp.insert("spEntityId".to_string(), json!(id));
    }
    if let Some(url) = callback_url {
        sp.insert("callbackUri".to_string(), json!(url));
    }
    if !sp.is_empty() {
        request.insert("spConfig".to_string(), Value::Object(sp));
    }

    Ok(Value::Object(request))
}

fn non_empty_update(request: Value) -> Result<Value, AuthError> {
    match request.as_object() {
        Some(fields) if !fields.is_empty() => Ok(request),
        _ => Err(AuthError::InvalidConfig(
            "Provider configuration update must change at least one field".to_string(),
        )),
    }
}

/// Classifies provider ids once and routes every operation on the result.
#[derive(Clone)]
pub struct ProviderConfigDispatcher {
    directory: Arc<dyn AccountDirectory>,
}

impl ProviderConfigDispatcher {
    pub fn new(directory: Arc<dyn AccountDirectory>) -> Self {
        Self { directory }
    }

    pub async fn get(&self, provider_id: &str) -> Result<ProviderConfig, AuthError> {
        match ProviderId::parse(provider_id)? {
            ProviderId::Oidc(id) => {
                let response = self.directory.get_oidc_config(&id).await?;
                Ok(ProviderConfig::Oidc(OidcProviderConfig::from_server_response(&response)?))
            }
            ProviderId::Saml(id) => {
                let response = self.directory.get_saml_config(&id).await?;
                Ok(ProviderConfig::Saml(SamlProviderConfig::from_server_response(&response)?))
            }
        }
    }

    /// `config.providerId` names the provider to create.
    pub async fn create(&self, config: &Value) -> Result<ProviderConfig, AuthError> {
        let fields = config_object(config)?;
        let provider_id = fields
            .get("providerId")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let created = match ProviderId::parse(provider_id)? {
            ProviderId::Oidc(id) => {
                let request = oidc_server_request(config, true)?;
                let response = self.directory.create_oidc_config(&id, &request).await?;
                ProviderConfig::Oidc(OidcProviderConfig::from_server_response(&response)?)
            }
            ProviderId::Saml(id) => {
                let request = saml_server_request(config, true)?;
                let response = self.directory.create_saml_config(&id, &request).await?;
                ProviderConfig::Saml(SamlProviderConfig::from_server_response(&response)?)
            }
        };

        info!(provider_id = %created.provider_id(), "Provider configuration created");
        Ok(created)
    }

    pub async fn update(
        &self,
        provider_id: &str,
        config: &Value,
    ) -> Result<ProviderConfig, AuthError> {
        let provider_id = ProviderId::parse(provider_id)?;
        config_object(config)?;

        let updated = match provider_id {
            ProviderId::Oidc(id) => {
                let request = non_empty_update(oidc_server_request(config, false)?)?;
                let response = self.directory.update_oidc_config(&id, &request).await?;
                ProviderConfig::Oidc(OidcProviderConfig::from_server_response(&response)?)
            }
            ProviderId::Saml(id) => {
                let request = non_empty_update(saml_server_request(config, false)?)?;
                let response = self.directory.update_saml_config(&id, &request).await?;
                ProviderConfig::Saml(SamlProviderConfig::from_server_response(&response)?)
            }
        };

        info!(provider_id = %updated.provider_id(), "Provider configuration updated");
        Ok(updated)
    }

    pub async fn delete(&self, provider_id: &str) -> Result<(), AuthError> {
        match ProviderId::parse(provider_id)? {
            ProviderId::Oidc(id) => self.directory.delete_oidc_config(&id).await?,
            ProviderId::Saml(id) => self.directory.delete_saml_config(&id).await?,
        }
        info!(provider_id, "Provider configuration deleted");
        Ok(())
    }

    pub async fn list(
        &self,
        filter: &AuthProviderConfigFilter,
    ) -> Result<ListProviderConfigResult, AuthError> {
        let max_results = filter.max_results.unwrap_or(MAX_LIST_PROVIDER_CONFIGS_RESULTS);
        if max_results == 0 || max_results > MAX_LIST_PROVIDER_CONFIGS_RESULTS {
            return Err(AuthError::invalid_argument(format!(
                "maxResults must be between 1 and {}",
                MAX_LIST_PROVIDER_CONFIGS_RESULTS
            )));
        }
        let page_token = filter.page_token.as_deref();
        validate_page_token(page_token)?;

        let (provider_configs, page_token) = match filter.provider_type {
            ProviderType::Oidc => {
                let page = self.directory.list_oidc_configs(max_results, page_token).await?;
                let configs = page
                    .configs
                    .iter()
                    .map(|c| OidcProviderConfig::from_server_response(c).map(ProviderConfig::Oidc))
                    .collect::<Result<Vec<_>, _>>()?;
                (configs, page.next_page_token)
            }
            ProviderType::Saml => {
                let page = self.directory.list_saml_configs(max_results, page_token).await?;
                let configs = page
                    .configs
                    .iter()
                    .map(|c| SamlProviderConfig::from_server_response(c).map(ProviderConfig::Saml))
                    .collect::<Result<Vec<_>, _>>()?;
                (configs, page.next_page_token)
            }
        };

        Ok(ListProviderConfigResult {
            provider_configs,
            page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::directory::MockDirectory;

    fn oidc_config() -> Value {
        json!({
            "providerId": "oidc.foo",
            "displayName": "Foo",
            "enabled": true,
            "clientId": "client-1",
            "issuer": "https://issuer.example.com",
        })
    }

    fn saml_config() -> Value {
        json!({
            "providerId": "saml.foo",
            "enabled": true,
            "idpEntityId": "idp-entity",
            "ssoURL": "https://idp.example.com/sso",
            "x509Certificates": ["CERT"],
            "rpEntityId": "rp-entity",
            "callbackURL": "https://app.example.com/__/auth/handler",
        })
    }

    #[tokio::test]
    async fn get_dispatches_on_provider_kind() -> Result<(), AuthError> {
        let directory = MockDirectory::new();
        let dispatcher = ProviderConfigDispatcher::new(Arc::new(directory.clone()));
        dispatcher.create(&oidc_config()).await?;
        dispatcher.create(&saml_config()).await?;
        directory.clear_calls();

        let oidc = dispatcher.get("oidc.foo").await?;
        let saml = dispatcher.get("saml.foo").await?;
        assert!(matches!(oidc, ProviderConfig::Oidc(ref c) if c.issuer.as_deref() == Some("https://issuer.example.com")));
        assert!(matches!(saml, ProviderConfig::Saml(ref c) if c.x509_certificates == vec!["CERT".to_string()]));
        assert_eq!(directory.calls(), vec!["get_oidc_config", "get_saml_config"]);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_provider_ids_never_reach_the_directory() {
        let directory = MockDirectory::new();
        let dispatcher = ProviderConfigDispatcher::new(Arc::new(directory.clone()));

        assert!(matches!(dispatcher.get("other").await, Err(AuthError::InvalidProviderId(_))));
        assert!(matches!(dispatcher.delete("google.com").await, Err(AuthError::InvalidProviderId(_))));
        assert!(matches!(
            dispatcher.update("other", &json!({ "enabled": true })).await,
            Err(AuthError::InvalidProviderId(_))
        ));
        assert!(matches!(
            dispatcher.create(&json!({ "providerId": "other" })).await,
            Err(AuthError::InvalidProviderId(_))
        ));
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn null_configs_are_invalid() {
        let directory = MockDirectory::new();
        let dispatcher = ProviderConfigDispatcher::new(Arc::new(directory.clone()));

        assert!(matches!(dispatcher.create(&Value::Null).await, Err(AuthError::InvalidConfig(_))));
        assert!(matches!(
            dispatcher.update("saml.foo", &Value::Null).await,
            Err(AuthError::InvalidConfig(_))
        ));
        assert!(matches!(
            dispatcher.update("oidc.foo", &json!({})).await,
            Err(AuthError::InvalidConfig(_))
        ));
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn update_patches_existing_config() -> Result<(), AuthError> {
        let dispatcher = ProviderConfigDispatcher::new(Arc::new(MockDirectory::new()));
        dispatcher.create(&saml_config()).await?;

        let updated = dispatcher
            .update("saml.foo", &json!({ "enabled": false, "ssoURL": "https://idp.example.com/v2" }))
            .await?;
        match updated {
            ProviderConfig::Saml(config) => {
                assert!(!config.enabled);
                assert_eq!(config.sso_url.as_deref(), Some("https://idp.example.com/v2"));
                assert_eq!(config.rp_entity_id.as_deref(), Some("rp-entity"));
            }
            other => panic!("expected SAML config, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn saml_request_nests_idp_and_sp_fields() -> Result<(), AuthError> {
        let request = saml_server_request(&saml_config(), true)?;
        assert_eq!(request["idpConfig"]["ssoUrl"], "https://idp.example.com/sso");
        assert_eq!(request["idpConfig"]["idpCertificates"][0]["x509Certificate"], "CERT");
        assert_eq!(request["spConfig"]["spEntityId"], "rp-entity");
        assert!(request.get("providerId").is_none());

        assert!(matches!(
            oidc_server_request(&json!({ "providerId": "oidc.x", "clientId": "c" }), true),
            Err(AuthError::InvalidConfig(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn list_requires_bounded_page_size() -> Result<(), AuthError> {
        let dispatcher = ProviderConfigDispatcher::new(Arc::new(MockDirectory::new()));
        let mut filter = AuthProviderConfigFilter::new(ProviderType::Oidc);
        filter.max_results = Some(101);
        assert!(matches!(dispatcher.list(&filter).await, Err(AuthError::InvalidArgument(_))));

        filter.max_results = None;
        filter.page_token = Some(String::new());
        assert!(matches!(dispatcher.list(&filter).await, Err(AuthError::InvalidPageToken(_))));

        dispatcher.create(&oidc_config()).await?;
        let page = dispatcher.list(&AuthProviderConfigFilter::new(ProviderType::Oidc)).await?;
        assert_eq!(page.provider_configs.len(), 1);
        assert_eq!(page.page_token, None);
        Ok(())
    }
}
