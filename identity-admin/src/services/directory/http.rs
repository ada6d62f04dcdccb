//! Identity Toolkit REST client.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

use super::{
    AccountDirectory, AccountPage, BatchErrorResponse, ProviderConfigPage, TenantPage,
};
use crate::config::DirectoryConfig;
use crate::dtos::{
    ActionCodeSettings, CreateRequest, EmailActionType, TenantServerRequest, UpdateRequest,
    UserImportOptions, UserImportRecord,
};
use crate::models::{AccountRecord, TenantResponse, UserIdentifier};
use crate::services::AuthError;

pub const DEFAULT_DIRECTORY_URL: &str = "https://identitytoolkit.googleapis.com";
const EMULATOR_ACCESS_TOKEN: &str = "owner";

/// `{"error": {"code": 400, "message": "USER_NOT_FOUND : detail"}}`
#[derive(Debug, Deserialize)]
struct BackendError {
    error: BackendErrorDetail,
}

#[derive(Debug, Deserialize)]
struct BackendErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalIdResponse {
    local_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionCookieResponse {
    session_cookie: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OobLinkResponse {
    oob_link: String,
}

/// Translate a backend error message into an error kind.
///
/// Codes without a dedicated kind are carried verbatim as `Directory`.
pub fn map_backend_error(message: &str) -> AuthError {
    let (code, detail) = match message.split_once(':') {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };
    let detail = if detail.is_empty() {
        code.to_string()
    } else {
        detail.to_string()
    };

    match code {
        "USER_NOT_FOUND" => AuthError::UserNotFound(detail),
        "TENANT_NOT_FOUND" => AuthError::TenantNotFound(detail),
        "CONFIGURATION_NOT_FOUND" => AuthError::ConfigurationNotFound(detail),
        "INVALID_ID_TOKEN" => AuthError::InvalidIdToken(detail),
        "INVALID_PAGE_SELECTION" => AuthError::InvalidPageToken(detail),
        _ => AuthError::Directory {
            code: code.to_string(),
            message: detail,
        },
    }
}

/// Dotted field paths of `body`, used as a PATCH `updateMask`. Keys in
/// `leaves` are masked whole rather than descended into.
fn update_mask(body: &Value, leaves: &[&str]) -> Vec<String> {
    fn walk(value: &Value, prefix: &str, leaves: &[&str], out: &mut Vec<String>) {
        if let Value::Object(fields) = value {
            for (key, child) in fields {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                match child {
                    Value::Object(inner) if !inner.is_empty() && !leaves.contains(&key.as_str()) => {
                        walk(child, &path, leaves, out)
                    }
                    _ => out.push(path),
                }
            }
        }
    }

    let mut mask = Vec::new();
    walk(body, "", leaves, &mut mask);
    mask.sort();
    mask
}

/// `reqwest` implementation of the directory.
#[derive(Clone)]
pub struct HttpAccountDirectory {
    client: Client,
    base_url: String,
    project_id: String,
    tenant_id: Option<String>,
    access_token: Secret<String>,
}

impl HttpAccountDirectory {
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        access_token: Secret<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            tenant_id: None,
            access_token,
        }
    }

    /// Build from configuration. An emulator host takes precedence over the
    /// configured URL and uses the emulator's fixed bearer token.
    pub fn from_config(config: &DirectoryConfig, project_id: &str) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        let (base_url, access_token) = match &config.emulator_host {
            Some(host) => (
                format!("http://{}/identitytoolkit.googleapis.com", host),
                Secret::new(EMULATOR_ACCESS_TOKEN.to_string()),
            ),
            None => (config.base_url.clone(), config.access_token.clone()),
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            tenant_id: None,
            access_token,
        })
    }

    fn scope(&self) -> String {
        match &self.tenant_id {
            Some(tenant) => format!("projects/{}/tenants/{}", self.project_id, tenant),
            None => format!("projects/{}", self.project_id),
        }
    }

    fn v1(&self, path: &str) -> String {
        format!("{}/v1/{}{}", self.base_url, self.scope(), path)
    }

    fn v2(&self, path: &str) -> String {
        format!("{}/v2/{}{}", self.base_url, self.scope(), path)
    }

    fn tenants(&self, path: &str) -> String {
        format!(
            "{}/v2/projects/{}/tenants{}",
            self.base_url, self.project_id, path
        )
    }

    async fn send<B, R>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<R, AuthError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(self.access_token.expose_secret());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        debug!(method = %method, url = %url, status = %status, "Directory response");

        if status.is_success() {
            let text = if text.trim().is_empty() { "{}" } else { &text };
            return serde_json::from_str(text).map_err(|e| {
                error!(url = %url, error = %e, "Directory returned an unreadable body");
                AuthError::internal(format!("Failed to parse directory response: {}", e))
            });
        }

        let message = serde_json::from_str::<BackendError>(&text)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("UNKNOWN_ERROR : HTTP {}", status));
        Err(map_backend_error(&message))
    }

    async fn lookup_one(&self, body: Value, what: &str) -> Result<AccountRecord, AuthError> {
        let response: LookupResponse = self
            .send(Method::POST, &self.v1("/accounts:lookup"), &[], Some(&body))
            .await?;
        response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::UserNotFound(format!("No user record found for {}", what)))
    }

    async fn list_provider_configs(
        &self,
        collection: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ProviderConfigPage, AuthError> {
        let mut query = vec![("pageSize", max_results.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        let response: Value = self
            .send::<Value, _>(Method::GET, &self.v2(&format!("/{}", collection)), &query, None)
            .await?;

        Ok(ProviderConfigPage {
            configs: response
                .get(collection)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            next_page_token: response
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        })
    }

    async fn create_provider_config(
        &self,
        collection: &str,
        id_param: &str,
        provider_id: &str,
        config: &Value,
    ) -> Result<Value, AuthError> {
        let query = [(id_param, provider_id.to_string())];
        self.send(
            Method::POST,
            &self.v2(&format!("/{}", collection)),
            &query,
            Some(config),
        )
        .await
    }

    async fn update_provider_config(
        &self,
        collection: &str,
        provider_id: &str,
        config: &Value,
    ) -> Result<Value, AuthError> {
        let mask = update_mask(config, &[]).join(",");
        let query = [("updateMask", mask)];
        self.send(
            Method::PATCH,
            &self.v2(&format!("/{}/{}", collection, provider_id)),
            &query,
            Some(config),
        )
        .await
    }
}

#[async_trait]
impl AccountDirectory for HttpAccountDirectory {
    #[instrument(skip(self))]
    async fn get_account_by_uid(&self, uid: &str) -> Result<AccountRecord, AuthError> {
        self.lookup_one(json!({ "localId": [uid] }), &format!("uid {}", uid))
            .await
    }

    #[instrument(skip(self, email))]
    async fn get_account_by_email(&self, email: &str) -> Result<AccountRecord, AuthError> {
        self.lookup_one(json!({ "email": [email] }), "the given email")
            .await
    }

    #[instrument(skip(self, phone_number))]
    async fn get_account_by_phone(&self, phone_number: &str) -> Result<AccountRecord, AuthError> {
        self.lookup_one(json!({ "phoneNumber": [phone_number] }), "the given phone number")
            .await
    }

    #[instrument(skip(self))]
    async fn get_account_by_provider_uid(
        &self,
        provider_id: &str,
        provider_uid: &str,
    ) -> Result<AccountRecord, AuthError> {
        let body = json!({
            "federatedUserId": [{ "providerId": provider_id, "rawId": provider_uid }]
        });
        self.lookup_one(body, &format!("{} uid {}", provider_id, provider_uid))
            .await
    }

    #[instrument(skip(self, identifiers), fields(count = identifiers.len()))]
    async fn get_accounts_by_identifiers(
        &self,
        identifiers: &[UserIdentifier],
    ) -> Result<Vec<AccountRecord>, AuthError> {
        let mut local_ids = Vec::new();
        let mut emails = Vec::new();
        let mut phone_numbers = Vec::new();
        let mut federated = Vec::new();

        for identifier in identifiers {
            match identifier {
                UserIdentifier::Uid(uid) => local_ids.push(json!(uid)),
                UserIdentifier::Email(email) => emails.push(json!(email)),
                UserIdentifier::Phone(phone) => phone_numbers.push(json!(phone)),
                UserIdentifier::ProviderLink {
                    provider_id,
                    provider_uid,
                } => federated.push(json!({ "providerId": provider_id, "rawId": provider_uid })),
            }
        }

        let mut body = Map::new();
        for (key, values) in [
            ("localId", local_ids),
            ("email", emails),
            ("phoneNumber", phone_numbers),
            ("federatedUserId", federated),
        ] {
            if !values.is_empty() {
                body.insert(key.to_string(), Value::Array(values));
            }
        }

        let response: LookupResponse = self
            .send(Method::POST, &self.v1("/accounts:lookup"), &[], Some(&body))
            .await?;
        Ok(response.users)
    }

    #[instrument(skip(self, page_token))]
    async fn list_accounts(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<AccountPage, AuthError> {
        let mut query = vec![("maxResults", max_results.to_string())];
        if let Some(token) = page_token {
            query.push(("nextPageToken", token.to_string()));
        }
        let mut page: AccountPage = self
            .send::<Value, _>(Method::GET, &self.v1("/accounts:batchGet"), &query, None)
            .await?;
        page.next_page_token = page.next_page_token.filter(|t| !t.is_empty());
        Ok(page)
    }

    #[instrument(skip(self, properties))]
    async fn create_account(&self, properties: &CreateRequest) -> Result<String, AuthError> {
        let response: LocalIdResponse = self
            .send(Method::POST, &self.v1("/accounts"), &[], Some(properties))
            .await?;
        Ok(response.local_id)
    }

    #[instrument(skip(self, properties))]
    async fn update_account(
        &self,
        uid: &str,
        properties: &UpdateRequest,
    ) -> Result<String, AuthError> {
        let mut body = serde_json::to_value(properties)?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("localId".to_string(), json!(uid));
        }
        let response: LocalIdResponse = self
            .send(Method::POST, &self.v1("/accounts:update"), &[], Some(&body))
            .await?;
        Ok(response.local_id)
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, uid: &str) -> Result<(), AuthError> {
        let _: Value = self
            .send(
                Method::POST,
                &self.v1("/accounts:delete"),
                &[],
                Some(&json!({ "localId": uid })),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, uids), fields(count = uids.len()))]
    async fn delete_accounts(
        &self,
        uids: &[String],
        force: bool,
    ) -> Result<BatchErrorResponse, AuthError> {
        self.send(
            Method::POST,
            &self.v1("/accounts:batchDelete"),
            &[],
            Some(&json!({ "localIds": uids, "force": force })),
        )
        .await
    }

    #[instrument(skip(self, claims))]
    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: Option<&Map<String, Value>>,
    ) -> Result<(), AuthError> {
        let attributes = match claims {
            Some(claims) => Value::Object(claims.clone()).to_string(),
            None => "{}".to_string(),
        };
        let _: LocalIdResponse = self
            .send(
                Method::POST,
                &self.v1("/accounts:update"),
                &[],
                Some(&json!({ "localId": uid, "customAttributes": attributes })),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), AuthError> {
        let valid_since = Utc::now().timestamp();
        let _: LocalIdResponse = self
            .send(
                Method::POST,
                &self.v1("/accounts:update"),
                &[],
                Some(&json!({ "localId": uid, "validSince": valid_since.to_string() })),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, records, options), fields(count = records.len()))]
    async fn import_accounts(
        &self,
        records: &[UserImportRecord],
        options: Option<&UserImportOptions>,
    ) -> Result<BatchErrorResponse, AuthError> {
        let mut body = match options {
            Some(options) => serde_json::to_value(options)?,
            None => json!({}),
        };
        if let Some(fields) = body.as_object_mut() {
            fields.insert("users".to_string(), serde_json::to_value(records)?);
        }
        self.send(Method::POST, &self.v1("/accounts:batchCreate"), &[], Some(&body))
            .await
    }

    #[instrument(skip(self, id_token))]
    async fn create_session_cookie(
        &self,
        id_token: &str,
        expires_in_seconds: i64,
    ) -> Result<String, AuthError> {
        let url = format!("{}/v1/{}:createSessionCookie", self.base_url, self.scope());
        let response: SessionCookieResponse = self
            .send(
                Method::POST,
                &url,
                &[],
                Some(&json!({ "idToken": id_token, "validDuration": expires_in_seconds })),
            )
            .await?;
        Ok(response.session_cookie)
    }

    #[instrument(skip(self, email, settings))]
    async fn get_email_action_link(
        &self,
        action: EmailActionType,
        email: &str,
        settings: Option<&ActionCodeSettings>,
    ) -> Result<String, AuthError> {
        let mut body = json!({
            "requestType": action.as_str(),
            "email": email,
            "returnOobLink": true,
        });
        if let (Some(settings), Some(fields)) = (settings, body.as_object_mut()) {
            fields.insert("continueUrl".to_string(), json!(settings.url));
            if let Some(in_app) = settings.handle_code_in_app {
                fields.insert("canHandleCodeInApp".to_string(), json!(in_app));
            }
            if let Some(domain) = &settings.dynamic_link_domain {
                fields.insert("dynamicLinkDomain".to_string(), json!(domain));
            }
        }
        let response: OobLinkResponse = self
            .send(Method::POST, &self.v1("/accounts:sendOobCode"), &[], Some(&body))
            .await?;
        Ok(response.oob_link)
    }

    #[instrument(skip(self, page_token))]
    async fn list_oidc_configs(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ProviderConfigPage, AuthError> {
        self.list_provider_configs("oauthIdpConfigs", max_results, page_token)
            .await
    }

    #[instrument(skip(self))]
    async fn get_oidc_config(&self, provider_id: &str) -> Result<Value, AuthError> {
        self.send::<Value, _>(
            Method::GET,
            &self.v2(&format!("/oauthIdpConfigs/{}", provider_id)),
            &[],
            None,
        )
        .await
    }

    #[instrument(skip(self, config))]
    async fn create_oidc_config(
        &self,
        provider_id: &str,
        config: &Value,
    ) -> Result<Value, AuthError> {
        self.create_provider_config("oauthIdpConfigs", "oauthIdpConfigId", provider_id, config)
            .await
    }

    #[instrument(skip(self, config))]
    async fn update_oidc_config(
        &self,
        provider_id: &str,
        config: &Value,
    ) -> Result<Value, AuthError> {
        self.update_provider_config("oauthIdpConfigs", provider_id, config)
            .await
    }

    #[instrument(skip(self))]
    async fn delete_oidc_config(&self, provider_id: &str) -> Result<(), AuthError> {
        let _: Value = self
            .send::<Value, _>(
                Method::DELETE,
                &self.v2(&format!("/oauthIdpConfigs/{}", provider_id)),
                &[],
                None,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, page_token))]
    async fn list_saml_configs(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ProviderConfigPage, AuthError> {
        self.list_provider_configs("inboundSamlConfigs", max_results, page_token)
            .await
    }

    #[instrument(skip(self))]
    async fn get_saml_config(&self, provider_id: &str) -> Result<Value, AuthError> {
        self.send::<Value, _>(
            Method::GET,
            &self.v2(&format!("/inboundSamlConfigs/{}", provider_id)),
            &[],
            None,
        )
        .await
    }

    #[instrument(skip(self, config))]
    async fn create_saml_config(
        &self,
        provider_id: &str,
        config: &Value,
    ) -> Result<Value, AuthError> {
        self.create_provider_config(
            "inboundSamlConfigs",
            "inboundSamlConfigId",
            provider_id,
            config,
        )
        .await
    }

    #[instrument(skip(self, config))]
    async fn update_saml_config(
        &self,
        provider_id: &str,
        config: &Value,
    ) -> Result<Value, AuthError> {
        self.update_provider_config("inboundSamlConfigs", provider_id, config)
            .await
    }

    #[instrument(skip(self))]
    async fn delete_saml_config(&self, provider_id: &str) -> Result<(), AuthError> {
        let _: Value = self
            .send::<Value, _>(
                Method::DELETE,
                &self.v2(&format!("/inboundSamlConfigs/{}", provider_id)),
                &[],
                None,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_tenant(&self, tenant_id: &str) -> Result<TenantResponse, AuthError> {
        self.send::<Value, _>(Method::GET, &self.tenants(&format!("/{}", tenant_id)), &[], None)
            .await
    }

    #[instrument(skip(self, page_token))]
    async fn list_tenants(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<TenantPage, AuthError> {
        let mut query = vec![("pageSize", max_results.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        let mut page: TenantPage = self
            .send::<Value, _>(Method::GET, &self.tenants(""), &query, None)
            .await?;
        page.next_page_token = page.next_page_token.filter(|t| !t.is_empty());
        Ok(page)
    }

    #[instrument(skip(self, request))]
    async fn create_tenant(
        &self,
        request: &TenantServerRequest,
    ) -> Result<TenantResponse, AuthError> {
        self.send(Method::POST, &self.tenants(""), &[], Some(request))
            .await
    }

    #[instrument(skip(self, request))]
    async fn update_tenant(
        &self,
        tenant_id: &str,
        request: &TenantServerRequest,
    ) -> Result<TenantResponse, AuthError> {
        let body = serde_json::to_value(request)?;
        let query = [("updateMask", update_mask(&body, &["testPhoneNumbers"]).join(","))];
        self.send(
            Method::PATCH,
            &self.tenants(&format!("/{}", tenant_id)),
            &query,
            Some(&body),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn delete_tenant(&self, tenant_id: &str) -> Result<(), AuthError> {
        let _: Value = self
            .send::<Value, _>(
                Method::DELETE,
                &self.tenants(&format!("/{}", tenant_id)),
                &[],
                None,
            )
            .await?;
        Ok(())
    }

    fn for_tenant(&self, tenant_id: &str) -> Arc<dyn AccountDirectory> {
        Arc::new(Self {
            tenant_id: Some(tenant_id.to_string()),
            ..self.clone()
        })
    }
}
