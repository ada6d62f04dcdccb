//! Account Directory collaborator: the identity backend's RPC surface.
//!
//! Every method is a single round trip. Nothing is cached or retried here.

mod http;
mod mock;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::dtos::{
    ActionCodeSettings, CreateRequest, EmailActionType, TenantServerRequest, UpdateRequest,
    UserImportOptions, UserImportRecord,
};
use crate::models::{AccountRecord, TenantResponse, UserIdentifier};
use crate::services::AuthError;

pub use http::{map_backend_error, HttpAccountDirectory, DEFAULT_DIRECTORY_URL};
pub use mock::MockDirectory;

/// Default and maximum page size for account listing.
pub const MAX_LIST_ACCOUNTS_RESULTS: u32 = 1000;
pub const MAX_LIST_PROVIDER_CONFIGS_RESULTS: u32 = 100;
pub const MAX_LIST_TENANTS_RESULTS: u32 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPage {
    #[serde(default, rename = "users")]
    pub accounts: Vec<AccountRecord>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Per-item failure reported by a batch RPC.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchErrorInfo {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub local_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl BatchErrorInfo {
    pub fn at(index: usize, message: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            local_id: None,
            message: Some(message.into()),
        }
    }
}

/// Response of `batchDelete` and `batchCreate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchErrorResponse {
    #[serde(default, alias = "error")]
    pub errors: Vec<BatchErrorInfo>,
}

/// Raw OIDC or SAML resources, in the directory's wire shape.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfigPage {
    pub configs: Vec<Value>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantPage {
    #[serde(default)]
    pub tenants: Vec<TenantResponse>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn get_account_by_uid(&self, uid: &str) -> Result<AccountRecord, AuthError>;
    async fn get_account_by_email(&self, email: &str) -> Result<AccountRecord, AuthError>;
    async fn get_account_by_phone(&self, phone_number: &str) -> Result<AccountRecord, AuthError>;
    async fn get_account_by_provider_uid(
        &self,
        provider_id: &str,
        provider_uid: &str,
    ) -> Result<AccountRecord, AuthError>;

    /// Accounts matching any of `identifiers`, in no particular order.
    async fn get_accounts_by_identifiers(
        &self,
        identifiers: &[UserIdentifier],
    ) -> Result<Vec<AccountRecord>, AuthError>;

    async fn list_accounts(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<AccountPage, AuthError>;

    /// Returns the uid of the new account.
    async fn create_account(&self, properties: &CreateRequest) -> Result<String, AuthError>;
    async fn update_account(
        &self,
        uid: &str,
        properties: &UpdateRequest,
    ) -> Result<String, AuthError>;
    async fn delete_account(&self, uid: &str) -> Result<(), AuthError>;
    async fn delete_accounts(
        &self,
        uids: &[String],
        force: bool,
    ) -> Result<BatchErrorResponse, AuthError>;

    /// `None` clears every custom claim.
    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: Option<&Map<String, Value>>,
    ) -> Result<(), AuthError>;
    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), AuthError>;
    async fn import_accounts(
        &self,
        records: &[UserImportRecord],
        options: Option<&UserImportOptions>,
    ) -> Result<BatchErrorResponse, AuthError>;

    async fn create_session_cookie(
        &self,
        id_token: &str,
        expires_in_seconds: i64,
    ) -> Result<String, AuthError>;
    async fn get_email_action_link(
        &self,
        action: EmailActionType,
        email: &str,
        settings: Option<&ActionCodeSettings>,
    ) -> Result<String, AuthError>;

    async fn list_oidc_configs(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ProviderConfigPage, AuthError>;
    async fn get_oidc_config(&self, provider_id: &str) -> Result<Value, AuthError>;
    async fn create_oidc_config(&self, provider_id: &str, config: &Value)
        -> Result<Value, AuthError>;
    async fn update_oidc_config(&self, provider_id: &str, config: &Value)
        -> Result<Value, AuthError>;
    async fn delete_oidc_config(&self, provider_id: &str) -> Result<(), AuthError>;

    async fn list_saml_configs(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ProviderConfigPage, AuthError>;
    async fn get_saml_config(&self, provider_id: &str) -> Result<Value, AuthError>;
    async fn create_saml_config(&self, provider_id: &str, config: &Value)
        -> Result<Value, AuthError>;
    async fn update_saml_config(&self, provider_id: &str, config: &Value)
        -> Result<Value, AuthError>;
    async fn delete_saml_config(&self, provider_id: &str) -> Result<(), AuthError>;

    async fn get_tenant(&self, tenant_id: &str) -> Result<TenantResponse, AuthError>;
    async fn list_tenants(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<TenantPage, AuthError>;
    async fn create_tenant(&self, request: &TenantServerRequest)
        -> Result<TenantResponse, AuthError>;
    async fn update_tenant(
        &self,
        tenant_id: &str,
        request: &TenantServerRequest,
    ) -> Result<TenantResponse, AuthError>;
    async fn delete_tenant(&self, tenant_id: &str) -> Result<(), AuthError>;

    /// The same directory with every account and provider RPC scoped to
    /// `tenant_id`. Tenant management RPCs stay project-wide.
    fn for_tenant(&self, tenant_id: &str) -> Arc<dyn AccountDirectory>;
}
