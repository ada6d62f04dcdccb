use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    AccountDirectory, AccountPage, BatchErrorInfo, BatchErrorResponse, ProviderConfigPage,
    TenantPage,
};
use crate::dtos::{
    ActionCodeSettings, CreateRequest, EmailActionType, TenantServerRequest, UpdateRequest,
    UserImportOptions, UserImportRecord,
};
use crate::models::{AccountRecord, TenantResponse, UserIdentifier};
use crate::services::batch_lookup::identifier_matches;
use crate::services::AuthError;

const MOCK_PROJECT_ID: &str = "mock-project";

type ProviderKey = (Option<String>, String);

#[derive(Default)]
struct MockState {
    accounts: Vec<AccountRecord>,
    calls: Vec<String>,
    delete_errors: Vec<BatchErrorInfo>,
    import_errors: Vec<BatchErrorInfo>,
    lose_created_accounts: bool,
    oidc_configs: BTreeMap<ProviderKey, Value>,
    saml_configs: BTreeMap<ProviderKey, Value>,
    tenants: BTreeMap<String, TenantResponse>,
    next_id: u64,
}

/// In-memory directory for tests and local development.
///
/// Clones and tenant-scoped views share one state, so every RPC issued
/// through any of them shows up in `calls()`.
#[derive(Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<MockState>>,
    tenant_id: Option<String>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: &str) -> MutexGuard<'_, MockState> {
        let mut state = self.state();
        state.calls.push(call.to_string());
        state
    }

    fn visible(&self, account: &AccountRecord) -> bool {
        account.tenant_id == self.tenant_id
    }

    /// View of `tenant_id` sharing this directory's accounts and call log.
    pub fn scoped(&self, tenant_id: &str) -> MockDirectory {
        MockDirectory {
            state: Arc::clone(&self.state),
            tenant_id: Some(tenant_id.to_string()),
        }
    }

    /// Store an account in this directory's tenant.
    pub fn insert_account(&self, mut account: AccountRecord) {
        account.tenant_id = self.tenant_id.clone();
        let mut state = self.state();
        state
            .accounts
            .retain(|a| !(a.local_id == account.local_id && a.tenant_id == account.tenant_id));
        state.accounts.push(account);
    }

    pub fn account(&self, uid: &str) -> Option<AccountRecord> {
        self.state()
            .accounts
            .iter()
            .find(|a| a.local_id == uid && self.visible(a))
            .cloned()
    }

    pub fn insert_tenant(&self, tenant: TenantResponse) {
        if let Some((_, id)) = tenant.name.rsplit_once("/tenants/") {
            let id = id.to_string();
            self.state().tenants.insert(id, tenant);
        }
    }

    /// Make the next batch deletes report these per-index errors.
    pub fn fail_deletes_with(&self, errors: Vec<BatchErrorInfo>) {
        self.state().delete_errors = errors;
    }

    pub fn fail_imports_with(&self, errors: Vec<BatchErrorInfo>) {
        self.state().import_errors = errors;
    }

    /// Acknowledge creates without storing the account.
    pub fn lose_created_accounts(&self) {
        self.state().lose_created_accounts = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn find_account<F>(&self, state: &MockState, what: &str, predicate: F) -> Result<AccountRecord, AuthError>
    where
        F: Fn(&AccountRecord) -> bool,
    {
        state
            .accounts
            .iter()
            .find(|a| self.visible(a) && predicate(a))
            .cloned()
            .ok_or_else(|| AuthError::UserNotFound(format!("No user record found for {}", what)))
    }

    fn account_mut<'a>(
        &self,
        state: &'a mut MockState,
        uid: &str,
    ) -> Result<&'a mut AccountRecord, AuthError> {
        let tenant_id = self.tenant_id.clone();
        state
            .accounts
            .iter_mut()
            .find(|a| a.local_id == uid && a.tenant_id == tenant_id)
            .ok_or_else(|| AuthError::UserNotFound(format!("No user record found for uid {}", uid)))
    }

    fn provider_resource(&self, collection: &str, provider_id: &str) -> String {
        match &self.tenant_id {
            Some(tenant) => format!(
                "projects/{}/tenants/{}/{}/{}",
                MOCK_PROJECT_ID, tenant, collection, provider_id
            ),
            None => format!("projects/{}/{}/{}", MOCK_PROJECT_ID, collection, provider_id),
        }
    }

    fn list_configs(
        &self,
        configs: &BTreeMap<ProviderKey, Value>,
        max_results: u32,
        page_token: Option<&str>,
    ) -> ProviderConfigPage {
        let scoped = configs
            .iter()
            .filter(|((tenant, _), _)| *tenant == self.tenant_id)
            .map(|((_, id), config)| (id.clone(), config.clone()))
            .collect();
        let (configs, next_page_token) = paginate(scoped, max_results, page_token);
        ProviderConfigPage {
            configs,
            next_page_token,
        }
    }
}

fn paginate<T>(
    items: Vec<(String, T)>,
    max_results: u32,
    page_token: Option<&str>,
) -> (Vec<T>, Option<String>) {
    let mut remaining = items
        .into_iter()
        .filter(|(key, _)| page_token.map_or(true, |token| key.as_str() > token))
        .collect::<Vec<_>>();
    remaining.sort_by(|a, b| a.0.cmp(&b.0));

    let has_more = remaining.len() > max_results as usize;
    remaining.truncate(max_results as usize);
    let next = if has_more {
        remaining.last().map(|(key, _)| key.clone())
    } else {
        None
    };
    (remaining.into_iter().map(|(_, item)| item).collect(), next)
}

fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn apply_tenant_request(tenant: &mut TenantResponse, request: &TenantServerRequest) {
    if let Some(name) = &request.display_name {
        tenant.display_name = Some(name.clone());
    }
    if let Some(allow) = request.allow_password_signup {
        tenant.allow_password_signup = Some(allow);
    }
    if let Some(link) = request.enable_email_link_signin {
        tenant.enable_email_link_signin = Some(link);
    }
    if let Some(mfa) = &request.mfa_config {
        let stored = tenant.mfa_config.get_or_insert_with(Default::default);
        if let Some(state) = &mfa.state {
            stored.state = Some(state.clone());
        }
        if let Some(providers) = &mfa.enabled_providers {
            stored.enabled_providers = Some(providers.clone());
        }
    }
    if let Some(numbers) = &request.test_phone_numbers {
        tenant.test_phone_numbers = if numbers.is_empty() {
            None
        } else {
            Some(numbers.clone())
        };
    }
}

#[async_trait]
impl AccountDirectory for MockDirectory {
    async fn get_account_by_uid(&self, uid: &str) -> Result<AccountRecord, AuthError> {
        let state = self.record("get_account_by_uid");
        self.find_account(&state, &format!("uid {}", uid), |a| a.local_id == uid)
    }

    async fn get_account_by_email(&self, email: &str) -> Result<AccountRecord, AuthError> {
        let state = self.record("get_account_by_email");
        self.find_account(&state, &format!("email {}", email), |a| {
            a.email.as_deref() == Some(email)
        })
    }

    async fn get_account_by_phone(&self, phone_number: &str) -> Result<AccountRecord, AuthError> {
        let state = self.record("get_account_by_phone");
        self.find_account(&state, &format!("phone number {}", phone_number), |a| {
            a.phone_number.as_deref() == Some(phone_number)
        })
    }

    async fn get_account_by_provider_uid(
        &self,
        provider_id: &str,
        provider_uid: &str,
    ) -> Result<AccountRecord, AuthError> {
        let state = self.record("get_account_by_provider_uid");
        self.find_account(
            &state,
            &format!("{} uid {}", provider_id, provider_uid),
            |a| a.has_provider(provider_id, provider_uid),
        )
    }

    async fn get_accounts_by_identifiers(
        &self,
        identifiers: &[UserIdentifier],
    ) -> Result<Vec<AccountRecord>, AuthError> {
        let state = self.record("get_accounts_by_identifiers");
        Ok(state
            .accounts
            .iter()
            .filter(|a| self.visible(a))
            .filter(|a| identifiers.iter().any(|id| identifier_matches(id, a)))
            .cloned()
            .collect())
    }

    async fn list_accounts(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<AccountPage, AuthError> {
        let state = self.record("list_accounts");
        let scoped = state
            .accounts
            .iter()
            .filter(|a| self.visible(a))
            .map(|a| (a.local_id.clone(), a.clone()))
            .collect();
        let (accounts, next_page_token) = paginate(scoped, max_results, page_token);
        Ok(AccountPage {
            accounts,
            next_page_token,
        })
    }

    async fn create_account(&self, properties: &CreateRequest) -> Result<String, AuthError> {
        let mut state = self.record("create_account");
        let uid = match &properties.uid {
            Some(uid) => uid.clone(),
            None => {
                state.next_id += 1;
                format!("mock-uid-{}", state.next_id)
            }
        };

        if state
            .accounts
            .iter()
            .any(|a| a.local_id == uid && self.visible(a))
        {
            return Err(AuthError::Directory {
                code: "DUPLICATE_LOCAL_ID".to_string(),
                message: format!("uid {} already exists", uid),
            });
        }

        if state.lose_created_accounts {
            return Ok(uid);
        }

        state.accounts.push(AccountRecord {
            local_id: uid.clone(),
            email: properties.email.clone(),
            email_verified: properties.email_verified.unwrap_or(false),
            display_name: properties.display_name.clone(),
            photo_url: properties.photo_url.clone(),
            phone_number: properties.phone_number.clone(),
            disabled: properties.disabled.unwrap_or(false),
            tenant_id: self.tenant_id.clone(),
            created_at: Some(Utc::now().timestamp_millis().to_string()),
            ..Default::default()
        });
        Ok(uid)
    }

    async fn update_account(
        &self,
        uid: &str,
        properties: &UpdateRequest,
    ) -> Result<String, AuthError> {
        let mut state = self.record("update_account");
        let account = self.account_mut(&mut state, uid)?;

        if let Some(email) = &properties.email {
            account.email = Some(email.clone());
        }
        if let Some(verified) = properties.email_verified {
            account.email_verified = verified;
        }
        if let Some(phone_number) = &properties.phone_number {
            account.phone_number = Some(phone_number.clone());
        }
        if let Some(name) = &properties.display_name {
            account.display_name = Some(name.clone());
        }
        if let Some(url) = &properties.photo_url {
            account.photo_url = Some(url.clone());
        }
        if let Some(disabled) = properties.disabled {
            account.disabled = disabled;
        }
        Ok(uid.to_string())
    }

    async fn delete_account(&self, uid: &str) -> Result<(), AuthError> {
        let mut state = self.record("delete_account");
        self.account_mut(&mut state, uid)?;
        let tenant_id = self.tenant_id.clone();
        state
            .accounts
            .retain(|a| !(a.local_id == uid && a.tenant_id == tenant_id));
        Ok(())
    }

    async fn delete_accounts(
        &self,
        uids: &[String],
        force: bool,
    ) -> Result<BatchErrorResponse, AuthError> {
        let mut state = self.record("delete_accounts");
        let mut errors = state.delete_errors.clone();

        if errors.is_empty() && !force {
            errors = uids
                .iter()
                .enumerate()
                .filter(|(_, uid)| {
                    state
                        .accounts
                        .iter()
                        .any(|a| a.local_id == **uid && self.visible(a) && !a.disabled)
                })
                .map(|(index, uid)| BatchErrorInfo {
                    index: Some(index),
                    local_id: Some(uid.clone()),
                    message: Some("NOT_DISABLED : Disable the account before batch deletion.".to_string()),
                })
                .collect();
        }

        let failed = errors
            .iter()
            .filter_map(|e| e.index)
            .filter_map(|i| uids.get(i))
            .cloned()
            .collect::<Vec<_>>();
        let tenant_id = self.tenant_id.clone();
        state.accounts.retain(|a| {
            a.tenant_id != tenant_id || !uids.contains(&a.local_id) || failed.contains(&a.local_id)
        });

        Ok(BatchErrorResponse { errors })
    }

    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: Option<&Map<String, Value>>,
    ) -> Result<(), AuthError> {
        let mut state = self.record("set_custom_claims");
        let account = self.account_mut(&mut state, uid)?;
        account.custom_attributes = claims.map(|c| Value::Object(c.clone()).to_string());
        Ok(())
    }

    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), AuthError> {
        let mut state = self.record("revoke_refresh_tokens");
        let account = self.account_mut(&mut state, uid)?;
        account.valid_since = Some(Utc::now().timestamp().to_string());
        Ok(())
    }

    async fn import_accounts(
        &self,
        records: &[UserImportRecord],
        _options: Option<&UserImportOptions>,
    ) -> Result<BatchErrorResponse, AuthError> {
        let mut state = self.record("import_accounts");
        let errors = state.import_errors.clone();

        for (index, record) in records.iter().enumerate() {
            if errors.iter().any(|e| e.index == Some(index)) {
                continue;
            }
            let tenant_id = self.tenant_id.clone();
            state
                .accounts
                .retain(|a| !(a.local_id == record.uid && a.tenant_id == tenant_id));
            state.accounts.push(AccountRecord {
                local_id: record.uid.clone(),
                email: record.email.clone(),
                email_verified: record.email_verified.unwrap_or(false),
                display_name: record.display_name.clone(),
                phone_number: record.phone_number.clone(),
                disabled: record.disabled.unwrap_or(false),
                custom_attributes: record.custom_attributes.clone(),
                tenant_id,
                ..Default::default()
            });
        }

        Ok(BatchErrorResponse { errors })
    }

    async fn create_session_cookie(
        &self,
        id_token: &str,
        expires_in_seconds: i64,
    ) -> Result<String, AuthError> {
        let _state = self.record("create_session_cookie");
        Ok(format!(
            "mock-session-cookie.{}.{}",
            expires_in_seconds,
            id_token.len()
        ))
    }

    async fn get_email_action_link(
        &self,
        action: EmailActionType,
        email: &str,
        settings: Option<&ActionCodeSettings>,
    ) -> Result<String, AuthError> {
        let _state = self.record("get_email_action_link");
        let mut link = format!(
            "https://{}.firebaseapp.com/__/auth/action?mode={}&oobCode=mock-code&email={}",
            MOCK_PROJECT_ID,
            action.as_str(),
            email
        );
        if let Some(settings) = settings {
            link.push_str("&continueUrl=");
            link.push_str(&settings.url);
        }
        Ok(link)
    }

    async fn list_oidc_configs(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ProviderConfigPage, AuthError> {
        let state = self.record("list_oidc_configs");
        Ok(self.list_configs(&state.oidc_configs, max_results, page_token))
    }

    async fn get_oidc_config(&self, provider_id: &str) -> Result<Value, AuthError> {
        let state = self.record("get_oidc_config");
        state
            .oidc_configs
            .get(&(self.tenant_id.clone(), provider_id.to_string()))
            .cloned()
            .ok_or_else(|| AuthError::ConfigurationNotFound(provider_id.to_string()))
    }

    async fn create_oidc_config(
        &self,
        provider_id: &str,
        config: &Value,
    ) -> Result<Value, AuthError> {
        let mut state = self.record("create_oidc_config");
        let mut stored = config.clone();
        if let Some(fields) = stored.as_object_mut() {
            let name = self.provider_resource("oauthIdpConfigs", provider_id);
            fields.insert("name".to_string(), Value::String(name));
        }
        state
            .oidc_configs
            .insert((self.tenant_id.clone(), provider_id.to_string()), stored.clone());
        Ok(stored)
    }

    async fn update_oidc_config(
        &self,
        provider_id: &str,
        config: &Value,
    ) -> Result<Value, AuthError> {
        let mut state = self.record("update_oidc_config");
        let stored = state
            .oidc_configs
            .get_mut(&(self.tenant_id.clone(), provider_id.to_string()))
            .ok_or_else(|| AuthError::ConfigurationNotFound(provider_id.to_string()))?;
        merge(stored, config);
        Ok(stored.clone())
    }

    async fn delete_oidc_config(&self, provider_id: &str) -> Result<(), AuthError> {
        let mut state = self.record("delete_oidc_config");
        state
            .oidc_configs
            .remove(&(self.tenant_id.clone(), provider_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| AuthError::ConfigurationNotFound(provider_id.to_string()))
    }

    async fn list_saml_configs(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ProviderConfigPage, AuthError> {
        let state = self.record("list_saml_configs");
        Ok(self.list_configs(&state.saml_configs, max_results, page_token))
    }

    async fn get_saml_config(&self, provider_id: &str) -> Result<Value, AuthError> {
        let state = self.record("get_saml_config");
        state
            .saml_configs
            .get(&(self.tenant_id.clone(), provider_id.to_string()))
            .cloned()
            .ok_or_else(|| AuthError::ConfigurationNotFound(provider_id.to_string()))
    }

    async fn create_saml_config(
        &self,
        provider_id: &str,
        config: &Value,
    ) -> Result<Value, AuthError> {
        let mut state = self.record("create_saml_config");
        let mut stored = config.clone();
        if let Some(fields) = stored.as_object_mut() {
            let name = self.provider_resource("inboundSamlConfigs", provider_id);
            fields.insert("name".to_string(), Value::String(name));
        }
        state
            .saml_configs
            .insert((self.tenant_id.clone(), provider_id.to_string()), stored.clone());
        Ok(stored)
    }

    async fn update_saml_config(
        &self,
        provider_id: &str,
        config: &Value,
    ) -> Result<Value, AuthError> {
        let mut state = self.record("update_saml_config");
        let stored = state
            .saml_configs
            .get_mut(&(self.tenant_id.clone(), provider_id.to_string()))
            .ok_or_else(|| AuthError::ConfigurationNotFound(provider_id.to_string()))?;
        merge(stored, config);
        Ok(stored.clone())
    }

    async fn delete_saml_config(&self, provider_id: &str) -> Result<(), AuthError> {
        let mut state = self.record("delete_saml_config");
        state
            .saml_configs
            .remove(&(self.tenant_id.clone(), provider_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| AuthError::ConfigurationNotFound(provider_id.to_string()))
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<TenantResponse, AuthError> {
        let state = self.record("get_tenant");
        state
            .tenants
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| AuthError::TenantNotFound(tenant_id.to_string()))
    }

    async fn list_tenants(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<TenantPage, AuthError> {
        let state = self.record("list_tenants");
        let all = state
            .tenants
            .iter()
            .map(|(id, t)| (id.clone(), t.clone()))
            .collect();
        let (tenants, next_page_token) = paginate(all, max_results, page_token);
        Ok(TenantPage {
            tenants,
            next_page_token,
        })
    }

    async fn create_tenant(
        &self,
        request: &TenantServerRequest,
    ) -> Result<TenantResponse, AuthError> {
        let mut state = self.record("create_tenant");
        state.next_id += 1;
        let tenant_id = format!("tenant-{}", state.next_id);
        let mut tenant = TenantResponse {
            name: format!("projects/{}/tenants/{}", MOCK_PROJECT_ID, tenant_id),
            ..Default::default()
        };
        apply_tenant_request(&mut tenant, request);
        state.tenants.insert(tenant_id, tenant.clone());
        Ok(tenant)
    }

    async fn update_tenant(
        &self,
        tenant_id: &str,
        request: &TenantServerRequest,
    ) -> Result<TenantResponse, AuthError> {
        let mut state = self.record("update_tenant");
        let tenant = state
            .tenants
            .get_mut(tenant_id)
            .ok_or_else(|| AuthError::TenantNotFound(tenant_id.to_string()))?;
        apply_tenant_request(tenant, request);
        Ok(tenant.clone())
    }

    async fn delete_tenant(&self, tenant_id: &str) -> Result<(), AuthError> {
        let mut state = self.record("delete_tenant");
        state
            .tenants
            .remove(tenant_id)
            .map(|_| ())
            .ok_or_else(|| AuthError::TenantNotFound(tenant_id.to_string()))
    }

    fn for_tenant(&self, tenant_id: &str) -> Arc<dyn AccountDirectory> {
        Arc::new(self.scoped(tenant_id))
    }
}
