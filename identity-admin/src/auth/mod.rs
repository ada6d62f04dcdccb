//! Caller-facing façades.
//!
//! `Auth` serves a whole project, `TenantAwareAuth` one tenant of it. Both are
//! the same composition of services; a tenant only changes which directory
//! view is used and which decorators wrap verification and cookie minting.

mod tenant_manager;

pub use tenant_manager::TenantManager;

use chrono::Duration;
use serde_json::{Map, Value};
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use validator::Validate;

use crate::config::AdminConfig;
use crate::dtos::{
    ActionCodeSettings, AuthProviderConfigFilter, CreateRequest, DeleteUsersResult,
    EmailActionType, GetUsersResult, ListProviderConfigResult, ListUsersResult,
    SessionCookieOptions, UpdateRequest, UserImportOptions, UserImportRecord, UserImportResult,
};
use crate::models::{DecodedToken, ProviderConfig, TenantContext, UserIdentifier, UserRecord};
use crate::services::directory::MAX_LIST_ACCOUNTS_RESULTS;
use crate::services::{
    batch_delete, batch_lookup, AccountDirectory, AuthError, CryptoSigner,
    DirectorySessionCookieIssuer, HttpAccountDirectory, IamSigner, JwtTokenVerifier,
    ProviderConfigDispatcher, RevocationCheckedVerifier, ServiceAccountSigner,
    SessionCookieIssuer, TenantScopedCookieIssuer, TenantScopedVerifier, TokenGenerator,
    TokenKind, TokenVerification, TokenVerifier,
};
use crate::utils::validation::{
    validate_developer_claims, validate_email, validate_page_token, validate_phone_number,
    validate_provider_link, validate_uid,
};

/// Collaborators shared by every façade of one project.
#[derive(Clone)]
pub struct AuthComponents {
    pub project_id: String,
    pub directory: Arc<dyn AccountDirectory>,
    pub signer: Arc<dyn CryptoSigner>,
    pub id_token_verifier: Arc<dyn TokenVerifier>,
    pub session_cookie_verifier: Arc<dyn TokenVerifier>,
    pub custom_token_lifetime: Duration,
}

impl AuthComponents {
    /// Wire the HTTP directory, the configured signer and both JWT verifiers.
    pub fn from_config(config: &AdminConfig) -> Result<Self, AuthError> {
        let directory = HttpAccountDirectory::from_config(&config.directory, &config.project_id)?;

        let signer: Arc<dyn CryptoSigner> = match &config.credential.private_key_path {
            Some(path) => Arc::new(ServiceAccountSigner::from_key_file(
                config.credential.service_account_email.clone(),
                path,
            )?),
            None => Arc::new(IamSigner::new(
                config.credential.service_account_email.clone(),
                config.directory.access_token.clone(),
            )),
        };

        let keys_path = &config.token.public_keys_path;
        let id_token_verifier =
            JwtTokenVerifier::from_key_file(TokenKind::IdToken, config.project_id.clone(), keys_path)?;
        let session_cookie_verifier = JwtTokenVerifier::from_key_file(
            TokenKind::SessionCookie,
            config.project_id.clone(),
            keys_path,
        )?;

        info!(
            project_id = %config.project_id,
            signer = %signer.account_id(),
            emulator = config.directory.emulator_host.is_some(),
            "Identity admin components initialized"
        );

        Ok(Self {
            project_id: config.project_id.clone(),
            directory: Arc::new(directory),
            signer,
            id_token_verifier: Arc::new(id_token_verifier),
            session_cookie_verifier: Arc::new(session_cookie_verifier),
            custom_token_lifetime: Duration::minutes(config.token.custom_token_lifetime_minutes),
        })
    }
}

/// Account, token and provider operations against one directory scope.
#[derive(Clone)]
pub struct Auth {
    project_id: String,
    tenant: Option<TenantContext>,
    directory: Arc<dyn AccountDirectory>,
    token_generator: TokenGenerator,
    id_tokens: Arc<dyn TokenVerification>,
    session_cookies: Arc<dyn TokenVerification>,
    cookie_issuer: Arc<dyn SessionCookieIssuer>,
    providers: ProviderConfigDispatcher,
}

impl Auth {
    /// Project-level façade.
    pub fn new(components: &AuthComponents) -> Self {
        Self::build(components, None)
    }

    pub fn from_config(config: &AdminConfig) -> Result<Self, AuthError> {
        Ok(Self::new(&AuthComponents::from_config(config)?))
    }

    fn build(components: &AuthComponents, tenant: Option<TenantContext>) -> Self {
        let directory = match &tenant {
            Some(tenant) => components.directory.for_tenant(tenant.tenant_id()),
            None => Arc::clone(&components.directory),
        };

        let base_generator = TokenGenerator::new(
            Arc::clone(&components.signer),
            components.custom_token_lifetime,
        );
        let token_generator = match &tenant {
            Some(tenant) => base_generator.with_tenant(tenant),
            None => base_generator,
        };

        let id_tokens: Arc<dyn TokenVerification> = Arc::new(RevocationCheckedVerifier::new(
            Arc::clone(&components.id_token_verifier),
            Arc::clone(&directory),
        ));
        let session_cookies: Arc<dyn TokenVerification> = Arc::new(RevocationCheckedVerifier::new(
            Arc::clone(&components.session_cookie_verifier),
            Arc::clone(&directory),
        ));
        let cookie_issuer: Arc<dyn SessionCookieIssuer> =
            Arc::new(DirectorySessionCookieIssuer::new(Arc::clone(&directory)));

        let (id_tokens, session_cookies, cookie_issuer) = match &tenant {
            Some(tenant) => {
                let id_tokens: Arc<dyn TokenVerification> =
                    Arc::new(TenantScopedVerifier::new(tenant.clone(), id_tokens));
                let session_cookies: Arc<dyn TokenVerification> =
                    Arc::new(TenantScopedVerifier::new(tenant.clone(), session_cookies));
                let cookie_issuer: Arc<dyn SessionCookieIssuer> = Arc::new(
                    TenantScopedCookieIssuer::new(Arc::clone(&id_tokens), cookie_issuer),
                );
                (id_tokens, session_cookies, cookie_issuer)
            }
            None => (id_tokens, session_cookies, cookie_issuer),
        };

        Self {
            project_id: components.project_id.clone(),
            tenant,
            providers: ProviderConfigDispatcher::new(Arc::clone(&directory)),
            directory,
            token_generator,
            id_tokens,
            session_cookies,
            cookie_issuer,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant.as_ref().map(TenantContext::tenant_id)
    }

    pub async fn get_user(&self, uid: &str) -> Result<UserRecord, AuthError> {
        validate_uid(uid)?;
        let account = self.directory.get_account_by_uid(uid).await?;
        UserRecord::try_from(account)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, AuthError> {
        validate_email(email)?;
        let account = self.directory.get_account_by_email(email).await?;
        UserRecord::try_from(account)
    }

    pub async fn get_user_by_phone_number(
        &self,
        phone_number: &str,
    ) -> Result<UserRecord, AuthError> {
        validate_phone_number(phone_number)?;
        let account = self.directory.get_account_by_phone(phone_number).await?;
        UserRecord::try_from(account)
    }

    /// `phone` and `email` are looked up through their own fields.
    pub async fn get_user_by_provider_uid(
        &self,
        provider_id: &str,
        provider_uid: &str,
    ) -> Result<UserRecord, AuthError> {
        validate_provider_link(provider_id, provider_uid)?;
        match provider_id {
            "phone" => self.get_user_by_phone_number(provider_uid).await,
            "email" => self.get_user_by_email(provider_uid).await,
            _ => {
                let account = self
                    .directory
                    .get_account_by_provider_uid(provider_id, provider_uid)
                    .await?;
                UserRecord::try_from(account)
            }
        }
    }

    /// One directory round trip for up to 100 identifiers.
    #[instrument(skip(self, identifiers), fields(count = identifiers.len()))]
    pub async fn get_users(
        &self,
        identifiers: &[UserIdentifier],
    ) -> Result<GetUsersResult, AuthError> {
        batch_lookup::validate_identifiers(identifiers)?;
        if identifiers.is_empty() {
            return Ok(GetUsersResult {
                users: Vec::new(),
                not_found: Vec::new(),
            });
        }

        let accounts = self.directory.get_accounts_by_identifiers(identifiers).await?;
        let result = batch_lookup::resolve(identifiers, accounts)?;
        debug!(
            found = result.users.len(),
            not_found = result.not_found.len(),
            "Batch lookup resolved"
        );
        Ok(result)
    }

    pub async fn list_users(
        &self,
        max_results: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<ListUsersResult, AuthError> {
        let max_results = max_results.unwrap_or(MAX_LIST_ACCOUNTS_RESULTS);
        if max_results == 0 || max_results > MAX_LIST_ACCOUNTS_RESULTS {
            return Err(AuthError::invalid_argument(format!(
                "maxResults must be between 1 and {}",
                MAX_LIST_ACCOUNTS_RESULTS
            )));
        }
        validate_page_token(page_token)?;

        let page = self.directory.list_accounts(max_results, page_token).await?;
        let users = page
            .accounts
            .into_iter()
            .map(UserRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListUsersResult {
            users,
            page_token: page.next_page_token,
        })
    }

    pub async fn create_user(&self, properties: &CreateRequest) -> Result<UserRecord, AuthError> {
        if let Some(uid) = &properties.uid {
            validate_uid(uid)?;
        }
        if let Some(email) = &properties.email {
            validate_email(email)?;
        }
        if let Some(phone_number) = &properties.phone_number {
            validate_phone_number(phone_number)?;
        }

        let uid = self.directory.create_account(properties).await?;
        info!(uid = %uid, tenant_id = ?self.tenant_id(), "User created");

        match self.get_user(&uid).await {
            Err(AuthError::UserNotFound(_)) => {
                error!(uid = %uid, "Created user could not be read back");
                Err(AuthError::internal(format!(
                    "Unable to fetch newly created user {}",
                    uid
                )))
            }
            other => other,
        }
    }

    pub async fn update_user(
        &self,
        uid: &str,
        properties: &UpdateRequest,
    ) -> Result<UserRecord, AuthError> {
        validate_uid(uid)?;
        if let Some(email) = &properties.email {
            validate_email(email)?;
        }
        if let Some(phone_number) = &properties.phone_number {
            validate_phone_number(phone_number)?;
        }

        let uid = self.directory.update_account(uid, properties).await?;
        info!(uid = %uid, "User updated");
        self.get_user(&uid).await
    }

    pub async fn delete_user(&self, uid: &str) -> Result<(), AuthError> {
        validate_uid(uid)?;
        self.directory.delete_account(uid).await?;
        info!(uid = %uid, tenant_id = ?self.tenant_id(), "User deleted");
        Ok(())
    }

    /// Never fails for per-uid errors; those are reported by index.
    #[instrument(skip(self, uids), fields(count = uids.len()))]
    pub async fn delete_users(&self, uids: &[String]) -> Result<DeleteUsersResult, AuthError> {
        batch_delete::validate_delete_request(uids)?;

        let response = self.directory.delete_accounts(uids, true).await?;
        let result = batch_delete::aggregate(uids.len(), response.errors)?;
        info!(
            success_count = result.success_count,
            failure_count = result.failure_count,
            "Batch delete completed"
        );
        Ok(result)
    }

    /// `None` clears every custom claim.
    pub async fn set_custom_user_claims(
        &self,
        uid: &str,
        claims: Option<&Map<String, Value>>,
    ) -> Result<(), AuthError> {
        validate_uid(uid)?;
        if let Some(claims) = claims {
            validate_developer_claims(claims)?;
        }
        self.directory.set_custom_claims(uid, claims).await?;
        info!(uid = %uid, cleared = claims.is_none(), "Custom claims updated");
        Ok(())
    }

    /// Sets the account's revocation cutoff to now.
    pub async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), AuthError> {
        validate_uid(uid)?;
        self.directory.revoke_refresh_tokens(uid).await?;
        info!(uid = %uid, "Refresh tokens revoked");
        Ok(())
    }

    #[instrument(skip(self, records, options), fields(count = records.len()))]
    pub async fn import_users(
        &self,
        records: &[UserImportRecord],
        options: Option<&UserImportOptions>,
    ) -> Result<UserImportResult, AuthError> {
        batch_delete::validate_import_request(records.len())?;
        for record in records {
            validate_uid(&record.uid)?;
            if let Some(email) = &record.email {
                validate_email(email)?;
            }
            if let Some(phone_number) = &record.phone_number {
                validate_phone_number(phone_number)?;
            }
        }
        if records.iter().any(|r| r.password_hash.is_some()) && options.is_none() {
            return Err(AuthError::invalid_argument(
                "Hash options are required when importing users with passwords",
            ));
        }

        let response = self.directory.import_accounts(records, options).await?;
        let result = batch_delete::aggregate_import(records.len(), response.errors)?;
        info!(
            success_count = result.success_count,
            failure_count = result.failure_count,
            "User import completed"
        );
        Ok(result)
    }

    pub async fn create_custom_token(
        &self,
        uid: &str,
        developer_claims: Option<&Map<String, Value>>,
    ) -> Result<String, AuthError> {
        self.token_generator
            .create_custom_token(uid, developer_claims)
            .await
    }

    pub async fn verify_id_token(
        &self,
        id_token: &str,
        check_revoked: bool,
    ) -> Result<DecodedToken, AuthError> {
        self.id_tokens.verify(id_token, check_revoked).await
    }

    pub async fn create_session_cookie(
        &self,
        id_token: &str,
        options: &SessionCookieOptions,
    ) -> Result<String, AuthError> {
        self.cookie_issuer
            .create_session_cookie(id_token, options)
            .await
    }

    pub async fn verify_session_cookie(
        &self,
        session_cookie: &str,
        check_revoked: bool,
    ) -> Result<DecodedToken, AuthError> {
        self.session_cookies
            .verify(session_cookie, check_revoked)
            .await
    }

    pub async fn generate_password_reset_link(
        &self,
        email: &str,
        settings: Option<&ActionCodeSettings>,
    ) -> Result<String, AuthError> {
        self.email_action_link(EmailActionType::PasswordReset, email, settings)
            .await
    }

    pub async fn generate_email_verification_link(
        &self,
        email: &str,
        settings: Option<&ActionCodeSettings>,
    ) -> Result<String, AuthError> {
        self.email_action_link(EmailActionType::VerifyEmail, email, settings)
            .await
    }

    pub async fn generate_sign_in_with_email_link(
        &self,
        email: &str,
        settings: &ActionCodeSettings,
    ) -> Result<String, AuthError> {
        self.email_action_link(EmailActionType::EmailSignin, email, Some(settings))
            .await
    }

    async fn email_action_link(
        &self,
        action: EmailActionType,
        email: &str,
        settings: Option<&ActionCodeSettings>,
    ) -> Result<String, AuthError> {
        validate_email(email)?;
        if let Some(settings) = settings {
            settings
                .validate()
                .map_err(|e| AuthError::invalid_argument(format!("Invalid action code settings: {}", e)))?;
        }
        self.directory
            .get_email_action_link(action, email, settings)
            .await
    }

    pub async fn get_provider_config(&self, provider_id: &str) -> Result<ProviderConfig, AuthError> {
        self.providers.get(provider_id).await
    }

    pub async fn list_provider_configs(
        &self,
        filter: &AuthProviderConfigFilter,
    ) -> Result<ListProviderConfigResult, AuthError> {
        self.providers.list(filter).await
    }

    pub async fn create_provider_config(&self, config: &Value) -> Result<ProviderConfig, AuthError> {
        self.providers.create(config).await
    }

    pub async fn update_provider_config(
        &self,
        provider_id: &str,
        config: &Value,
    ) -> Result<ProviderConfig, AuthError> {
        self.providers.update(provider_id, config).await
    }

    pub async fn delete_provider_config(&self, provider_id: &str) -> Result<(), AuthError> {
        self.providers.delete(provider_id).await
    }
}

/// `Auth` bound to a single tenant. Every token it mints carries the tenant,
/// and every token or cookie it accepts must carry it too.
#[derive(Clone)]
pub struct TenantAwareAuth {
    tenant: TenantContext,
    auth: Auth,
}

impl TenantAwareAuth {
    pub fn new(components: &AuthComponents, tenant: TenantContext) -> Self {
        Self {
            auth: Auth::build(components, Some(tenant.clone())),
            tenant,
        }
    }

    pub fn tenant_id(&self) -> &str {
        self.tenant.tenant_id()
    }
}

impl Deref for TenantAwareAuth {
    type Target = Auth;

    fn deref(&self) -> &Self::Target {
        &self.auth
    }
}
