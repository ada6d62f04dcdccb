//! Tenant enforcement layered over verification and session cookie minting.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::dtos::SessionCookieOptions;
use crate::models::{DecodedToken, TenantContext};
use crate::services::directory::AccountDirectory;
use crate::services::revocation::TokenVerification;
use crate::services::AuthError;

pub const MIN_SESSION_COOKIE_DURATION_MILLIS: i64 = 5 * 60 * 1000;
pub const MAX_SESSION_COOKIE_DURATION_MILLIS: i64 = 14 * 24 * 60 * 60 * 1000;

/// Check `expiresIn` without any I/O and return it in whole seconds.
pub fn validate_session_cookie_duration(options: &SessionCookieOptions) -> Result<i64, AuthError> {
    let millis = options.expires_in.ok_or_else(|| {
        AuthError::InvalidSessionCookieDuration(
            "expiresIn must be provided in milliseconds".to_string(),
        )
    })?;

    if !(MIN_SESSION_COOKIE_DURATION_MILLIS..=MAX_SESSION_COOKIE_DURATION_MILLIS).contains(&millis)
    {
        return Err(AuthError::InvalidSessionCookieDuration(format!(
            "expiresIn must be between 5 minutes and 14 days, got {} ms",
            millis
        )));
    }

    Ok(millis / 1000)
}

/// Mints a session cookie from an ID token.
#[async_trait]
pub trait SessionCookieIssuer: Send + Sync {
    async fn create_session_cookie(
        &self,
        id_token: &str,
        options: &SessionCookieOptions,
    ) -> Result<String, AuthError>;
}

/// Tenant-agnostic issuer: the directory validates the ID token itself.
pub struct DirectorySessionCookieIssuer {
    directory: Arc<dyn AccountDirectory>,
}

impl DirectorySessionCookieIssuer {
    pub fn new(directory: Arc<dyn AccountDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl SessionCookieIssuer for DirectorySessionCookieIssuer {
    async fn create_session_cookie(
        &self,
        id_token: &str,
        options: &SessionCookieOptions,
    ) -> Result<String, AuthError> {
        let expires_in_seconds = validate_session_cookie_duration(options)?;
        let cookie = self
            .directory
            .create_session_cookie(id_token, expires_in_seconds)
            .await?;
        info!(expires_in_seconds, "Session cookie minted");
        Ok(cookie)
    }
}

/// Rejects any token whose tenant claim differs from the bound tenant.
pub struct TenantScopedVerifier {
    tenant: TenantContext,
    inner: Arc<dyn TokenVerification>,
}

impl TenantScopedVerifier {
    pub fn new(tenant: TenantContext, inner: Arc<dyn TokenVerification>) -> Self {
        Self { tenant, inner }
    }
}

#[async_trait]
impl TokenVerification for TenantScopedVerifier {
    async fn verify(&self, token: &str, check_revoked: bool) -> Result<DecodedToken, AuthError> {
        let decoded = self.inner.verify(token, check_revoked).await?;

        if decoded.tenant_id.as_deref() != Some(self.tenant.tenant_id()) {
            warn!(
                expected = %self.tenant.tenant_id(),
                actual = ?decoded.tenant_id,
                uid = %decoded.uid,
                "Token tenant does not match"
            );
            return Err(AuthError::MismatchingTenantId(format!(
                "The provided token does not match the tenant ID \"{}\"",
                self.tenant.tenant_id()
            )));
        }

        Ok(decoded)
    }
}

/// Verifies the ID token against the bound tenant before a cookie is minted,
/// so no cookie is ever issued for another tenant's token.
pub struct TenantScopedCookieIssuer {
    id_tokens: Arc<dyn TokenVerification>,
    inner: Arc<dyn SessionCookieIssuer>,
}

impl TenantScopedCookieIssuer {
    /// `id_tokens` must already be tenant-scoped.
    pub fn new(id_tokens: Arc<dyn TokenVerification>, inner: Arc<dyn SessionCookieIssuer>) -> Self {
        Self { id_tokens, inner }
    }
}

#[async_trait]
impl SessionCookieIssuer for TenantScopedCookieIssuer {
    async fn create_session_cookie(
        &self,
        id_token: &str,
        options: &SessionCookieOptions,
    ) -> Result<String, AuthError> {
        validate_session_cookie_duration(options)?;
        self.id_tokens.verify(id_token, false).await?;
        self.inner.create_session_cookie(id_token, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::directory::MockDirectory;
    use crate::services::revocation::RevocationCheckedVerifier;
    use crate::services::test_support::{
        id_token_claims, mint_token, now_seconds, TEST_KEY_ID, TEST_PRIVATE_KEY,
        TEST_PROJECT_ID, TEST_PUBLIC_KEY,
    };
    use crate::services::verifier::{JwtTokenVerifier, TokenKind};
    use std::collections::HashMap;

    struct Fixture {
        directory: MockDirectory,
        verifier: Arc<dyn TokenVerification>,
        issuer: TenantScopedCookieIssuer,
    }

    fn fixture(tenant_id: &str) -> Fixture {
        let directory = MockDirectory::new();
        let scoped_directory = directory.for_tenant(tenant_id);
        let pems = HashMap::from([(TEST_KEY_ID.to_string(), TEST_PUBLIC_KEY.to_string())]);
        let base = JwtTokenVerifier::from_pem_map(TokenKind::IdToken, TEST_PROJECT_ID, &pems)
            .expect("verifier should build");
        let orchestrator = Arc::new(RevocationCheckedVerifier::new(
            Arc::new(base),
            Arc::clone(&scoped_directory),
        ));
        let tenant = TenantContext::new(tenant_id).expect("tenant id");
        let verifier: Arc<dyn TokenVerification> =
            Arc::new(TenantScopedVerifier::new(tenant, orchestrator));
        let issuer = TenantScopedCookieIssuer::new(
            Arc::clone(&verifier),
            Arc::new(DirectorySessionCookieIssuer::new(scoped_directory)),
        );
        Fixture {
            directory,
            verifier,
            issuer,
        }
    }

    fn token_for(tenant: Option<&str>) -> String {
        mint_token(
            &id_token_claims("user-1", now_seconds(), tenant),
            TEST_PRIVATE_KEY,
            TEST_KEY_ID,
        )
    }

    #[test]
    fn duration_bounds() {
        assert!(matches!(
            validate_session_cookie_duration(&SessionCookieOptions::default()),
            Err(AuthError::InvalidSessionCookieDuration(_))
        ));
        assert!(validate_session_cookie_duration(&SessionCookieOptions::expires_in_millis(
            MIN_SESSION_COOKIE_DURATION_MILLIS - 1
        ))
        .is_err());
        assert!(validate_session_cookie_duration(&SessionCookieOptions::expires_in_millis(
            MAX_SESSION_COOKIE_DURATION_MILLIS + 1
        ))
        .is_err());
        assert_eq!(
            validate_session_cookie_duration(&SessionCookieOptions::expires_in_millis(
                MIN_SESSION_COOKIE_DURATION_MILLIS
            ))
            .ok(),
            Some(300)
        );
    }

    #[tokio::test]
    async fn matching_tenant_is_accepted() -> Result<(), AuthError> {
        let fixture = fixture("tenant-1");
        let decoded = fixture.verifier.verify(&token_for(Some("tenant-1")), false).await?;
        assert_eq!(decoded.tenant_id.as_deref(), Some("tenant-1"));
        Ok(())
    }

    #[tokio::test]
    async fn other_or_missing_tenant_is_rejected() {
        let fixture = fixture("tenant-1");
        for token in [token_for(Some("tenant-2")), token_for(None)] {
            assert!(matches!(
                fixture.verifier.verify(&token, false).await,
                Err(AuthError::MismatchingTenantId(_))
            ));
        }
    }

    #[tokio::test]
    async fn cookie_is_not_minted_for_foreign_tenant_token() {
        let fixture = fixture("tenant-1");
        let result = fixture
            .issuer
            .create_session_cookie(
                &token_for(Some("tenant-2")),
                &SessionCookieOptions::expires_in_millis(MIN_SESSION_COOKIE_DURATION_MILLIS),
            )
            .await;

        assert!(matches!(result, Err(AuthError::MismatchingTenantId(_))));
        assert_eq!(fixture.directory.call_count("create_session_cookie"), 0);
    }

    #[tokio::test]
    async fn cookie_duration_is_checked_before_anything_else() {
        let fixture = fixture("tenant-1");
        let result = fixture
            .issuer
            .create_session_cookie("not-even-a-token", &SessionCookieOptions::default())
            .await;

        assert!(matches!(
            result,
            Err(AuthError::InvalidSessionCookieDuration(_))
        ));
        assert!(fixture.directory.calls().is_empty());
    }

    #[tokio::test]
    async fn cookie_is_minted_for_own_tenant() -> Result<(), AuthError> {
        let fixture = fixture("tenant-1");
        let cookie = fixture
            .issuer
            .create_session_cookie(
                &token_for(Some("tenant-1")),
                &SessionCookieOptions::expires_in_millis(60 * 60 * 1000),
            )
            .await?;

        assert!(cookie.starts_with("mock-session-cookie.3600"));
        assert_eq!(fixture.directory.call_count("create_session_cookie"), 1);
        Ok(())
    }
}
