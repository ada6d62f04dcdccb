//! Token verification with an optional revocation check.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{DecodedToken, UserRecord};
use crate::services::directory::AccountDirectory;
use crate::services::verifier::TokenVerifier;
use crate::services::AuthError;

/// Verification as exposed to callers: local decode plus, on request, a
/// freshness check against the account's revocation cutoff.
#[async_trait]
pub trait TokenVerification: Send + Sync {
    async fn verify(&self, token: &str, check_revoked: bool) -> Result<DecodedToken, AuthError>;
}

/// Used unchanged for ID tokens and session cookies; the wrapped verifier's
/// kind selects the revocation error.
pub struct RevocationCheckedVerifier {
    verifier: Arc<dyn TokenVerifier>,
    directory: Arc<dyn AccountDirectory>,
}

impl RevocationCheckedVerifier {
    pub fn new(verifier: Arc<dyn TokenVerifier>, directory: Arc<dyn AccountDirectory>) -> Self {
        Self {
            verifier,
            directory,
        }
    }
}

/// `auth_time` predates the cutoff. Both sides are compared in milliseconds;
/// no cutoff means the account was never revoked.
pub fn is_revoked(decoded: &DecodedToken, tokens_valid_after_millis: Option<i64>) -> bool {
    tokens_valid_after_millis.is_some_and(|cutoff| decoded.auth_time_millis() < cutoff)
}

#[async_trait]
impl TokenVerification for RevocationCheckedVerifier {
    async fn verify(&self, token: &str, check_revoked: bool) -> Result<DecodedToken, AuthError> {
        let decoded = self.verifier.verify(token).await?;
        if !check_revoked {
            return Ok(decoded);
        }

        let account = self.directory.get_account_by_uid(&decoded.uid).await?;
        let user = UserRecord::try_from(account)?;

        if is_revoked(&decoded, user.tokens_valid_after_time_millis) {
            let kind = self.verifier.kind();
            warn!(
                uid = %decoded.uid,
                auth_time = decoded.auth_time,
                valid_after_millis = ?user.tokens_valid_after_time_millis,
                "Rejected revoked {}",
                kind.label()
            );
            return Err(kind.revoked());
        }

        debug!(uid = %decoded.uid, "Revocation check passed");
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountRecord;
    use crate::services::directory::MockDirectory;
    use crate::services::verifier::{JwtTokenVerifier, TokenKind};
    use crate::services::test_support::{
        id_token_claims, mint_token, now_seconds, TEST_KEY_ID, TEST_PRIVATE_KEY,
        TEST_PROJECT_ID, TEST_PUBLIC_KEY,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn orchestrator(kind: TokenKind, directory: &MockDirectory) -> RevocationCheckedVerifier {
        let pems = HashMap::from([(TEST_KEY_ID.to_string(), TEST_PUBLIC_KEY.to_string())]);
        let verifier = JwtTokenVerifier::from_pem_map(kind, TEST_PROJECT_ID, &pems)
            .expect("verifier should build");
        RevocationCheckedVerifier::new(Arc::new(verifier), Arc::new(directory.clone()))
    }

    fn decoded(auth_time: i64) -> DecodedToken {
        DecodedToken {
            uid: "u".to_string(),
            issuer: String::new(),
            audience: String::new(),
            issued_at: auth_time,
            expires_at: auth_time + 3600,
            auth_time,
            tenant_id: None,
            sign_in_provider: None,
            claims: Default::default(),
        }
    }

    #[test]
    fn compares_in_milliseconds_with_strict_inequality() {
        assert!(is_revoked(&decoded(99), Some(100_000)));
        assert!(!is_revoked(&decoded(100), Some(100_000)));
        assert!(!is_revoked(&decoded(101), Some(100_000)));
        assert!(!is_revoked(&decoded(0), None));
    }

    #[tokio::test]
    async fn unchecked_verification_performs_no_directory_io() -> Result<(), AuthError> {
        let directory = MockDirectory::new();
        let token = mint_token(
            &id_token_claims("user-1", now_seconds(), None),
            TEST_PRIVATE_KEY,
            TEST_KEY_ID,
        );

        let decoded = orchestrator(TokenKind::IdToken, &directory)
            .verify(&token, false)
            .await?;
        assert_eq!(decoded.uid, "user-1");
        assert!(directory.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn token_older_than_cutoff_is_revoked() -> Result<(), AuthError> {
        let directory = MockDirectory::new();
        let auth_time = now_seconds() - 600;
        directory.insert_account(AccountRecord::new("user-1").with_valid_since_seconds(auth_time + 1));
        let token = mint_token(
            &id_token_claims("user-1", auth_time, None),
            TEST_PRIVATE_KEY,
            TEST_KEY_ID,
        );

        let result = orchestrator(TokenKind::IdToken, &directory)
            .verify(&token, true)
            .await;
        assert!(matches!(result, Err(AuthError::IdTokenRevoked)));
        assert_eq!(directory.call_count("get_account_by_uid"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn session_cookies_report_their_own_revocation_kind() -> Result<(), AuthError> {
        let directory = MockDirectory::new();
        let auth_time = now_seconds() - 600;
        directory.insert_account(AccountRecord::new("user-1").with_valid_since_seconds(now_seconds()));

        let mut claims = id_token_claims("user-1", auth_time, None);
        claims["iss"] = json!(TokenKind::SessionCookie.issuer(TEST_PROJECT_ID));
        let cookie = mint_token(&claims, TEST_PRIVATE_KEY, TEST_KEY_ID);

        let result = orchestrator(TokenKind::SessionCookie, &directory)
            .verify(&cookie, true)
            .await;
        assert!(matches!(result, Err(AuthError::SessionCookieRevoked)));
        Ok(())
    }

    #[tokio::test]
    async fn account_without_cutoff_never_revokes() -> Result<(), AuthError> {
        let directory = MockDirectory::new();
        directory.insert_account(AccountRecord::new("user-1"));
        let token = mint_token(
            &id_token_claims("user-1", 1, None),
            TEST_PRIVATE_KEY,
            TEST_KEY_ID,
        );

        let decoded = orchestrator(TokenKind::IdToken, &directory)
            .verify(&token, true)
            .await?;
        assert_eq!(decoded.auth_time, 1);
        Ok(())
    }

    #[tokio::test]
    async fn missing_account_propagates_unchanged() {
        let directory = MockDirectory::new();
        let token = mint_token(
            &id_token_claims("ghost", now_seconds(), None),
            TEST_PRIVATE_KEY,
            TEST_KEY_ID,
        );

        let result = orchestrator(TokenKind::IdToken, &directory)
            .verify(&token, true)
            .await;
        assert!(matches!(result, Err(AuthError::UserNotFound(_))));
    }
}
