//! Custom token minting.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::Header;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::error;

use crate::models::TenantContext;
use crate::services::signer::CryptoSigner;
use crate::services::AuthError;
use crate::utils::validation::{validate_developer_claims, MAX_UID_LENGTH};

/// Audience custom tokens are minted for.
pub const IDENTITY_TOOLKIT_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

pub const MAX_CUSTOM_TOKEN_LIFETIME_MINUTES: i64 = 60;

#[derive(Serialize)]
struct TenantClaim<'a> {
    tenant: &'a str,
}

#[derive(Serialize)]
struct CustomTokenClaims<'a> {
    aud: &'static str,
    iat: i64,
    exp: i64,
    iss: &'a str,
    sub: &'a str,
    uid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    firebase: Option<TenantClaim<'a>>,
}

/// Mints custom tokens with a bound signer and optional tenant.
#[derive(Clone)]
pub struct TokenGenerator {
    signer: Arc<dyn CryptoSigner>,
    tenant_id: Option<String>,
    lifetime: Duration,
}

impl TokenGenerator {
    /// `lifetime` is clamped to one hour.
    pub fn new(signer: Arc<dyn CryptoSigner>, lifetime: Duration) -> Self {
        Self {
            signer,
            tenant_id: None,
            lifetime: lifetime.min(Duration::minutes(MAX_CUSTOM_TOKEN_LIFETIME_MINUTES)),
        }
    }

    /// A generator sharing this one's signer that embeds `tenant` in every token.
    pub fn with_tenant(&self, tenant: &TenantContext) -> Self {
        Self {
            signer: Arc::clone(&self.signer),
            tenant_id: Some(tenant.tenant_id().to_string()),
            lifetime: self.lifetime,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub async fn create_custom_token(
        &self,
        uid: &str,
        developer_claims: Option<&Map<String, Value>>,
    ) -> Result<String, AuthError> {
        if uid.is_empty() || uid.chars().count() > MAX_UID_LENGTH {
            return Err(AuthError::invalid_argument(format!(
                "uid must be a non-empty string with at most {} characters",
                MAX_UID_LENGTH
            )));
        }
        if let Some(claims) = developer_claims {
            validate_developer_claims(claims)?;
        }

        let now = Utc::now().timestamp();
        let account_id = self.signer.account_id();
        let claims = CustomTokenClaims {
            aud: IDENTITY_TOOLKIT_AUDIENCE,
            iat: now,
            exp: now + self.lifetime.num_seconds(),
            iss: account_id,
            sub: account_id,
            uid,
            claims: developer_claims.filter(|c| !c.is_empty()),
            firebase: self.tenant_id.as_deref().map(|tenant| TenantClaim { tenant }),
        };

        let header = Header::new(self.signer.algorithm());
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );

        let signature = self
            .signer
            .sign(signing_input.as_bytes())
            .await
            .map_err(|e| {
                error!(error = %e, "Custom token signing failed");
                AuthError::internal(format!("Failed to sign custom token: {}", e))
            })?;

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::signer::ServiceAccountSigner;
    use crate::services::test_support::{TEST_PRIVATE_KEY, TEST_PUBLIC_KEY};
    use async_trait::async_trait;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use serde_json::json;

    const SERVICE_ACCOUNT: &str = "svc@demo.iam.gserviceaccount.com";

    fn generator() -> Result<TokenGenerator, AuthError> {
        let signer = ServiceAccountSigner::from_pem(SERVICE_ACCOUNT, TEST_PRIVATE_KEY)?;
        Ok(TokenGenerator::new(Arc::new(signer), Duration::minutes(60)))
    }

    fn decode_claims(token: &str) -> Value {
        let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).expect("public key");
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[IDENTITY_TOOLKIT_AUDIENCE]);
        validation.set_issuer(&[SERVICE_ACCOUNT]);
        decode::<Value>(token, &key, &validation)
            .expect("custom token should verify")
            .claims
    }

    struct FailingSigner;

    #[async_trait]
    impl CryptoSigner for FailingSigner {
        async fn sign(&self, _payload: &[u8]) -> Result<Vec<u8>, AuthError> {
            Err(AuthError::internal("signBlob unavailable"))
        }

        fn account_id(&self) -> &str {
            SERVICE_ACCOUNT
        }
    }

    #[tokio::test]
    async fn token_carries_uid_and_developer_claims() -> Result<(), AuthError> {
        let claims = json!({ "premium": true, "tier": "gold" });
        let token = generator()?
            .create_custom_token("user-1", claims.as_object())
            .await?;

        let decoded = decode_claims(&token);
        assert_eq!(decoded["uid"], "user-1");
        assert_eq!(decoded["sub"], SERVICE_ACCOUNT);
        assert_eq!(decoded["claims"]["tier"], "gold");
        assert!(decoded.get("firebase").is_none());

        let lifetime = decoded["exp"].as_i64().unwrap_or(0) - decoded["iat"].as_i64().unwrap_or(0);
        assert_eq!(lifetime, 3600);
        Ok(())
    }

    #[tokio::test]
    async fn tenant_bound_token_embeds_tenant() -> Result<(), AuthError> {
        let tenant = TenantContext::new("tenant-1")?;
        let token = generator()?
            .with_tenant(&tenant)
            .create_custom_token("user-1", None)
            .await?;

        assert_eq!(decode_claims(&token)["firebase"]["tenant"], "tenant-1");
        Ok(())
    }

    #[tokio::test]
    async fn invalid_arguments_are_rejected_before_signing() -> Result<(), AuthError> {
        let generator = generator()?;
        assert!(matches!(
            generator.create_custom_token("", None).await,
            Err(AuthError::InvalidArgument(_))
        ));

        let reserved = json!({ "sub": "someone-else" });
        assert!(matches!(
            generator.create_custom_token("user-1", reserved.as_object()).await,
            Err(AuthError::InvalidArgument(_))
        ));

        let oversized = json!({ "blob": "x".repeat(1001) });
        assert!(matches!(
            generator.create_custom_token("user-1", oversized.as_object()).await,
            Err(AuthError::InvalidArgument(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn signing_failure_is_internal() {
        let generator = TokenGenerator::new(Arc::new(FailingSigner), Duration::minutes(5));
        assert!(matches!(
            generator.create_custom_token("user-1", None).await,
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn lifetime_is_capped_at_one_hour() {
        let generator = TokenGenerator::new(Arc::new(FailingSigner), Duration::hours(5));
        assert_eq!(generator.lifetime, Duration::minutes(60));
    }
}
