//! Signing credentials for custom tokens.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use jsonwebtoken::Algorithm;
use reqwest::Client;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::fs;
use tracing::{debug, error};

use crate::services::AuthError;

pub const DEFAULT_IAM_URL: &str = "https://iamcredentials.googleapis.com";

/// Produces raw RS256 signatures on behalf of a service account.
#[async_trait]
pub trait CryptoSigner: Send + Sync {
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, AuthError>;

    fn algorithm(&self) -> Algorithm {
        Algorithm::RS256
    }

    /// Service account the signatures are attributed to.
    fn account_id(&self) -> &str;
}

/// Signs locally with a service account's private key.
pub struct ServiceAccountSigner {
    client_email: String,
    signing_key: SigningKey<Sha256>,
}

impl ServiceAccountSigner {
    pub fn from_pem(client_email: impl Into<String>, private_key_pem: &str) -> Result<Self, AuthError> {
        let key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| AuthError::internal(format!("Failed to parse private key: {}", e)))?;

        Ok(Self {
            client_email: client_email.into(),
            signing_key: SigningKey::<Sha256>::new(key),
        })
    }

    pub fn from_key_file(client_email: impl Into<String>, path: &str) -> Result<Self, AuthError> {
        let pem = fs::read_to_string(path).map_err(|e| {
            AuthError::internal(format!("Failed to read private key from {}: {}", path, e))
        })?;
        Self::from_pem(client_email, &pem)
    }
}

#[async_trait]
impl CryptoSigner for ServiceAccountSigner {
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, AuthError> {
        let signature = self
            .signing_key
            .try_sign(payload)
            .map_err(|e| AuthError::internal(format!("Failed to sign payload: {}", e)))?;
        Ok(signature.to_vec())
    }

    fn account_id(&self) -> &str {
        &self.client_email
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignBlobResponse {
    signed_blob: String,
}

/// Signs remotely through the IAM Credentials `signBlob` RPC.
#[derive(Clone)]
pub struct IamSigner {
    client: Client,
    base_url: String,
    service_account: String,
    access_token: Secret<String>,
}

impl IamSigner {
    pub fn new(service_account: impl Into<String>, access_token: Secret<String>) -> Self {
        Self::with_base_url(DEFAULT_IAM_URL, service_account, access_token)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        service_account: impl Into<String>,
        access_token: Secret<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_account: service_account.into(),
            access_token,
        }
    }

    fn sign_blob_url(&self) -> String {
        format!(
            "{}/v1/projects/-/serviceAccounts/{}:signBlob",
            self.base_url, self.service_account
        )
    }
}

#[async_trait]
impl CryptoSigner for IamSigner {
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, AuthError> {
        let url = self.sign_blob_url();
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({ "payload": STANDARD.encode(payload) }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, "IAM signBlob response");

        if !status.is_success() {
            error!(status = %status, service_account = %self.service_account, "IAM signBlob failed");
            return Err(AuthError::internal(format!(
                "signBlob for {} failed with HTTP {}",
                self.service_account, status
            )));
        }

        let signed: SignBlobResponse = serde_json::from_str(&body)?;
        STANDARD
            .decode(signed.signed_blob)
            .map_err(|e| AuthError::internal(format!("signBlob returned invalid base64: {}", e)))
    }

    fn account_id(&self) -> &str {
        &self.service_account
    }
}
