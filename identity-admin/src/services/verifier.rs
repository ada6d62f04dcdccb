//! Local verification of ID tokens and session cookies.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;

use crate::models::DecodedToken;
use crate::services::AuthError;
use crate::utils::validation::MAX_UID_LENGTH;

const ID_TOKEN_ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const SESSION_COOKIE_ISSUER_PREFIX: &str = "https://session.firebase.google.com/";

/// Which bearer credential a verifier handles. Selects the issuer and the
/// error kinds reported for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    IdToken,
    SessionCookie,
}

impl TokenKind {
    pub fn issuer(&self, project_id: &str) -> String {
        match self {
            TokenKind::IdToken => format!("{}{}", ID_TOKEN_ISSUER_PREFIX, project_id),
            TokenKind::SessionCookie => format!("{}{}", SESSION_COOKIE_ISSUER_PREFIX, project_id),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TokenKind::IdToken => "ID token",
            TokenKind::SessionCookie => "session cookie",
        }
    }

    pub fn invalid(&self, message: impl Into<String>) -> AuthError {
        match self {
            TokenKind::IdToken => AuthError::InvalidIdToken(message.into()),
            TokenKind::SessionCookie => AuthError::InvalidSessionCookie(message.into()),
        }
    }

    pub fn expired(&self, message: impl Into<String>) -> AuthError {
        match self {
            TokenKind::IdToken => AuthError::IdTokenExpired(message.into()),
            TokenKind::SessionCookie => AuthError::SessionCookieExpired(message.into()),
        }
    }

    pub fn revoked(&self) -> AuthError {
        match self {
            TokenKind::IdToken => AuthError::IdTokenRevoked,
            TokenKind::SessionCookie => AuthError::SessionCookieRevoked,
        }
    }
}

/// Decodes a bearer token and checks its signature and standard claims.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<DecodedToken, AuthError>;

    fn kind(&self) -> TokenKind;
}

#[derive(Debug, Default, Deserialize)]
struct FirebaseClaims {
    #[serde(default)]
    tenant: Option<String>,
    #[serde(default)]
    sign_in_provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    iss: String,
    aud: String,
    iat: i64,
    exp: i64,
    #[serde(default)]
    auth_time: Option<i64>,
    #[serde(default)]
    firebase: FirebaseClaims,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// RS256 verifier over a fixed `kid -> public key` set.
pub struct JwtTokenVerifier {
    kind: TokenKind,
    project_id: String,
    issuer: String,
    keys: HashMap<String, DecodingKey>,
}

impl JwtTokenVerifier {
    pub fn new(
        kind: TokenKind,
        project_id: impl Into<String>,
        keys: HashMap<String, DecodingKey>,
    ) -> Result<Self, AuthError> {
        let project_id = project_id.into();
        if project_id.is_empty() {
            return Err(AuthError::invalid_argument(format!(
                "A project ID is required to verify {}s",
                kind.label()
            )));
        }

        Ok(Self {
            kind,
            issuer: kind.issuer(&project_id),
            project_id,
            keys,
        })
    }

    pub fn from_pem_map(
        kind: TokenKind,
        project_id: impl Into<String>,
        pems: &HashMap<String, String>,
    ) -> Result<Self, AuthError> {
        let keys = pems
            .iter()
            .map(|(kid, pem)| {
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map(|key| (kid.clone(), key))
                    .map_err(|e| {
                        AuthError::internal(format!("Failed to parse public key {}: {}", kid, e))
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Self::new(kind, project_id, keys)
    }

    /// Load keys from a JSON object mapping key ids to PEM public keys.
    pub fn from_key_file(
        kind: TokenKind,
        project_id: impl Into<String>,
        path: &str,
    ) -> Result<Self, AuthError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AuthError::internal(format!("Failed to read public keys from {}: {}", path, e))
        })?;
        let pems: HashMap<String, String> = serde_json::from_str(&raw)?;
        Self::from_pem_map(kind, project_id, &pems)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);
        validation
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify(&self, token: &str) -> Result<DecodedToken, AuthError> {
        let label = self.kind.label();
        if token.is_empty() {
            return Err(self.kind.invalid(format!("{} must be a non-empty string", label)));
        }

        let header = decode_header(token)
            .map_err(|e| self.kind.invalid(format!("Malformed {}: {}", label, e)))?;
        if header.alg != Algorithm::RS256 {
            return Err(self.kind.invalid(format!(
                "{} has algorithm {:?}, expected RS256",
                label, header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| self.kind.invalid(format!("{} has no \"kid\" claim", label)))?;
        let key = self.keys.get(&kid).ok_or_else(|| {
            self.kind
                .invalid(format!("{} has \"kid\" claim which does not correspond to a known public key", label))
        })?;

        let claims = decode::<TokenClaims>(token, key, &self.validation())
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => {
                    self.kind.expired(format!("{} has expired", label))
                }
                _ => self.kind.invalid(format!("{} failed verification: {}", label, e)),
            })?
            .claims;

        if claims.sub.is_empty() || claims.sub.chars().count() > MAX_UID_LENGTH {
            return Err(self.kind.invalid(format!(
                "{} has a \"sub\" claim that is empty or longer than {} characters",
                label, MAX_UID_LENGTH
            )));
        }
        if claims.iat > Utc::now().timestamp() + 60 {
            return Err(self.kind.invalid(format!("{} was issued in the future", label)));
        }
        let auth_time = claims
            .auth_time
            .ok_or_else(|| self.kind.invalid(format!("{} has no \"auth_time\" claim", label)))?;

        Ok(DecodedToken {
            uid: claims.sub,
            issuer: claims.iss,
            audience: claims.aud,
            issued_at: claims.iat,
            expires_at: claims.exp,
            auth_time,
            tenant_id: claims.firebase.tenant,
            sign_in_provider: claims.firebase.sign_in_provider,
            claims: claims.extra,
        })
    }

    fn kind(&self) -> TokenKind {
        self.kind
    }
}
