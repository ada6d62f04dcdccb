//! Shared fixtures for the identity-admin integration tests.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use identity_admin::services::{
    JwtTokenVerifier, MockDirectory, ServiceAccountSigner, TokenKind,
};
use identity_admin::{Auth, AuthComponents, TenantManager};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const PROJECT_ID: &str = "demo-project";
pub const KEY_ID: &str = "integration-key";
pub const SERVICE_ACCOUNT: &str = "admin@demo-project.iam.gserviceaccount.com";

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_private_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/test_public_key.pem");
pub const OTHER_PRIVATE_KEY: &str = include_str!("../fixtures/other_private_key.pem");

pub fn now_seconds() -> i64 {
    Utc::now().timestamp()
}

pub fn public_key_map() -> HashMap<String, String> {
    HashMap::from([(KEY_ID.to_string(), TEST_PUBLIC_KEY.to_string())])
}

/// Components over `directory`, signing locally with the test key.
pub fn components(directory: &MockDirectory) -> AuthComponents {
    let pems = public_key_map();
    AuthComponents {
        project_id: PROJECT_ID.to_string(),
        directory: Arc::new(directory.clone()),
        signer: Arc::new(
            ServiceAccountSigner::from_pem(SERVICE_ACCOUNT, TEST_PRIVATE_KEY)
                .expect("test signer should build"),
        ),
        id_token_verifier: Arc::new(
            JwtTokenVerifier::from_pem_map(TokenKind::IdToken, PROJECT_ID, &pems)
                .expect("id token verifier should build"),
        ),
        session_cookie_verifier: Arc::new(
            JwtTokenVerifier::from_pem_map(TokenKind::SessionCookie, PROJECT_ID, &pems)
                .expect("session cookie verifier should build"),
        ),
        custom_token_lifetime: Duration::minutes(60),
    }
}

pub fn auth(directory: &MockDirectory) -> Auth {
    Auth::new(&components(directory))
}

pub fn tenant_manager(directory: &MockDirectory) -> TenantManager {
    TenantManager::new(components(directory))
}

/// Sign `claims` with the test key under `KEY_ID`.
pub fn sign(claims: &Value) -> String {
    sign_with(claims, TEST_PRIVATE_KEY, KEY_ID)
}

pub fn sign_with(claims: &Value, private_key_pem: &str, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .expect("test private key should parse");
    encode(&header, claims, &key).expect("test token should encode")
}

fn claims(kind: TokenKind, uid: &str, auth_time: i64, tenant: Option<&str>) -> Value {
    let now = now_seconds();
    let mut firebase = json!({ "sign_in_provider": "password" });
    if let Some(tenant) = tenant {
        firebase["tenant"] = json!(tenant);
    }
    json!({
        "iss": kind.issuer(PROJECT_ID),
        "aud": PROJECT_ID,
        "sub": uid,
        "iat": now - 10,
        "exp": now + 3600,
        "auth_time": auth_time,
        "firebase": firebase,
    })
}

pub fn id_token(uid: &str, auth_time: i64, tenant: Option<&str>) -> String {
    sign(&claims(TokenKind::IdToken, uid, auth_time, tenant))
}

pub fn session_cookie(uid: &str, auth_time: i64, tenant: Option<&str>) -> String {
    sign(&claims(TokenKind::SessionCookie, uid, auth_time, tenant))
}

/// Claims of an ID token, for tests that tamper with them before signing.
pub fn id_token_claims(uid: &str, auth_time: i64, tenant: Option<&str>) -> Value {
    claims(TokenKind::IdToken, uid, auth_time, tenant)
}
