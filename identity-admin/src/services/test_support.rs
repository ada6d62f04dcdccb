//! RSA fixtures and token helpers shared by unit tests.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value;

pub const TEST_KEY_ID: &str = "test-key-1";
pub const TEST_PROJECT_ID: &str = "demo-project";

pub const TEST_PRIVATE_KEY: &str = include_str!("../../tests/fixtures/test_private_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/test_public_key.pem");

/// Key the verifiers do not know about.
pub const OTHER_PRIVATE_KEY: &str = include_str!("../../tests/fixtures/other_private_key.pem");

pub fn now_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Sign `claims` as an RS256 JWT with the given `kid`.
pub fn mint_token(claims: &Value, private_key_pem: &str, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .expect("test private key should parse");
    encode(&header, claims, &key).expect("test token should encode")
}

/// Claims of a fresh ID token for `uid`, optionally tenant-bound.
pub fn id_token_claims(uid: &str, auth_time: i64, tenant: Option<&str>) -> Value {
    let now = now_seconds();
    let mut firebase = serde_json::json!({ "sign_in_provider": "password" });
    if let Some(tenant) = tenant {
        firebase["tenant"] = Value::String(tenant.to_string());
    }
    serde_json::json!({
        "iss": format!("https://securetoken.google.com/{}", TEST_PROJECT_ID),
        "aud": TEST_PROJECT_ID,
        "sub": uid,
        "iat": now - 10,
        "exp": now + 3600,
        "auth_time": auth_time,
        "firebase": firebase,
    })
}
