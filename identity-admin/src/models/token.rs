use serde::Serialize;
use serde_json::{Map, Value};

/// Claims of a verified ID token or session cookie.
///
/// Produced per verification call and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedToken {
    /// Subject of the token (`sub`).
    pub uid: String,
    pub issuer: String,
    pub audience: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub auth_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_in_provider: Option<String>,
    /// Every claim not listed above, custom claims included.
    pub claims: Map<String, Value>,
}

impl DecodedToken {
    pub fn auth_time_millis(&self) -> i64 {
        self.auth_time * 1000
    }
}
