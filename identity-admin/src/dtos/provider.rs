use serde::Serialize;

use crate::models::{ProviderConfig, ProviderType};

/// Filter for listing provider configurations. The type is mandatory.
#[derive(Debug, Clone)]
pub struct AuthProviderConfigFilter {
    pub provider_type: ProviderType,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

impl AuthProviderConfigFilter {
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            max_results: None,
            page_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProviderConfigResult {
    pub provider_configs: Vec<ProviderConfig>,
    /// Absent when the directory reports no further page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}
