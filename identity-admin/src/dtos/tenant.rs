use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{MultiFactorServerConfig, Tenant};

/// Tenant create/update request in the directory's wire shape.
///
/// Absent options are omitted entirely; an empty `test_phone_numbers` map
/// clears the numbers stored on the tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantServerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_password_signup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_email_link_signin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_config: Option<MultiFactorServerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_phone_numbers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTenantsResult {
    pub tenants: Vec<Tenant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}
