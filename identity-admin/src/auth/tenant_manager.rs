use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::{AuthComponents, TenantAwareAuth};
use crate::config::AdminConfig;
use crate::dtos::ListTenantsResult;
use crate::models::{Tenant, TenantContext};
use crate::services::directory::{AccountDirectory, MAX_LIST_TENANTS_RESULTS};
use crate::services::{AuthError, TenantOptionsValidator};
use crate::utils::validation::validate_page_token;

fn validate_tenant_id(tenant_id: &str) -> Result<(), AuthError> {
    if tenant_id.is_empty() {
        return Err(AuthError::InvalidTenantId(
            "Tenant ID must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

/// Tenant CRUD plus construction of tenant-bound façades.
#[derive(Clone)]
pub struct TenantManager {
    components: AuthComponents,
    directory: Arc<dyn AccountDirectory>,
}

impl TenantManager {
    pub fn new(components: AuthComponents) -> Self {
        let directory = Arc::clone(&components.directory);
        Self {
            components,
            directory,
        }
    }

    pub fn from_config(config: &AdminConfig) -> Result<Self, AuthError> {
        Ok(Self::new(AuthComponents::from_config(config)?))
    }

    /// No directory round trip; an unknown tenant surfaces on first use.
    pub fn auth_for_tenant(&self, tenant_id: &str) -> Result<TenantAwareAuth, AuthError> {
        let tenant = TenantContext::new(tenant_id)?;
        Ok(TenantAwareAuth::new(&self.components, tenant))
    }

    pub async fn get_tenant(&self, tenant_id: &str) -> Result<Tenant, AuthError> {
        validate_tenant_id(tenant_id)?;
        let response = self.directory.get_tenant(tenant_id).await?;
        Tenant::try_from(response)
    }

    pub async fn list_tenants(
        &self,
        max_results: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<ListTenantsResult, AuthError> {
        let max_results = max_results.unwrap_or(MAX_LIST_TENANTS_RESULTS);
        if max_results == 0 || max_results > MAX_LIST_TENANTS_RESULTS {
            return Err(AuthError::invalid_argument(format!(
                "maxResults must be between 1 and {}",
                MAX_LIST_TENANTS_RESULTS
            )));
        }
        validate_page_token(page_token)?;

        let page = self.directory.list_tenants(max_results, page_token).await?;
        let tenants = page
            .tenants
            .into_iter()
            .map(Tenant::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListTenantsResult {
            tenants,
            page_token: page.next_page_token,
        })
    }

    pub async fn create_tenant(&self, options: &Value) -> Result<Tenant, AuthError> {
        let request = TenantOptionsValidator::build_server_request(options, true)?;
        let response = self.directory.create_tenant(&request).await?;
        let tenant = Tenant::try_from(response)?;
        info!(tenant_id = %tenant.tenant_id, "Tenant created");
        Ok(tenant)
    }

    pub async fn update_tenant(&self, tenant_id: &str, options: &Value) -> Result<Tenant, AuthError> {
        validate_tenant_id(tenant_id)?;
        let request = TenantOptionsValidator::build_server_request(options, false)?;
        let response = self.directory.update_tenant(tenant_id, &request).await?;
        let tenant = Tenant::try_from(response)?;
        info!(tenant_id = %tenant.tenant_id, "Tenant updated");
        Ok(tenant)
    }

    pub async fn delete_tenant(&self, tenant_id: &str) -> Result<(), AuthError> {
        validate_tenant_id(tenant_id)?;
        self.directory.delete_tenant(tenant_id).await?;
        info!(tenant_id, "Tenant deleted");
        Ok(())
    }
}
