pub mod auth;
pub mod provider;
pub mod tenant;
pub mod user;

pub use auth::{ActionCodeSettings, EmailActionType, SessionCookieOptions};
pub use provider::{AuthProviderConfigFilter, ListProviderConfigResult};
pub use tenant::{ListTenantsResult, TenantServerRequest};
pub use user::{
    BatchResult, CreateRequest, DeleteUsersResult, GetUsersResult, IndexedError,
    ListUsersResult, UpdateRequest, UserImportOptions, UserImportRecord, UserImportResult,
};
