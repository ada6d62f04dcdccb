//! Domain models for identity administration.

mod account;
mod identifier;
mod provider;
mod tenant;
mod token;

pub use account::{AccountRecord, ProviderUserInfo, UserInfo, UserMetadata, UserRecord};
pub use identifier::UserIdentifier;
pub use provider::{
    OidcProviderConfig, ProviderConfig, ProviderId, ProviderType, SamlProviderConfig,
};
pub use tenant::{
    EmailSignInConfig, MultiFactorConfig, MultiFactorServerConfig, MultiFactorState, Tenant,
    TenantContext, TenantResponse,
};
pub use token::DecodedToken;
