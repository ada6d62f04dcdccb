//! Services layer for identity administration.
//!
//! Token minting and verification, tenant enforcement, batch post-processing
//! and the account directory collaborator the façades delegate to.

pub mod batch_delete;
pub mod batch_lookup;
pub mod directory;
pub mod error;
pub mod phone_numbers;
pub mod provider_dispatch;
pub mod revocation;
pub mod signer;
pub mod tenant_isolation;
pub mod tenant_options;
pub mod token_generator;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use directory::{AccountDirectory, HttpAccountDirectory, MockDirectory};
pub use error::{AuthError, ErrorKind};
pub use phone_numbers::validate_test_phone_numbers;
pub use provider_dispatch::ProviderConfigDispatcher;
pub use revocation::{RevocationCheckedVerifier, TokenVerification};
pub use signer::{CryptoSigner, IamSigner, ServiceAccountSigner};
pub use tenant_isolation::{
    DirectorySessionCookieIssuer, SessionCookieIssuer, TenantScopedCookieIssuer,
    TenantScopedVerifier,
};
pub use tenant_options::{EmailSignInTranslator, MultiFactorTranslator, TenantOptionsValidator};
pub use token_generator::TokenGenerator;
pub use verifier::{JwtTokenVerifier, TokenKind, TokenVerifier};
