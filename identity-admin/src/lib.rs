//! Identity administration core.
//!
//! Custom token minting, ID token and session cookie verification with
//! optional revocation checks, tenant isolation, batch account lookups and
//! deletes, provider configuration routing and tenant management.
//!
//! Hosts install logging with `identity_core::observability::logging::init_tracing`
//! and build an [`Auth`] or [`TenantManager`] from an [`AdminConfig`].

pub mod auth;
pub mod config;
pub mod dtos;
pub mod models;
pub mod services;
pub mod utils;

pub use auth::{Auth, AuthComponents, TenantAwareAuth, TenantManager};
pub use config::AdminConfig;
pub use services::{AuthError, ErrorKind};
