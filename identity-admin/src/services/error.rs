use identity_core::error::AppError;
use thiserror::Error;

/// Stable error classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    InternalError,
    MismatchingTenantId,
    IdTokenRevoked,
    SessionCookieRevoked,
    InvalidProviderId,
    InvalidConfig,
    InvalidSessionCookieDuration,
    UserNotDisabled,
    MaximumTestPhoneNumberExceeded,
    InvalidTestingPhoneNumber,
    InvalidIdToken,
    IdTokenExpired,
    InvalidSessionCookie,
    SessionCookieExpired,
    InvalidUid,
    InvalidEmail,
    InvalidPhoneNumber,
    InvalidProviderUid,
    InvalidTenantId,
    InvalidPageToken,
    InvalidUserImport,
    UserNotFound,
    TenantNotFound,
    ConfigurationNotFound,
    DirectoryError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::InternalError => "internal-error",
            ErrorKind::MismatchingTenantId => "mismatching-tenant-id",
            ErrorKind::IdTokenRevoked => "id-token-revoked",
            ErrorKind::SessionCookieRevoked => "session-cookie-revoked",
            ErrorKind::InvalidProviderId => "invalid-provider-id",
            ErrorKind::InvalidConfig => "invalid-config",
            ErrorKind::InvalidSessionCookieDuration => "invalid-session-cookie-duration",
            ErrorKind::UserNotDisabled => "user-not-disabled",
            ErrorKind::MaximumTestPhoneNumberExceeded => "test-phone-number-limit-exceeded",
            ErrorKind::InvalidTestingPhoneNumber => "invalid-testing-phone-number",
            ErrorKind::InvalidIdToken => "invalid-id-token",
            ErrorKind::IdTokenExpired => "id-token-expired",
            ErrorKind::InvalidSessionCookie => "invalid-session-cookie",
            ErrorKind::SessionCookieExpired => "session-cookie-expired",
            ErrorKind::InvalidUid => "invalid-uid",
            ErrorKind::InvalidEmail => "invalid-email",
            ErrorKind::InvalidPhoneNumber => "invalid-phone-number",
            ErrorKind::InvalidProviderUid => "invalid-provider-uid",
            ErrorKind::InvalidTenantId => "invalid-tenant-id",
            ErrorKind::InvalidPageToken => "invalid-page-token",
            ErrorKind::InvalidUserImport => "invalid-user-import",
            ErrorKind::UserNotFound => "user-not-found",
            ErrorKind::TenantNotFound => "tenant-not-found",
            ErrorKind::ConfigurationNotFound => "configuration-not-found",
            ErrorKind::DirectoryError => "directory-error",
        }
    }

    /// Client-facing code, e.g. `auth/id-token-revoked`.
    pub fn code(&self) -> String {
        format!("auth/{}", self.as_str())
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Tenant mismatch: {0}")]
    MismatchingTenantId(String),

    #[error("The ID token has been revoked")]
    IdTokenRevoked,

    #[error("The session cookie has been revoked")]
    SessionCookieRevoked,

    #[error("Invalid provider ID: {0}")]
    InvalidProviderId(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid session cookie duration: {0}")]
    InvalidSessionCookieDuration(String),

    #[error("User not disabled: {0}")]
    UserNotDisabled(String),

    #[error("Too many test phone numbers: {0}")]
    MaximumTestPhoneNumberExceeded(String),

    #[error("Invalid testing phone number: {0}")]
    InvalidTestingPhoneNumber(String),

    #[error("Invalid ID token: {0}")]
    InvalidIdToken(String),

    #[error("ID token expired: {0}")]
    IdTokenExpired(String),

    #[error("Invalid session cookie: {0}")]
    InvalidSessionCookie(String),

    #[error("Session cookie expired: {0}")]
    SessionCookieExpired(String),

    #[error("Invalid uid: {0}")]
    InvalidUid(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("Invalid provider uid: {0}")]
    InvalidProviderUid(String),

    #[error("Invalid tenant ID: {0}")]
    InvalidTenantId(String),

    #[error("Invalid page token: {0}")]
    InvalidPageToken(String),

    #[error("User import failed: {0}")]
    InvalidUserImport(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Provider configuration not found: {0}")]
    ConfigurationNotFound(String),

    #[error("Directory error {code}: {message}")]
    Directory { code: String, message: String },
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AuthError::Internal(_) => ErrorKind::InternalError,
            AuthError::MismatchingTenantId(_) => ErrorKind::MismatchingTenantId,
            AuthError::IdTokenRevoked => ErrorKind::IdTokenRevoked,
            AuthError::SessionCookieRevoked => ErrorKind::SessionCookieRevoked,
            AuthError::InvalidProviderId(_) => ErrorKind::InvalidProviderId,
            AuthError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            AuthError::InvalidSessionCookieDuration(_) => ErrorKind::InvalidSessionCookieDuration,
            AuthError::UserNotDisabled(_) => ErrorKind::UserNotDisabled,
            AuthError::MaximumTestPhoneNumberExceeded(_) => {
                ErrorKind::MaximumTestPhoneNumberExceeded
            }
            AuthError::InvalidTestingPhoneNumber(_) => ErrorKind::InvalidTestingPhoneNumber,
            AuthError::InvalidIdToken(_) => ErrorKind::InvalidIdToken,
            AuthError::IdTokenExpired(_) => ErrorKind::IdTokenExpired,
            AuthError::InvalidSessionCookie(_) => ErrorKind::InvalidSessionCookie,
            AuthError::SessionCookieExpired(_) => ErrorKind::SessionCookieExpired,
            AuthError::InvalidUid(_) => ErrorKind::InvalidUid,
            AuthError::InvalidEmail(_) => ErrorKind::InvalidEmail,
            AuthError::InvalidPhoneNumber(_) => ErrorKind::InvalidPhoneNumber,
            AuthError::InvalidProviderUid(_) => ErrorKind::InvalidProviderUid,
            AuthError::InvalidTenantId(_) => ErrorKind::InvalidTenantId,
            AuthError::InvalidPageToken(_) => ErrorKind::InvalidPageToken,
            AuthError::InvalidUserImport(_) => ErrorKind::InvalidUserImport,
            AuthError::UserNotFound(_) => ErrorKind::UserNotFound,
            AuthError::TenantNotFound(_) => ErrorKind::TenantNotFound,
            AuthError::ConfigurationNotFound(_) => ErrorKind::ConfigurationNotFound,
            AuthError::Directory { .. } => ErrorKind::DirectoryError,
        }
    }

    pub fn code(&self) -> String {
        self.kind().code()
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AuthError::Internal(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        AuthError::InvalidArgument(msg.into())
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Internal(format!("Transport error: {}", err))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Internal(format!("Serialization error: {}", err))
    }
}
