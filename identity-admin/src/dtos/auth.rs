use serde::{Deserialize, Serialize};
use validator::Validate;

/// Options for minting a session cookie.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookieOptions {
    /// Cookie lifetime in milliseconds.
    pub expires_in: Option<i64>,
}

impl SessionCookieOptions {
    pub fn expires_in_millis(millis: i64) -> Self {
        Self {
            expires_in: Some(millis),
        }
    }
}

/// Out-of-band email action requested from the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailActionType {
    PasswordReset,
    VerifyEmail,
    EmailSignin,
}

impl EmailActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailActionType::PasswordReset => "PASSWORD_RESET",
            EmailActionType::VerifyEmail => "VERIFY_EMAIL",
            EmailActionType::EmailSignin => "EMAIL_SIGNIN",
        }
    }
}

/// Continue-URL settings attached to an email action link.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActionCodeSettings {
    #[validate(url(message = "Continue URL must be a valid URL"))]
    pub url: String,
    #[serde(default)]
    pub handle_code_in_app: Option<bool>,
    #[serde(default)]
    pub dynamic_link_domain: Option<String>,
}
