//! Account records as returned by the directory, and the public user shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::services::AuthError;

/// Provider link on a directory account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUserInfo {
    pub provider_id: String,
    pub raw_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Account entry in the directory's wire shape.
///
/// `valid_since` is epoch *seconds* encoded as a string, `created_at` and
/// `last_login_at` are epoch milliseconds encoded as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub local_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub provider_user_info: Vec<ProviderUserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_attributes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_since: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
}

impl AccountRecord {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            local_id: uid.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    pub fn with_provider(
        mut self,
        provider_id: impl Into<String>,
        provider_uid: impl Into<String>,
    ) -> Self {
        self.provider_user_info.push(ProviderUserInfo {
            provider_id: provider_id.into(),
            raw_id: provider_uid.into(),
            ..Default::default()
        });
        self
    }

    /// Set the revocation cutoff from an epoch-seconds value.
    pub fn with_valid_since_seconds(mut self, seconds: i64) -> Self {
        self.valid_since = Some(seconds.to_string());
        self
    }

    pub fn has_provider(&self, provider_id: &str, provider_uid: &str) -> bool {
        self.provider_user_info
            .iter()
            .any(|p| p.provider_id == provider_id && p.raw_id == provider_uid)
    }

    /// Revocation cutoff in milliseconds.
    pub fn tokens_valid_after_time_millis(&self) -> Result<Option<i64>, AuthError> {
        parse_epoch(self.valid_since.as_deref(), "validSince")
            .map(|secs| secs.map(|s| s * 1000))
    }
}

fn parse_epoch(raw: Option<&str>, field: &str) -> Result<Option<i64>, AuthError> {
    raw.map(|value| {
        value.trim().parse::<i64>().map_err(|_| {
            AuthError::internal(format!(
                "Directory returned a non-numeric {}: {:?}",
                field, value
            ))
        })
    })
    .transpose()
}

/// Provider-specific view of a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub uid: String,
    pub provider_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time_millis: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sign_in_time_millis: Option<i64>,
}

/// Public user record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub disabled: bool,
    pub provider_data: Vec<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_claims: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_valid_after_time_millis: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub metadata: UserMetadata,
}

impl TryFrom<AccountRecord> for UserRecord {
    type Error = AuthError;

    fn try_from(account: AccountRecord) -> Result<Self, Self::Error> {
        if account.local_id.is_empty() {
            return Err(AuthError::internal(
                "Directory returned an account without a localId",
            ));
        }

        let tokens_valid_after_time_millis = account.tokens_valid_after_time_millis()?;

        let custom_claims = match account.custom_attributes.as_deref() {
            None | Some("") => None,
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Some(map),
                _ => {
                    return Err(AuthError::internal(format!(
                        "Directory returned malformed customAttributes for {}",
                        account.local_id
                    )))
                }
            },
        };

        let metadata = UserMetadata {
            creation_time_millis: parse_epoch(account.created_at.as_deref(), "createdAt")?,
            last_sign_in_time_millis: parse_epoch(
                account.last_login_at.as_deref(),
                "lastLoginAt",
            )?,
        };

        let provider_data = account
            .provider_user_info
            .into_iter()
            .map(|p| UserInfo {
                uid: p.raw_id,
                provider_id: p.provider_id,
                email: p.email,
                display_name: p.display_name,
                phone_number: p.phone_number,
            })
            .collect();

        Ok(UserRecord {
            uid: account.local_id,
            email: account.email,
            email_verified: account.email_verified,
            display_name: account.display_name,
            photo_url: account.photo_url,
            phone_number: account.phone_number,
            disabled: account.disabled,
            provider_data,
            custom_claims,
            tokens_valid_after_time_millis,
            tenant_id: account.tenant_id,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_since_is_converted_to_millis() -> Result<(), AuthError> {
        let account = AccountRecord::new("u1").with_valid_since_seconds(1_700_000_000);
        assert_eq!(
            account.tokens_valid_after_time_millis()?,
            Some(1_700_000_000_000)
        );
        assert_eq!(AccountRecord::new("u2").tokens_valid_after_time_millis()?, None);
        Ok(())
    }

    #[test]
    fn deserializes_wire_shape() -> Result<(), serde_json::Error> {
        let account: AccountRecord = serde_json::from_value(serde_json::json!({
            "localId": "abc",
            "email": "a@example.com",
            "providerUserInfo": [{ "providerId": "google.com", "rawId": "g-1" }],
            "customAttributes": "{\"admin\":true}",
            "validSince": "1700000000"
        }))?;

        assert!(account.has_provider("google.com", "g-1"));
        assert!(!account.has_provider("google.com", "g-2"));
        assert!(!account.has_provider("facebook.com", "g-1"));
        Ok(())
    }

    #[test]
    fn converts_to_user_record() -> Result<(), AuthError> {
        let mut account = AccountRecord::new("abc")
            .with_email("a@example.com")
            .with_provider("google.com", "g-1")
            .with_valid_since_seconds(10);
        account.custom_attributes = Some("{\"admin\":true}".to_string());
        account.created_at = Some("1600000000000".to_string());

        let user = UserRecord::try_from(account)?;
        assert_eq!(user.uid, "abc");
        assert_eq!(user.tokens_valid_after_time_millis, Some(10_000));
        assert_eq!(user.provider_data[0].uid, "g-1");
        assert_eq!(user.metadata.creation_time_millis, Some(1_600_000_000_000));
        assert_eq!(
            user.custom_claims.and_then(|c| c.get("admin").cloned()),
            Some(Value::Bool(true))
        );
        Ok(())
    }

    #[test]
    fn corrupt_fields_are_internal_errors() {
        let mut account = AccountRecord::new("abc");
        account.valid_since = Some("yesterday".to_string());
        assert!(matches!(
            UserRecord::try_from(account),
            Err(AuthError::Internal(_))
        ));

        let mut account = AccountRecord::new("abc");
        account.custom_attributes = Some("[1,2]".to_string());
        assert!(matches!(
            UserRecord::try_from(account),
            Err(AuthError::Internal(_))
        ));

        assert!(matches!(
            UserRecord::try_from(AccountRecord::default()),
            Err(AuthError::Internal(_))
        ));
    }
}
