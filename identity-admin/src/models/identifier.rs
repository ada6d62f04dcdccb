/// One way of addressing an account in a batch lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserIdentifier {
    Uid(String),
    Email(String),
    /// E.164 phone number.
    Phone(String),
    ProviderLink {
        provider_id: String,
        provider_uid: String,
    },
}

impl UserIdentifier {
    pub fn uid(uid: impl Into<String>) -> Self {
        UserIdentifier::Uid(uid.into())
    }

    pub fn email(email: impl Into<String>) -> Self {
        UserIdentifier::Email(email.into())
    }

    pub fn phone(phone_number: impl Into<String>) -> Self {
        UserIdentifier::Phone(phone_number.into())
    }

    pub fn provider(provider_id: impl Into<String>, provider_uid: impl Into<String>) -> Self {
        UserIdentifier::ProviderLink {
            provider_id: provider_id.into(),
            provider_uid: provider_uid.into(),
        }
    }
}
