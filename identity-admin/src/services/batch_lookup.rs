//! Resolution of multi-identifier lookups into found / not-found partitions.

use crate::dtos::GetUsersResult;
use crate::models::{AccountRecord, UserIdentifier, UserRecord};
use crate::services::AuthError;
use crate::utils::validation::{
    validate_email, validate_phone_number, validate_provider_link, validate_uid,
};

pub const MAX_GET_ACCOUNTS_BATCH_SIZE: usize = 100;

/// Runs before the lookup round trip.
pub fn validate_identifiers(identifiers: &[UserIdentifier]) -> Result<(), AuthError> {
    if identifiers.len() > MAX_GET_ACCOUNTS_BATCH_SIZE {
        return Err(AuthError::invalid_argument(format!(
            "`identifiers` parameter must have <= {} entries",
            MAX_GET_ACCOUNTS_BATCH_SIZE
        )));
    }

    for identifier in identifiers {
        match identifier {
            UserIdentifier::Uid(uid) => validate_uid(uid)?,
            UserIdentifier::Email(email) => validate_email(email)?,
            UserIdentifier::Phone(phone_number) => validate_phone_number(phone_number)?,
            UserIdentifier::ProviderLink {
                provider_id,
                provider_uid,
            } => validate_provider_link(provider_id, provider_uid)?,
        }
    }

    Ok(())
}

pub fn identifier_matches(identifier: &UserIdentifier, account: &AccountRecord) -> bool {
    match identifier {
        UserIdentifier::Uid(uid) => account.local_id == *uid,
        UserIdentifier::Email(email) => account.email.as_deref() == Some(email.as_str()),
        UserIdentifier::Phone(phone_number) => {
            account.phone_number.as_deref() == Some(phone_number.as_str())
        }
        UserIdentifier::ProviderLink {
            provider_id,
            provider_uid,
        } => account.has_provider(provider_id, provider_uid),
    }
}

/// `users` is every returned account, unfiltered and in directory order;
/// `not_found` is the requested identifiers no account satisfies.
pub fn resolve(
    identifiers: &[UserIdentifier],
    accounts: Vec<AccountRecord>,
) -> Result<GetUsersResult, AuthError> {
    let not_found = identifiers
        .iter()
        .filter(|identifier| !accounts.iter().any(|a| identifier_matches(identifier, a)))
        .cloned()
        .collect();

    let users = accounts
        .into_iter()
        .map(UserRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GetUsersResult { users, not_found })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_found_and_not_found() -> Result<(), AuthError> {
        let identifiers = vec![
            UserIdentifier::uid("a"),
            UserIdentifier::email("b@x.com"),
            UserIdentifier::phone("+15551234"),
        ];
        let accounts = vec![
            AccountRecord::new("other").with_email("b@x.com"),
            AccountRecord::new("a"),
        ];

        let result = resolve(&identifiers, accounts)?;
        let mut uids: Vec<_> = result.users.iter().map(|u| u.uid.as_str()).collect();
        uids.sort();
        assert_eq!(uids, vec!["a", "other"]);
        assert_eq!(result.not_found, vec![UserIdentifier::phone("+15551234")]);
        Ok(())
    }

    #[test]
    fn provider_link_needs_both_id_and_uid() -> Result<(), AuthError> {
        let account = AccountRecord::new("a").with_provider("google.com", "g-1");
        assert!(identifier_matches(
            &UserIdentifier::provider("google.com", "g-1"),
            &account
        ));
        assert!(!identifier_matches(
            &UserIdentifier::provider("google.com", "g-2"),
            &account
        ));
        assert!(!identifier_matches(
            &UserIdentifier::provider("facebook.com", "g-1"),
            &account
        ));

        let result = resolve(
            &[UserIdentifier::provider("facebook.com", "g-1")],
            vec![account],
        )?;
        assert_eq!(result.users.len(), 1);
        assert_eq!(result.not_found.len(), 1);
        Ok(())
    }

    #[test]
    fn empty_request_resolves_to_empty_result() -> Result<(), AuthError> {
        let result = resolve(&[], Vec::new())?;
        assert!(result.users.is_empty());
        assert!(result.not_found.is_empty());
        Ok(())
    }

    #[test]
    fn batch_size_and_entries_are_validated() {
        let identifiers: Vec<_> = (0..101).map(|i| UserIdentifier::uid(format!("u{}", i))).collect();
        assert!(matches!(
            validate_identifiers(&identifiers),
            Err(AuthError::InvalidArgument(_))
        ));
        assert!(validate_identifiers(&identifiers[..100]).is_ok());

        assert!(matches!(
            validate_identifiers(&[UserIdentifier::email("nope")]),
            Err(AuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            validate_identifiers(&[UserIdentifier::phone("5551234")]),
            Err(AuthError::InvalidPhoneNumber(_))
        ));
        assert!(matches!(
            validate_identifiers(&[UserIdentifier::provider("google.com", "")]),
            Err(AuthError::InvalidProviderUid(_))
        ));
    }
}
