//! Aggregation of per-index batch errors into success/failure counts.

use std::collections::HashSet;
use tracing::error;

use crate::dtos::{BatchResult, IndexedError};
use crate::services::directory::BatchErrorInfo;
use crate::services::AuthError;
use crate::utils::validation::validate_uid;

pub const MAX_DELETE_ACCOUNTS_BATCH_SIZE: usize = 1000;
pub const MAX_IMPORT_ACCOUNTS_BATCH_SIZE: usize = 1000;

const NOT_DISABLED_PREFIX: &str = "NOT_DISABLED";

pub fn validate_delete_request(uids: &[String]) -> Result<(), AuthError> {
    if uids.is_empty() || uids.len() > MAX_DELETE_ACCOUNTS_BATCH_SIZE {
        return Err(AuthError::invalid_argument(format!(
            "`uids` parameter must have between 1 and {} entries",
            MAX_DELETE_ACCOUNTS_BATCH_SIZE
        )));
    }
    uids.iter().try_for_each(|uid| validate_uid(uid))
}

/// Deletes are always forced, so the backend should never answer
/// `NOT_DISABLED`. Matching on the message prefix is fragile and stays
/// confined to this function.
pub fn translate_delete_error(message: &str) -> AuthError {
    if message.starts_with(NOT_DISABLED_PREFIX) {
        AuthError::UserNotDisabled(
            "Deleting an enabled user requires the force flag".to_string(),
        )
    } else {
        AuthError::internal(message)
    }
}

fn aggregate_with<F>(
    operation: &str,
    requested: usize,
    errors: Vec<BatchErrorInfo>,
    translate: F,
) -> Result<BatchResult, AuthError>
where
    F: Fn(&str) -> AuthError,
{
    let mut indexed = Vec::with_capacity(errors.len());
    let mut seen = HashSet::with_capacity(errors.len());
    for info in errors {
        let index = match info.index {
            Some(index) if index < requested => index,
            _ => {
                error!(
                    operation,
                    index = ?info.index,
                    requested,
                    "Directory returned a batch error without a usable index"
                );
                return Err(AuthError::internal(format!(
                    "{} response carried an error with a missing or out-of-range index",
                    operation
                )));
            }
        };
        if !seen.insert(index) {
            error!(
                operation,
                index, requested, "Directory reported more than one error for a batch index"
            );
            return Err(AuthError::internal(format!(
                "{} response carried a duplicate error index {}",
                operation, index
            )));
        }
        let message = info.message.unwrap_or_default();
        indexed.push(IndexedError {
            index,
            error: translate(&message),
        });
    }

    let failure_count = indexed.len();
    Ok(BatchResult {
        success_count: requested - failure_count,
        failure_count,
        errors: indexed,
    })
}

/// Absent uids count as deleted.
pub fn aggregate(requested: usize, errors: Vec<BatchErrorInfo>) -> Result<BatchResult, AuthError> {
    aggregate_with("batchDelete", requested, errors, translate_delete_error)
}

pub fn validate_import_request(count: usize) -> Result<(), AuthError> {
    if count == 0 || count > MAX_IMPORT_ACCOUNTS_BATCH_SIZE {
        return Err(AuthError::invalid_argument(format!(
            "Users to import must have between 1 and {} entries",
            MAX_IMPORT_ACCOUNTS_BATCH_SIZE
        )));
    }
    Ok(())
}

pub fn aggregate_import(
    requested: usize,
    errors: Vec<BatchErrorInfo>,
) -> Result<BatchResult, AuthError> {
    aggregate_with("batchCreate", requested, errors, |message| {
        AuthError::InvalidUserImport(message.to_string())
    })
}
