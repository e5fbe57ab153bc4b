use thiserror::Error;

use crate::account::types::AccountStatus;

/// Every failure a ledger operation can surface to a caller.
///
/// Validation and business-rule errors are raised synchronously before any
/// balance is touched, so a returned error always means "nothing happened".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("user not found")]
    UserNotFound,
    #[error("transaction not found")]
    TransactionNotFound,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is {0}")]
    AccountNotActive(AccountStatus),
    #[error("source and destination wallets must be different")]
    SameWallet,
    #[error("invalid amount")]
    InvalidAmount,
    #[error("insufficient funds in source wallet")]
    InsufficientFunds,
    #[error("insufficient capital balance")]
    InsufficientCapital,
    #[error("transaction already resolved")]
    AlreadyResolved,
    #[error("invalid investment duration")]
    InvalidDuration,
    #[error("invalid address format")]
    InvalidAddress,
    #[error("not authorized")]
    Unauthorized,
    #[error("auth error: {0}")]
    Auth(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<crate::storage::StorageError> for LedgerError {
    fn from(e: crate::storage::StorageError) -> Self {
        LedgerError::Storage(e.to_string())
    }
}
