//! Wallet Error Types
//!
//! One taxonomy for the funds engine, the account security machine and the
//! stores behind them. The gateway maps each kind to an HTTP status and a
//! stable string code.

use thiserror::Error;

/// Wallet error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    // === Validation Errors ===
    #[error("Amount must be positive with at most two decimals")]
    InvalidAmount,

    #[error("Cannot transfer to the same account")]
    SelfTransfer,

    #[error("Invalid phone number format")]
    InvalidPhone,

    #[error("Password must be exactly 8 characters")]
    WeakPassword,

    #[error("All fields are required")]
    RequiredFields,

    // === Balance Errors ===
    /// Engine-level rejection: the sender cannot cover the amount.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Repository-level rejection from the advisory read before a debit.
    #[error("Insufficient balance")]
    InsufficientBalance,

    // === Lookup Errors ===
    #[error("Account not found")]
    AccountNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    // === Security Errors ===
    #[error("User already exists")]
    UserExists,

    #[error("User is blocked")]
    UserBlocked,

    #[error("Wrong password")]
    WrongPassword,

    #[error("code expired or not found")]
    CodeExpired,

    #[error("invalid code")]
    InvalidCode,

    #[error("User not authenticated")]
    Unauthorized,

    // === System Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidAmount => "INVALID_AMOUNT",
            WalletError::SelfTransfer => "SELF_TRANSFER",
            WalletError::InvalidPhone => "INVALID_PHONE",
            WalletError::WeakPassword => "WEAK_PASSWORD",
            WalletError::RequiredFields => "REQUIRED_FIELDS",
            WalletError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            WalletError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            WalletError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            WalletError::UserNotFound => "USER_NOT_FOUND",
            WalletError::ServiceNotFound(_) => "SERVICE_NOT_FOUND",
            WalletError::UserExists => "USER_EXISTS",
            WalletError::UserBlocked => "USER_BLOCKED",
            WalletError::WrongPassword => "WRONG_PASSWORD",
            WalletError::CodeExpired => "CODE_EXPIRED",
            WalletError::InvalidCode => "INVALID_CODE",
            WalletError::Unauthorized => "UNAUTHORIZED",
            WalletError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            WalletError::InvalidAmount
            | WalletError::SelfTransfer
            | WalletError::InvalidPhone
            | WalletError::WeakPassword
            | WalletError::RequiredFields
            | WalletError::CodeExpired
            | WalletError::InvalidCode => 400,
            WalletError::WrongPassword | WalletError::Unauthorized => 401,
            WalletError::UserBlocked => 403,
            WalletError::AccountNotFound
            | WalletError::UserNotFound
            | WalletError::ServiceNotFound(_) => 404,
            WalletError::UserExists => 409,
            WalletError::InsufficientFunds | WalletError::InsufficientBalance => 422,
            WalletError::Internal(_) => 500,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        WalletError::Internal(msg.into())
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::Internal(e.to_string())
    }
}

/// True when the driver reports a unique-constraint violation.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
