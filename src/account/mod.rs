//! Account management module
//!
//! Domain models and input validation shared by the funds engine, the
//! account security machine and the stores.

pub mod models;
pub mod validation;

// Re-export commonly used types
pub use models::{
    Account, AccountBalance, HistoryEntry, IdentityDetails, LedgerEntry, LoginAttempt,
    NewLedgerEntry, Registration, Service, User, UserProfile,
};
pub use validation::{PhoneNumber, ValidationError, check_password_policy};
