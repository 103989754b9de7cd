//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules. All ids are
//! `BIGSERIAL` keys in the relational store, hence `i64`.

/// User ID - globally unique, immutable after assignment.
pub type UserId = i64;

/// Account ID - one account per user, never deleted.
pub type AccountId = i64;

/// Ledger entry ID
pub type EntryId = i64;

/// Service catalog ID
pub type ServiceId = i64;

/// Ledger type recorded for user-to-user transfers.
pub const TRANSFER_TYPE: &str = "transfer";

/// Ledger type recorded for external credits.
pub const DEPOSIT_TYPE: &str = "deposit";

/// Ledger type recorded for external debits.
pub const WITHDRAW_TYPE: &str = "withdraw";
