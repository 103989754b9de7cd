//! walletx - Custodial Wallet Backend
//!
//! Phone-keyed accounts, transactional transfers and service payments,
//! and an account-security state machine in front of them.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (UserId, AccountId, etc.)
//! - [`money`] - Amount validation (positive, two decimal places)
//! - [`error`] - `WalletError` taxonomy
//! - [`account`] - Accounts, users, ledger entries, phone validation
//! - [`store`] - Unit of work, repositories, in-process and PostgreSQL stores
//! - [`funding`] - Funds movement engine
//! - [`user_auth`] - Verification codes, registration, login lockout, JWT
//! - [`gateway`] - HTTP surface
//! - [`db`] - PostgreSQL pool and schema
//! - [`config`] / [`logging`] - Startup wiring

// Core types - must be first!
pub mod core_types;

pub mod clock;
pub mod error;
pub mod money;

// Domain
pub mod account;
pub mod funding;
pub mod store;
pub mod user_auth;

// Infrastructure
pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{AccountId, EntryId, ServiceId, UserId};
pub use error::WalletError;
pub use funding::FundsEngine;
pub use store::{MemoryStore, PgStore, Scope, TxRunner, UnitOfWork, WalletStore};
pub use user_auth::AccountSecurity;
