//! Ledger store: repository seams and the unit of work
//!
//! Every repository call receives a [`Scope`]. `Scope::Direct` runs the
//! statement straight on the store; `Scope::Unit` runs it inside an open
//! unit of work that commits or rolls back as a whole.
//!
//! Two implementations sit behind the same traits:
//! - [`PgStore`]: PostgreSQL through `sqlx`
//! - [`MemoryStore`]: in-process state for development mode and tests

pub mod memory;
pub mod postgres;
pub mod unit;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::account::{
    Account, HistoryEntry, IdentityDetails, LedgerEntry, LoginAttempt, NewLedgerEntry, Service,
    User,
};
use crate::core_types::{AccountId, UserId};
use crate::error::WalletError;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use unit::TxRunner;

// ============================================================================
// Scope
// ============================================================================

/// Where a repository call runs
#[derive(Debug)]
pub enum Scope<'a, U> {
    /// Directly on the store, one statement at a time
    Direct,
    /// Inside an open unit of work
    Unit(&'a mut U),
}

impl<U> Scope<'_, U> {
    /// The active unit, if any
    pub fn current_unit(&mut self) -> Option<&mut U> {
        match self {
            Scope::Direct => None,
            Scope::Unit(unit) => Some(&mut **unit),
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Scope::Unit(_))
    }

    /// Shorter-lived copy, so one scope can serve several statements
    pub fn reborrow(&mut self) -> Scope<'_, U> {
        match self {
            Scope::Direct => Scope::Direct,
            Scope::Unit(unit) => Scope::Unit(&mut **unit),
        }
    }
}

// ============================================================================
// Unit of work
// ============================================================================

/// Begin / commit / rollback of an atomic unit
///
/// Dropping a unit without committing it rolls it back.
#[async_trait]
pub trait UnitOfWork: Send + Sync + 'static {
    type Unit: Send + 'static;

    async fn begin(&self) -> Result<Self::Unit, WalletError>;
    async fn commit(&self, unit: Self::Unit) -> Result<(), WalletError>;
    async fn rollback(&self, unit: Self::Unit) -> Result<(), WalletError>;
}

// ============================================================================
// Repositories
// ============================================================================

/// Accounts and their balances
///
/// Balance mutations are guarded arithmetic updates, never read-modify-write.
#[async_trait]
pub trait AccountRepository: UnitOfWork {
    /// Create the user's account with zero balances.
    async fn create_account(
        &self,
        scope: Scope<'_, Self::Unit>,
        user_id: UserId,
    ) -> Result<Account, WalletError>;

    async fn get_by_id(
        &self,
        scope: Scope<'_, Self::Unit>,
        id: AccountId,
    ) -> Result<Account, WalletError>;

    async fn get_by_user_id(
        &self,
        scope: Scope<'_, Self::Unit>,
        user_id: UserId,
    ) -> Result<Account, WalletError>;

    async fn get_by_phone(
        &self,
        scope: Scope<'_, Self::Unit>,
        phone: &str,
    ) -> Result<Account, WalletError>;

    /// Advisory read (`AccountNotFound`, `InsufficientBalance`), then
    /// `balance = balance - amount WHERE id = ? AND balance >= amount`.
    /// Zero rows affected is `AccountNotFound`.
    async fn decrease_balance(
        &self,
        scope: Scope<'_, Self::Unit>,
        id: AccountId,
        amount: Decimal,
    ) -> Result<(), WalletError>;

    /// Unconditional `balance = balance + amount`; zero rows is `AccountNotFound`.
    async fn increase_balance(
        &self,
        scope: Scope<'_, Self::Unit>,
        id: AccountId,
        amount: Decimal,
    ) -> Result<(), WalletError>;

    /// Entries sourced from the account within `[start, end)`, newest first.
    async fn get_transactions(
        &self,
        scope: Scope<'_, Self::Unit>,
        id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, WalletError>;
}

/// Append-only ledger
#[async_trait]
pub trait LedgerRepository: UnitOfWork {
    async fn append(
        &self,
        scope: Scope<'_, Self::Unit>,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, WalletError>;
}

/// Users and the login-attempt counter
#[async_trait]
pub trait UserRepository: UnitOfWork {
    /// `UserExists` when the phone is taken.
    async fn create_user(
        &self,
        scope: Scope<'_, Self::Unit>,
        phone: &str,
    ) -> Result<User, WalletError>;

    async fn get_user_by_id(
        &self,
        scope: Scope<'_, Self::Unit>,
        id: UserId,
    ) -> Result<User, WalletError>;

    async fn get_user_by_phone(
        &self,
        scope: Scope<'_, Self::Unit>,
        phone: &str,
    ) -> Result<User, WalletError>;

    /// Store a password hash and reset the attempt counter.
    async fn update_password(
        &self,
        scope: Scope<'_, Self::Unit>,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), WalletError>;

    /// Store all identity fields and mark the user verified.
    async fn update_verification(
        &self,
        scope: Scope<'_, Self::Unit>,
        id: UserId,
        details: &IdentityDetails,
    ) -> Result<(), WalletError>;

    /// Single atomic increment-and-return; blocks the user once the new
    /// counter reaches `max_attempts`. An already blocked user is `UserBlocked`.
    async fn record_failed_attempt(
        &self,
        scope: Scope<'_, Self::Unit>,
        id: UserId,
        max_attempts: i32,
    ) -> Result<LoginAttempt, WalletError>;

    /// Reset the counter to zero unless the user is blocked (`UserBlocked`).
    async fn reset_attempts(
        &self,
        scope: Scope<'_, Self::Unit>,
        id: UserId,
    ) -> Result<(), WalletError>;
}

/// Payable services
#[async_trait]
pub trait ServiceCatalog: UnitOfWork {
    async fn create_service(
        &self,
        scope: Scope<'_, Self::Unit>,
        name: &str,
        description: &str,
        account_id: AccountId,
    ) -> Result<Service, WalletError>;

    async fn list_services(&self, scope: Scope<'_, Self::Unit>)
    -> Result<Vec<Service>, WalletError>;

    /// Holding account of the named service, `ServiceNotFound` otherwise.
    async fn lookup_service_account(
        &self,
        scope: Scope<'_, Self::Unit>,
        name: &str,
    ) -> Result<AccountId, WalletError>;
}

/// Everything the engine and the security machine need from a store
pub trait WalletStore: AccountRepository + LedgerRepository + UserRepository + ServiceCatalog {}

impl<T> WalletStore for T where
    T: AccountRepository + LedgerRepository + UserRepository + ServiceCatalog
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_current_unit() {
        let mut direct: Scope<'_, u32> = Scope::Direct;
        assert!(direct.current_unit().is_none());
        assert!(!direct.is_unit());

        let mut unit = 7u32;
        let mut scoped = Scope::Unit(&mut unit);
        assert!(scoped.is_unit());
        if let Some(u) = scoped.current_unit() {
            *u += 1;
        }
        assert_eq!(unit, 8);
    }
}
