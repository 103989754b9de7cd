//! In-process store for development mode and tests
//!
//! A unit of work holds the state mutex for its whole lifetime and stages
//! its changes on a copy of the state: commit swaps the copy in, rollback
//! or drop discards it. Direct calls lock per statement, so a debit's
//! advisory read and its conditional write can interleave with other tasks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{
    AccountRepository, LedgerRepository, Scope, ServiceCatalog, UnitOfWork, UserRepository,
};
use crate::account::{
    Account, HistoryEntry, IdentityDetails, LedgerEntry, LoginAttempt, NewLedgerEntry, Service,
    User,
};
use crate::clock::{Clock, SystemClock};
use crate::core_types::{AccountId, ServiceId, UserId};
use crate::error::WalletError;
use crate::money;

// ============================================================================
// State
// ============================================================================

/// Committed (or staged) contents of the store
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    users: BTreeMap<UserId, User>,
    accounts: BTreeMap<AccountId, Account>,
    ledger: Vec<LedgerEntry>,
    services: BTreeMap<ServiceId, Service>,
    last_user_id: i64,
    last_account_id: i64,
    last_entry_id: i64,
    last_service_id: i64,
}

impl MemoryState {
    pub fn ledger(&self) -> &[LedgerEntry] {
        &self.ledger
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn user_by_phone(&self, phone: &str) -> Option<&User> {
        self.users.values().find(|u| u.phone == phone)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn account_of_user(&self, user_id: UserId) -> Option<&Account> {
        self.accounts.values().find(|a| a.user_id == user_id)
    }

    fn phone_of_account(&self, id: AccountId) -> Option<String> {
        let account = self.accounts.get(&id)?;
        self.users.get(&account.user_id).map(|u| u.phone.clone())
    }
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

// ============================================================================
// Unit of work
// ============================================================================

/// Open unit: exclusive access to the state plus the staged copy
pub struct MemoryUnit {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

/// One-shot hooks for exercising rollback and race paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Next ledger append fails with `Internal`
    LedgerAppend,
    /// Next account creation fails with `Internal`
    AccountCreate,
    /// Next debit loses its funds to a competing writer after the balance read
    ConcurrentDebit,
}

pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    clock: Arc<dyn Clock>,
    fail_append: AtomicBool,
    fail_account_create: AtomicBool,
    race_debit: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            clock,
            fail_append: AtomicBool::new(false),
            fail_account_create: AtomicBool::new(false),
            race_debit: AtomicBool::new(false),
        }
    }

    /// Arm `point` for its next call.
    pub fn fail_next(&self, point: FailPoint) {
        self.flag(point).store(true, Ordering::SeqCst);
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    fn flag(&self, point: FailPoint) -> &AtomicBool {
        match point {
            FailPoint::LedgerAppend => &self.fail_append,
            FailPoint::AccountCreate => &self.fail_account_create,
            FailPoint::ConcurrentDebit => &self.race_debit,
        }
    }

    fn take_failure(&self, point: FailPoint) -> Result<(), WalletError> {
        if self.flag(point).swap(false, Ordering::SeqCst) {
            return Err(WalletError::internal(format!("injected failure: {point:?}")));
        }
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run one statement against the unit's staged state or the shared state.
    async fn with_state<T>(
        &self,
        scope: Scope<'_, MemoryUnit>,
        op: impl FnOnce(&mut MemoryState) -> T + Send,
    ) -> T {
        match scope {
            Scope::Unit(unit) => op(&mut unit.staged),
            Scope::Direct => {
                let mut state = self.state.lock().await;
                op(&mut state)
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, WalletError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryUnit { guard, staged })
    }

    async fn commit(&self, unit: MemoryUnit) -> Result<(), WalletError> {
        let MemoryUnit { mut guard, staged } = unit;
        *guard = staged;
        Ok(())
    }

    async fn rollback(&self, unit: MemoryUnit) -> Result<(), WalletError> {
        drop(unit);
        Ok(())
    }
}

// ============================================================================
// Accounts
// ============================================================================

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create_account(
        &self,
        scope: Scope<'_, MemoryUnit>,
        user_id: UserId,
    ) -> Result<Account, WalletError> {
        self.take_failure(FailPoint::AccountCreate)?;
        let now = self.now();
        self.with_state(scope, |state| {
            if !state.users.contains_key(&user_id) {
                return Err(WalletError::internal(format!(
                    "account owner {user_id} does not exist"
                )));
            }
            if state.account_of_user(user_id).is_some() {
                return Err(WalletError::internal(format!(
                    "user {user_id} already has an account"
                )));
            }
            let account = Account {
                id: next_id(&mut state.last_account_id),
                user_id,
                balance: money::zero(),
                bonus_balance: money::zero(),
                created_at: now,
                updated_at: now,
            };
            state.accounts.insert(account.id, account.clone());
            Ok(account)
        })
        .await
    }

    async fn get_by_id(
        &self,
        scope: Scope<'_, MemoryUnit>,
        id: AccountId,
    ) -> Result<Account, WalletError> {
        self.with_state(scope, |state| state.accounts.get(&id).cloned())
            .await
            .ok_or(WalletError::AccountNotFound)
    }

    async fn get_by_user_id(
        &self,
        scope: Scope<'_, MemoryUnit>,
        user_id: UserId,
    ) -> Result<Account, WalletError> {
        self.with_state(scope, |state| state.account_of_user(user_id).cloned())
            .await
            .ok_or(WalletError::AccountNotFound)
    }

    async fn get_by_phone(
        &self,
        scope: Scope<'_, MemoryUnit>,
        phone: &str,
    ) -> Result<Account, WalletError> {
        self.with_state(scope, |state| {
            let user_id = state.user_by_phone(phone)?.id;
            state.account_of_user(user_id).cloned()
        })
        .await
        .ok_or(WalletError::AccountNotFound)
    }

    async fn decrease_balance(
        &self,
        mut scope: Scope<'_, MemoryUnit>,
        id: AccountId,
        amount: Decimal,
    ) -> Result<(), WalletError> {
        let balance = self
            .with_state(scope.reborrow(), |state| {
                state.accounts.get(&id).map(|a| a.balance)
            })
            .await
            .ok_or(WalletError::AccountNotFound)?;
        if amount > balance {
            return Err(WalletError::InsufficientBalance);
        }

        if self.flag(FailPoint::ConcurrentDebit).swap(false, Ordering::SeqCst) {
            self.with_state(scope.reborrow(), |state| {
                if let Some(account) = state.accounts.get_mut(&id) {
                    account.balance = money::zero();
                }
            })
            .await;
        }

        let now = self.now();
        let updated = self
            .with_state(scope, |state| match state.accounts.get_mut(&id) {
                Some(account) if account.balance >= amount => {
                    account.balance -= amount;
                    account.updated_at = now;
                    true
                }
                _ => false,
            })
            .await;
        if !updated {
            debug!(account_id = id, amount = %amount, "Conditional debit matched no row");
            return Err(WalletError::AccountNotFound);
        }
        Ok(())
    }

    async fn increase_balance(
        &self,
        scope: Scope<'_, MemoryUnit>,
        id: AccountId,
        amount: Decimal,
    ) -> Result<(), WalletError> {
        let now = self.now();
        self.with_state(scope, |state| match state.accounts.get_mut(&id) {
            Some(account) => {
                account.balance += amount;
                account.updated_at = now;
                Ok(())
            }
            None => Err(WalletError::AccountNotFound),
        })
        .await
    }

    async fn get_transactions(
        &self,
        scope: Scope<'_, MemoryUnit>,
        id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, WalletError> {
        let entries = self
            .with_state(scope, |state| {
                let mut entries: Vec<HistoryEntry> = state
                    .ledger
                    .iter()
                    .filter(|e| e.account_from == Some(id))
                    .filter(|e| e.created_at >= start && e.created_at < end)
                    .map(|e| {
                        let phone = e.account_to.and_then(|to| state.phone_of_account(to));
                        HistoryEntry::from_entry(e, phone)
                    })
                    .collect();
                entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
                entries
            })
            .await;
        Ok(entries)
    }
}

// ============================================================================
// Ledger
// ============================================================================

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn append(
        &self,
        scope: Scope<'_, MemoryUnit>,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, WalletError> {
        self.take_failure(FailPoint::LedgerAppend)?;
        let now = self.now();
        let recorded = self
            .with_state(scope, |state| {
                let recorded = LedgerEntry {
                    id: next_id(&mut state.last_entry_id),
                    account_from: entry.account_from,
                    account_to: entry.account_to,
                    amount: entry.amount,
                    entry_type: entry.entry_type,
                    created_at: now,
                };
                state.ledger.push(recorded.clone());
                recorded
            })
            .await;
        Ok(recorded)
    }
}

// ============================================================================
// Users
// ============================================================================

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(
        &self,
        scope: Scope<'_, MemoryUnit>,
        phone: &str,
    ) -> Result<User, WalletError> {
        let now = self.now();
        self.with_state(scope, |state| {
            if state.user_by_phone(phone).is_some() {
                return Err(WalletError::UserExists);
            }
            let user = User {
                id: next_id(&mut state.last_user_id),
                phone: phone.to_string(),
                password_hash: None,
                first_name: None,
                last_name: None,
                middle_name: None,
                passport_number: None,
                is_verified: false,
                password_attempts: 0,
                is_blocked: false,
                created_at: now,
            };
            state.users.insert(user.id, user.clone());
            Ok(user)
        })
        .await
    }

    async fn get_user_by_id(
        &self,
        scope: Scope<'_, MemoryUnit>,
        id: UserId,
    ) -> Result<User, WalletError> {
        self.with_state(scope, |state| state.users.get(&id).cloned())
            .await
            .ok_or(WalletError::UserNotFound)
    }

    async fn get_user_by_phone(
        &self,
        scope: Scope<'_, MemoryUnit>,
        phone: &str,
    ) -> Result<User, WalletError> {
        self.with_state(scope, |state| state.user_by_phone(phone).cloned())
            .await
            .ok_or(WalletError::UserNotFound)
    }

    async fn update_password(
        &self,
        scope: Scope<'_, MemoryUnit>,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), WalletError> {
        self.with_state(scope, |state| {
            let user = state.users.get_mut(&id).ok_or(WalletError::UserNotFound)?;
            user.password_hash = Some(password_hash.to_string());
            user.password_attempts = 0;
            Ok(())
        })
        .await
    }

    async fn update_verification(
        &self,
        scope: Scope<'_, MemoryUnit>,
        id: UserId,
        details: &IdentityDetails,
    ) -> Result<(), WalletError> {
        self.with_state(scope, |state| {
            let user = state.users.get_mut(&id).ok_or(WalletError::UserNotFound)?;
            user.first_name = Some(details.first_name.clone());
            user.last_name = Some(details.last_name.clone());
            user.middle_name = Some(details.middle_name.clone());
            user.passport_number = Some(details.passport_number.clone());
            user.is_verified = true;
            Ok(())
        })
        .await
    }

    async fn record_failed_attempt(
        &self,
        scope: Scope<'_, MemoryUnit>,
        id: UserId,
        max_attempts: i32,
    ) -> Result<LoginAttempt, WalletError> {
        self.with_state(scope, |state| {
            let user = state.users.get_mut(&id).ok_or(WalletError::UserNotFound)?;
            if user.is_blocked {
                return Err(WalletError::UserBlocked);
            }
            user.password_attempts += 1;
            user.is_blocked = user.password_attempts >= max_attempts;
            Ok(LoginAttempt {
                password_attempts: user.password_attempts,
                is_blocked: user.is_blocked,
            })
        })
        .await
    }

    async fn reset_attempts(
        &self,
        scope: Scope<'_, MemoryUnit>,
        id: UserId,
    ) -> Result<(), WalletError> {
        self.with_state(scope, |state| {
            let user = state.users.get_mut(&id).ok_or(WalletError::UserNotFound)?;
            if user.is_blocked {
                return Err(WalletError::UserBlocked);
            }
            user.password_attempts = 0;
            Ok(())
        })
        .await
    }
}

// ============================================================================
// Services
// ============================================================================

#[async_trait]
impl ServiceCatalog for MemoryStore {
    async fn create_service(
        &self,
        scope: Scope<'_, MemoryUnit>,
        name: &str,
        description: &str,
        account_id: AccountId,
    ) -> Result<Service, WalletError> {
        let now = self.now();
        self.with_state(scope, |state| {
            if state.services.values().any(|s| s.name == name) {
                return Err(WalletError::internal(format!(
                    "service '{name}' already exists"
                )));
            }
            if !state.accounts.contains_key(&account_id) {
                return Err(WalletError::AccountNotFound);
            }
            let service = Service {
                id: next_id(&mut state.last_service_id),
                name: name.to_string(),
                description: description.to_string(),
                account_id,
                created_at: now,
                updated_at: now,
            };
            state.services.insert(service.id, service.clone());
            Ok(service)
        })
        .await
    }

    async fn list_services(
        &self,
        scope: Scope<'_, MemoryUnit>,
    ) -> Result<Vec<Service>, WalletError> {
        Ok(self
            .with_state(scope, |state| state.services.values().cloned().collect())
            .await)
    }

    async fn lookup_service_account(
        &self,
        scope: Scope<'_, MemoryUnit>,
        name: &str,
    ) -> Result<AccountId, WalletError> {
        self.with_state(scope, |state| {
            state
                .services
                .values()
                .find(|s| s.name == name)
                .map(|s| s.account_id)
        })
        .await
        .ok_or_else(|| WalletError::ServiceNotFound(name.to_string()))
    }
}
