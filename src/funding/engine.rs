//! Funds Movement Engine
//!
//! Every movement runs in one unit of work: resolve both sides, reject
//! self-transfers, fast-fail on the fresh balance, conditional debit,
//! credit, ledger entry. Any failure rolls the whole unit back and the
//! caller sees exactly one typed error.
//!
//! The balance is checked twice: once here as an early rejection, once as
//! the store's `balance >= amount` guard at write time. The engine never
//! retries.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::account::{
    AccountBalance, HistoryEntry, LedgerEntry, NewLedgerEntry, PhoneNumber, Service,
};
use crate::clock::{Clock, SystemClock};
use crate::core_types::{AccountId, DEPOSIT_TYPE, TRANSFER_TYPE, UserId, WITHDRAW_TYPE};
use crate::error::WalletError;
use crate::money;
use crate::store::{AccountRepository, LedgerRepository, Scope, TxRunner, WalletStore};

pub struct FundsEngine<S: WalletStore> {
    store: Arc<S>,
    tx: TxRunner<S>,
    clock: Arc<dyn Clock>,
}

impl<S: WalletStore> FundsEngine<S> {
    pub fn new(store: Arc<S>, tx: TxRunner<S>) -> Self {
        Self::with_clock(store, tx, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, tx: TxRunner<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, tx, clock }
    }

    // ========================================================================
    // Account-to-account movements
    // ========================================================================

    /// Move `amount` between two accounts, recorded as "transfer".
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<LedgerEntry, WalletError> {
        self.transfer_in(Scope::Direct, from, to, amount).await
    }

    /// Like [`transfer`](Self::transfer), joining the caller's unit if the
    /// scope carries one.
    pub async fn transfer_in(
        &self,
        scope: Scope<'_, S::Unit>,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<LedgerEntry, WalletError> {
        self.move_funds(scope, from, to, amount, TRANSFER_TYPE.to_string())
            .await
    }

    /// Pay a service's holding account; the ledger type is `transaction_type`.
    pub async fn pay(
        &self,
        from: AccountId,
        service_account: AccountId,
        amount: Decimal,
        transaction_type: &str,
    ) -> Result<LedgerEntry, WalletError> {
        self.pay_in(Scope::Direct, from, service_account, amount, transaction_type)
            .await
    }

    pub async fn pay_in(
        &self,
        scope: Scope<'_, S::Unit>,
        from: AccountId,
        service_account: AccountId,
        amount: Decimal,
        transaction_type: &str,
    ) -> Result<LedgerEntry, WalletError> {
        self.move_funds(
            scope,
            from,
            service_account,
            amount,
            transaction_type.to_string(),
        )
        .await
    }

    async fn move_funds(
        &self,
        scope: Scope<'_, S::Unit>,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        entry_type: String,
    ) -> Result<LedgerEntry, WalletError> {
        let amount = money::validate_amount(amount)?;

        let store = Arc::clone(&self.store);
        let result = self
            .tx
            .run(scope, move |unit| {
                Box::pin(async move { Self::settle(&store, unit, from, to, amount, entry_type).await })
            })
            .await;

        match &result {
            Ok(entry) => info!(
                entry_id = entry.id,
                from,
                to,
                amount = %entry.amount,
                entry_type = %entry.entry_type,
                "Funds moved"
            ),
            Err(WalletError::Internal(msg)) => {
                error!(from, to, amount = %amount, error = %msg, "Funds movement failed")
            }
            Err(e) => debug!(from, to, amount = %amount, reason = e.code(), "Funds movement rejected"),
        }
        result
    }

    /// Steps of one movement, all on `unit`.
    async fn settle(
        store: &S,
        unit: &mut S::Unit,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        entry_type: String,
    ) -> Result<LedgerEntry, WalletError> {
        let source = store.get_by_id(Scope::Unit(&mut *unit), from).await?;
        let target = store.get_by_id(Scope::Unit(&mut *unit), to).await?;

        if source.id == target.id {
            return Err(WalletError::SelfTransfer);
        }
        if source.balance < amount {
            return Err(WalletError::InsufficientFunds);
        }

        store
            .decrease_balance(Scope::Unit(&mut *unit), source.id, amount)
            .await
            .map_err(debit_rejection)?;
        store
            .increase_balance(Scope::Unit(&mut *unit), target.id, amount)
            .await?;

        store
            .append(
                Scope::Unit(unit),
                NewLedgerEntry::movement(source.id, target.id, amount, entry_type),
            )
            .await
    }

    // ========================================================================
    // Caller-facing operations
    // ========================================================================

    /// Transfer from the caller's account to the account owned by `recipient_phone`.
    pub async fn transfer_to_phone(
        &self,
        from_user: UserId,
        recipient_phone: &str,
        amount: Decimal,
    ) -> Result<LedgerEntry, WalletError> {
        let phone = PhoneNumber::new(recipient_phone)?;
        let amount = money::validate_amount(amount)?;

        let from = self.store.get_by_user_id(Scope::Direct, from_user).await?;
        let to = self.store.get_by_phone(Scope::Direct, phone.as_str()).await?;

        self.transfer(from.id, to.id, amount).await
    }

    /// Pay the named service from the caller's account.
    pub async fn pay_service(
        &self,
        from_user: UserId,
        service_name: &str,
        amount: Decimal,
    ) -> Result<LedgerEntry, WalletError> {
        let amount = money::validate_amount(amount)?;

        let from = self.store.get_by_user_id(Scope::Direct, from_user).await?;
        let service_account = self
            .store
            .lookup_service_account(Scope::Direct, service_name)
            .await?;

        self.pay(from.id, service_account, amount, service_name).await
    }

    /// Outgoing entries of the caller's account, newest first.
    ///
    /// `end` is inclusive: the window is `[start, end + 1 day)`.
    pub async fn history(
        &self,
        user_id: UserId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<HistoryEntry>, WalletError> {
        let account = self.store.get_by_user_id(Scope::Direct, user_id).await?;
        let (start, end) = history_window(start, end, self.clock.now());
        self.store
            .get_transactions(Scope::Direct, account.id, start, end)
            .await
    }

    pub async fn balance(&self, user_id: UserId) -> Result<AccountBalance, WalletError> {
        let account = self.store.get_by_user_id(Scope::Direct, user_id).await?;
        Ok(AccountBalance::from(&account))
    }

    pub async fn list_services(&self) -> Result<Vec<Service>, WalletError> {
        self.store.list_services(Scope::Direct).await
    }

    // ========================================================================
    // External credits and debits
    // ========================================================================

    /// Credit an account from outside the wallet.
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<LedgerEntry, WalletError> {
        let amount = money::validate_amount(amount)?;
        let store = Arc::clone(&self.store);

        let entry = self
            .tx
            .run(Scope::Direct, move |unit| {
                Box::pin(async move {
                    store
                        .increase_balance(Scope::Unit(&mut *unit), account_id, amount)
                        .await?;
                    store
                        .append(
                            Scope::Unit(unit),
                            NewLedgerEntry {
                                account_from: None,
                                account_to: Some(account_id),
                                amount,
                                entry_type: DEPOSIT_TYPE.to_string(),
                            },
                        )
                        .await
                })
            })
            .await?;

        info!(entry_id = entry.id, account_id, amount = %amount, "Deposit credited");
        Ok(entry)
    }

    /// Debit an account towards the outside of the wallet.
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<LedgerEntry, WalletError> {
        let amount = money::validate_amount(amount)?;
        let store = Arc::clone(&self.store);

        let entry = self
            .tx
            .run(Scope::Direct, move |unit| {
                Box::pin(async move {
                    let account = store.get_by_id(Scope::Unit(&mut *unit), account_id).await?;
                    if account.balance < amount {
                        return Err(WalletError::InsufficientFunds);
                    }
                    store
                        .decrease_balance(Scope::Unit(&mut *unit), account_id, amount)
                        .await
                        .map_err(debit_rejection)?;
                    store
                        .append(
                            Scope::Unit(unit),
                            NewLedgerEntry {
                                account_from: Some(account_id),
                                account_to: None,
                                amount,
                                entry_type: WITHDRAW_TYPE.to_string(),
                            },
                        )
                        .await
                })
            })
            .await?;

        info!(entry_id = entry.id, account_id, amount = %amount, "Withdrawal debited");
        Ok(entry)
    }
}

/// The source was resolved in this unit and accounts are never deleted, so
/// a tripped debit guard means a concurrent debit won.
fn debit_rejection(e: WalletError) -> WalletError {
    match e {
        WalletError::InsufficientBalance | WalletError::AccountNotFound => {
            WalletError::InsufficientFunds
        }
        other => other,
    }
}

/// `[start, end + 1 day)`; start defaults to the Unix epoch, end to `now`.
pub fn history_window(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .unwrap_or(DateTime::UNIX_EPOCH);
    let end = match end {
        Some(d) => d
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
        None => now,
    };
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::store::memory::FailPoint;
    use std::str::FromStr;
    use std::time::Duration;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn engine() -> (Arc<MemoryStore>, FundsEngine<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let tx = TxRunner::new(Arc::clone(&store), Duration::from_secs(5));
        (Arc::clone(&store), FundsEngine::new(store, tx))
    }

    async fn open_account(store: &MemoryStore, phone: &str, balance: &str) -> AccountId {
        use crate::store::UserRepository;
        let user = store.create_user(Scope::Direct, phone).await.unwrap();
        let account = store.create_account(Scope::Direct, user.id).await.unwrap();
        if balance != "0" {
            store
                .increase_balance(Scope::Direct, account.id, dec(balance))
                .await
                .unwrap();
        }
        account.id
    }

    #[tokio::test]
    async fn test_transfer_moves_balance_and_records_entry() {
        let (store, engine) = engine();
        let a = open_account(&store, "+998900000001", "100.00").await;
        let b = open_account(&store, "+998900000002", "0").await;

        let entry = engine.transfer(a, b, dec("60")).await.unwrap();
        assert_eq!(entry.amount, dec("60.00"));
        assert_eq!(entry.entry_type, "transfer");
        assert_eq!(entry.account_from, Some(a));
        assert_eq!(entry.account_to, Some(b));

        let state = store.snapshot().await;
        assert_eq!(state.account(a).unwrap().balance, dec("40.00"));
        assert_eq!(state.account(b).unwrap().balance, dec("60.00"));
        assert_eq!(state.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_amount_rejected_before_unit() {
        let (store, engine) = engine();
        let a = open_account(&store, "+998900000001", "10.00").await;
        let b = open_account(&store, "+998900000002", "0").await;

        for amount in ["0", "-1", "0.001"] {
            assert_eq!(
                engine.transfer(a, b, dec(amount)).await,
                Err(WalletError::InvalidAmount)
            );
        }
        assert!(store.snapshot().await.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let (store, engine) = engine();
        let a = open_account(&store, "+998900000001", "10.00").await;

        assert_eq!(
            engine.transfer(a, a, dec("1")).await,
            Err(WalletError::SelfTransfer)
        );
        let state = store.snapshot().await;
        assert_eq!(state.account(a).unwrap().balance, dec("10.00"));
        assert!(state.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (store, engine) = engine();
        let a = open_account(&store, "+998900000001", "10.00").await;
        assert_eq!(
            engine.transfer(a, 404, dec("1")).await,
            Err(WalletError::AccountNotFound)
        );
        assert_eq!(
            engine.transfer(404, a, dec("1")).await,
            Err(WalletError::AccountNotFound)
        );
    }

    #[tokio::test]
    async fn test_ledger_failure_rolls_back_balances() {
        let (store, engine) = engine();
        let a = open_account(&store, "+998900000001", "10.00").await;
        let b = open_account(&store, "+998900000002", "0").await;

        store.fail_next(FailPoint::LedgerAppend);
        let err = engine.transfer(a, b, dec("5")).await.unwrap_err();
        assert!(matches!(err, WalletError::Internal(_)));

        let state = store.snapshot().await;
        assert_eq!(state.account(a).unwrap().balance, dec("10.00"));
        assert_eq!(state.account(b).unwrap().balance, dec("0.00"));
        assert!(state.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_pay_uses_transaction_type() {
        let (store, engine) = engine();
        let a = open_account(&store, "+998900000001", "10.00").await;
        let holder = open_account(&store, "service:internet", "0").await;

        let entry = engine.pay(a, holder, dec("2.50"), "internet").await.unwrap();
        assert_eq!(entry.entry_type, "internet");
        assert_eq!(
            store.snapshot().await.account(holder).unwrap().balance,
            dec("2.50")
        );
    }

    #[tokio::test]
    async fn test_deposit_and_withdraw() {
        let (store, engine) = engine();
        let a = open_account(&store, "+998900000001", "0").await;

        let credit = engine.deposit(a, dec("20")).await.unwrap();
        assert_eq!(credit.account_from, None);
        assert_eq!(credit.entry_type, "deposit");

        assert_eq!(
            engine.withdraw(a, dec("20.01")).await,
            Err(WalletError::InsufficientFunds)
        );
        let debit = engine.withdraw(a, dec("5")).await.unwrap();
        assert_eq!(debit.account_to, None);
        assert_eq!(debit.entry_type, "withdraw");

        let state = store.snapshot().await;
        assert_eq!(state.account(a).unwrap().balance, dec("15.00"));
        assert_eq!(state.ledger().len(), 2);
    }

    #[test]
    fn test_history_window_defaults() {
        let now = Utc::now();
        let (start, end) = history_window(None, None, now);
        assert_eq!(start, DateTime::UNIX_EPOCH);
        assert_eq!(end, now);
    }

    #[test]
    fn test_history_window_end_is_inclusive() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let (start, end) = history_window(Some(day), Some(day), Utc::now());
        assert_eq!(start.to_rfc3339(), "2024-03-15T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-03-16T00:00:00+00:00");
    }

    #[test]
    fn test_debit_rejection_mapping() {
        assert_eq!(
            debit_rejection(WalletError::InsufficientBalance),
            WalletError::InsufficientFunds
        );
        assert_eq!(
            debit_rejection(WalletError::AccountNotFound),
            WalletError::InsufficientFunds
        );
        assert_eq!(
            debit_rejection(WalletError::internal("db")),
            WalletError::internal("db")
        );
    }
}
