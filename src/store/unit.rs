//! Run a closure inside a unit of work
//!
//! `run(Scope::Direct, f)` begins a unit, hands `f` a mutable handle to it,
//! commits on `Ok` and rolls back on `Err`. `run(Scope::Unit(u), f)` joins
//! the caller's unit: no savepoint, the outer owner decides the outcome.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{error, warn};

use super::{Scope, UnitOfWork};
use crate::error::WalletError;

pub struct TxRunner<S: UnitOfWork> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S: UnitOfWork> Clone for TxRunner<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            timeout: self.timeout,
        }
    }
}

impl<S: UnitOfWork> TxRunner<S> {
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Run `f` in the scope's unit, or in a fresh one for `Scope::Direct`.
    pub async fn run<T, F>(&self, scope: Scope<'_, S::Unit>, f: F) -> Result<T, WalletError>
    where
        T: Send,
        F: for<'u> FnOnce(&'u mut S::Unit) -> BoxFuture<'u, Result<T, WalletError>> + Send,
    {
        match scope {
            Scope::Unit(unit) => f(unit).await,
            Scope::Direct => self.begin_and_run(f).await,
        }
    }

    /// Always start a new unit.
    pub async fn begin_and_run<T, F>(&self, f: F) -> Result<T, WalletError>
    where
        T: Send,
        F: for<'u> FnOnce(&'u mut S::Unit) -> BoxFuture<'u, Result<T, WalletError>> + Send,
    {
        let mut unit = self.store.begin().await?;

        let outcome = tokio::time::timeout(self.timeout, f(&mut unit)).await;
        let outcome = match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Unit of work timed out");
                Err(WalletError::internal("transaction timed out"))
            }
        };

        match outcome {
            Ok(value) => {
                if let Err(e) = self.store.commit(unit).await {
                    error!(error = %e, "Commit failed");
                    return Err(e);
                }
                Ok(value)
            }
            Err(cause) => {
                if let Err(e) = self.store.rollback(unit).await {
                    error!(error = %e, cause = %cause, "Rollback failed");
                    return Err(e);
                }
                Err(cause)
            }
        }
    }
}
