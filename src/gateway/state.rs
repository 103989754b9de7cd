use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;

use crate::config::AppConfig;
use crate::db::Database;
use crate::funding::FundsEngine;
use crate::store::{TxRunner, WalletStore};
use crate::user_auth::{AccountSecurity, CodeStore, SecuritySettings, TokenService};

/// Gateway application state (shared)
pub struct AppState<S: WalletStore> {
    /// Transfers, payments, balances, history
    pub funds: FundsEngine<S>,
    /// Verification codes, registration, login lockout
    pub security: AccountSecurity<S>,
    /// JWT issue/verify, also handed to the auth middleware
    pub tokens: Arc<TokenService>,
    /// Shared secret for `/internal/*`
    pub internal_secret: Option<String>,
    /// PostgreSQL pool when running on the relational store
    pub pg_db: Option<Arc<Database>>,
}

impl<S: WalletStore> AppState<S> {
    pub fn new(
        config: &AppConfig,
        store: Arc<S>,
        codes: Arc<dyn CodeStore>,
        pg_db: Option<Arc<Database>>,
    ) -> Self {
        let tx = TxRunner::new(
            Arc::clone(&store),
            Duration::from_millis(config.transaction_timeout_ms),
        );
        let tokens = Arc::new(TokenService::new(
            &config.auth.jwt_secret,
            TimeDelta::minutes(config.auth.jwt_ttl_minutes),
        ));

        Self {
            funds: FundsEngine::new(Arc::clone(&store), tx.clone()),
            security: AccountSecurity::new(
                store,
                tx,
                codes,
                SecuritySettings::from(&config.security),
            ),
            tokens,
            internal_secret: config.internal_secret.clone(),
            pg_db,
        }
    }
}
