//! Funds movement: transfers, service payments, external credits/debits
//!
//! - [`engine`] - the transactional core
//! - [`handlers`] - HTTP surface over the engine

pub mod engine;
pub mod handlers;

pub use engine::{FundsEngine, history_window};

use std::sync::Arc;

use tracing::info;

use crate::config::ServiceSeed;
use crate::error::WalletError;
use crate::store::{AccountRepository, Scope, ServiceCatalog, TxRunner, WalletStore};

/// Holding users of services are keyed by a phone outside the `+` format,
/// so transfer-to-phone can never reach them.
pub fn service_holder_phone(name: &str) -> String {
    format!("service:{}", name)
}

/// Create every missing service with its own holding user and account.
///
/// Returns the number of services created.
pub async fn ensure_services<S: WalletStore>(
    store: &Arc<S>,
    tx: &TxRunner<S>,
    seeds: &[ServiceSeed],
) -> Result<usize, WalletError> {
    let mut created = 0;

    for seed in seeds {
        match store.lookup_service_account(Scope::Direct, &seed.name).await {
            Ok(_) => continue,
            Err(WalletError::ServiceNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let store = Arc::clone(store);
        let name = seed.name.clone();
        let description = seed.description.clone();

        let service = tx
            .run(Scope::Direct, move |unit| {
                Box::pin(async move {
                    let holder = store
                        .create_user(Scope::Unit(&mut *unit), &service_holder_phone(&name))
                        .await?;
                    let account = store
                        .create_account(Scope::Unit(&mut *unit), holder.id)
                        .await?;
                    store
                        .create_service(Scope::Unit(unit), &name, &description, account.id)
                        .await
                })
            })
            .await?;

        info!(service = %service.name, account_id = service.account_id, "Service registered");
        created += 1;
    }

    Ok(created)
}
