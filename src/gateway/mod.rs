pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::GatewayConfig;
use crate::funding::handlers as funding;
use crate::store::WalletStore;
use crate::user_auth::handlers as users;
use crate::user_auth::middleware::jwt_auth_middleware;
use state::AppState;

/// Build the full route table over `state`
pub fn router<S: WalletStore>(state: Arc<AppState<S>>) -> Router {
    // ==========================================================================
    // Public Routes (no auth required)
    // ==========================================================================
    let public_routes = Router::new()
        .route("/users/sign-up", post(users::sign_up::<S>))
        .route("/users/login", post(users::login::<S>));

    // ==========================================================================
    // Private Routes (JWT required)
    // ==========================================================================
    let private_routes = Router::new()
        .route("/users/set-password", post(users::set_password::<S>))
        .route("/users/verify", post(users::verify_identity::<S>))
        .route("/users/profile", get(users::profile::<S>))
        .route("/account/balance", get(funding::balance::<S>))
        .route("/transfer", post(funding::transfer::<S>))
        .route("/pay", post(funding::pay::<S>))
        .route("/history", get(funding::history::<S>))
        .route("/services", get(funding::services::<S>))
        .layer(from_fn_with_state(
            Arc::clone(&state.tokens),
            jwt_auth_middleware,
        ));

    // ==========================================================================
    // Internal Routes (shared secret)
    // ==========================================================================
    let internal_routes = Router::new()
        .route("/deposit", post(funding::internal_deposit::<S>))
        .route("/withdraw", post(funding::internal_withdraw::<S>));

    Router::new()
        .route("/ping", get(handlers::ping::<S>))
        .nest("/api", public_routes.merge(private_routes))
        .nest("/internal", internal_routes)
        .with_state(state)
}

/// Start HTTP Gateway server, returning after a graceful shutdown
pub async fn run_server<S: WalletStore>(
    gateway: &GatewayConfig,
    state: Arc<AppState<S>>,
) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", gateway.host, gateway.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {}: {} (port {} may already be in use)",
            addr,
            e,
            gateway.port
        )
    })?;

    info!(%addr, "Gateway listening");
    info!("Public API:   /api/users/sign-up, /api/users/login");
    info!("Private API:  /api/* (JWT required)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
