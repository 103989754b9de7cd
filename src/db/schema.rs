use anyhow::Result;
use sqlx::PgPool;

/// Initialize the wallet schema (idempotent)
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing PostgreSQL schema...");

    for (name, ddl) in [
        ("users", CREATE_USERS_TABLE),
        ("accounts", CREATE_ACCOUNTS_TABLE),
        ("transactions", CREATE_TRANSACTIONS_TABLE),
        ("transactions index", CREATE_TRANSACTIONS_INDEX),
        ("services", CREATE_SERVICES_TABLE),
    ] {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", name, e))?;
    }

    tracing::info!("PostgreSQL schema ready");
    Ok(())
}

pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id                BIGSERIAL PRIMARY KEY,
    phone             VARCHAR(32) NOT NULL UNIQUE,
    password_hash     TEXT,
    first_name        VARCHAR(128),
    last_name         VARCHAR(128),
    middle_name       VARCHAR(128),
    passport_number   VARCHAR(64),
    is_verified       BOOLEAN NOT NULL DEFAULT FALSE,
    password_attempts INTEGER NOT NULL DEFAULT 0,
    is_blocked        BOOLEAN NOT NULL DEFAULT FALSE,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id            BIGSERIAL PRIMARY KEY,
    user_id       BIGINT NOT NULL UNIQUE REFERENCES users(id),
    balance       NUMERIC(18, 2) NOT NULL DEFAULT 0 CHECK (balance >= 0),
    bonus_balance NUMERIC(18, 2) NOT NULL DEFAULT 0 CHECK (bonus_balance >= 0),
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id           BIGSERIAL PRIMARY KEY,
    account_from BIGINT REFERENCES accounts(id),
    account_to   BIGINT REFERENCES accounts(id),
    amount       NUMERIC(18, 2) NOT NULL CHECK (amount > 0),
    type         VARCHAR(64) NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSACTIONS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_transactions_from_created
    ON transactions (account_from, created_at DESC)
"#;

pub const CREATE_SERVICES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS services (
    id          BIGSERIAL PRIMARY KEY,
    name        VARCHAR(64) NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    account_id  BIGINT NOT NULL REFERENCES accounts(id),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;
