use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

pub const POSTGRES_URL_ENV: &str = "WALLETX_POSTGRES_URL";
pub const JWT_SECRET_ENV: &str = "WALLETX_JWT_SECRET";

/// Shortest HS256 secret accepted outside memory storage.
pub const MIN_JWT_SECRET_LEN: usize = 32;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";
const PLACEHOLDER_SECRETS: &[&str] = &[DEV_JWT_SECRET, "override-me", "change-me"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub storage: StorageKind,
    /// PostgreSQL connection URL, required for `storage: postgres`
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Shared secret for `/internal/*` routes; disabled when absent
    #[serde(default)]
    pub internal_secret: Option<String>,
    /// Payable services created at startup if missing
    #[serde(default = "default_services")]
    pub services: Vec<ServiceSeed>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServiceSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_ttl_minutes: i64,
}

impl AuthConfig {
    /// Reject secrets that are published in the repository or too short to sign with.
    fn check_production_secret(&self) -> Result<()> {
        let secret = self.jwt_secret.trim();
        anyhow::ensure!(
            !PLACEHOLDER_SECRETS
                .iter()
                .any(|p| secret.eq_ignore_ascii_case(p)),
            "auth.jwt_secret is a placeholder; set {}",
            JWT_SECRET_ENV
        );
        anyhow::ensure!(
            secret.len() >= MIN_JWT_SECRET_LEN,
            "auth.jwt_secret must be at least {} bytes with postgres storage",
            MIN_JWT_SECRET_LEN
        );
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_ttl_minutes: 24 * 60,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecurityConfig {
    pub code_ttl_secs: u64,
    pub max_password_attempts: i32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: 300,
            max_password_attempts: 3,
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_transaction_timeout_ms() -> u64 {
    5_000
}

fn default_services() -> Vec<ServiceSeed> {
    vec![
        ServiceSeed {
            name: "mobile".to_string(),
            description: "Mobile operator top-up".to_string(),
        },
        ServiceSeed {
            name: "internet".to_string(),
            description: "Home internet provider".to_string(),
        },
    ]
}

impl AppConfig {
    /// Load `config/{env}.yaml`, then apply environment overrides.
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml_with_env(&content, |key| std::env::var(key).ok())
            .with_context(|| format!("Failed to parse config file: {}", config_path))
    }

    /// Parse and validate without consulting the environment.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Self::from_yaml_with_env(content, |_| None)
    }

    /// Overrides are applied before validation so the effective secret is checked.
    fn from_yaml_with_env(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(POSTGRES_URL_ENV) {
            self.postgres_url = Some(url);
        }
        if let Some(secret) = lookup(JWT_SECRET_ENV) {
            self.auth.jwt_secret = secret;
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.security.max_password_attempts > 0,
            "security.max_password_attempts must be positive"
        );
        anyhow::ensure!(
            self.transaction_timeout_ms > 0,
            "transaction_timeout_ms must be positive"
        );
        anyhow::ensure!(
            !self.auth.jwt_secret.is_empty(),
            "auth.jwt_secret must not be empty"
        );
        if self.storage == StorageKind::Postgres {
            self.auth.check_production_secret()?;
        }
        for seed in &self.services {
            anyhow::ensure!(!seed.name.trim().is_empty(), "service name must not be empty");
        }
        Ok(())
    }
}
