//! Account security state machine
//!
//! - Verification codes: `request_code` issues a 5-digit code under
//!   `verify:<phone>`; `submit_code` consumes it and registers the user.
//! - Registration: user and account are created in one unit.
//! - Login: wrong passwords go through one atomic increment-and-return; the
//!   user is blocked when the counter reaches the limit. Blocking is final.

use std::sync::Arc;

use chrono::TimeDelta;
use rand::Rng;
use tracing::{debug, info, warn};
use validator::Validate;

use super::code_store::CodeStore;
use super::password::{hash_password, verify_password};
use crate::account::{
    IdentityDetails, PhoneNumber, Registration, User, UserProfile, check_password_policy,
};
use crate::config::SecurityConfig;
use crate::core_types::UserId;
use crate::error::WalletError;
use crate::store::{Scope, TxRunner, UserRepository, WalletStore};

/// Upper bound (exclusive) of generated codes; codes are zero-padded to 5 digits.
const CODE_SPACE: u32 = 100_000;

#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub code_ttl: TimeDelta,
    pub max_password_attempts: i32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self::from(&SecurityConfig::default())
    }
}

impl From<&SecurityConfig> for SecuritySettings {
    fn from(config: &SecurityConfig) -> Self {
        Self {
            code_ttl: TimeDelta::seconds(config.code_ttl_secs as i64),
            max_password_attempts: config.max_password_attempts,
        }
    }
}

/// Uniformly random 5-digit code, leading zeros kept
pub fn generate_code() -> String {
    let n = rand::thread_rng().gen_range(0..CODE_SPACE);
    format!("{:05}", n)
}

pub struct AccountSecurity<S: WalletStore> {
    store: Arc<S>,
    tx: TxRunner<S>,
    codes: Arc<dyn CodeStore>,
    settings: SecuritySettings,
}

impl<S: WalletStore> AccountSecurity<S> {
    pub fn new(
        store: Arc<S>,
        tx: TxRunner<S>,
        codes: Arc<dyn CodeStore>,
        settings: SecuritySettings,
    ) -> Self {
        Self {
            store,
            tx,
            codes,
            settings,
        }
    }

    // ========================================================================
    // Verification codes and registration
    // ========================================================================

    /// Issue a fresh code for an unregistered phone, replacing any earlier one.
    ///
    /// The code is returned for the delivery channel.
    pub async fn request_code(&self, phone: &str) -> Result<String, WalletError> {
        let phone = PhoneNumber::new(phone)?;

        match self
            .store
            .get_user_by_phone(Scope::Direct, phone.as_str())
            .await
        {
            Ok(_) => return Err(WalletError::UserExists),
            Err(WalletError::UserNotFound) => {}
            Err(e) => return Err(e),
        }

        let code = generate_code();
        self.codes
            .set(&phone.code_key(), &code, self.settings.code_ttl)
            .await?;

        info!(phone = %phone, "Verification code issued");
        // no SMS gateway wired in; surfaced for local delivery
        debug!(phone = %phone, code = %code, "Verification code");
        Ok(code)
    }

    /// Check the submitted code and register the phone.
    ///
    /// The code is consumed only when registration succeeds.
    pub async fn submit_code(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<Registration, WalletError> {
        let phone = PhoneNumber::new(phone)?;
        let key = phone.code_key();

        let saved = self
            .codes
            .get(&key)
            .await?
            .ok_or(WalletError::CodeExpired)?;
        if saved.as_bytes() != code.as_bytes() {
            debug!(phone = %phone, "Verification code mismatch");
            return Err(WalletError::InvalidCode);
        }

        let registration = self.register(&phone).await?;

        if let Err(e) = self.codes.delete(&key).await {
            // registered already; the entry expires on its own
            warn!(phone = %phone, error = %e, "Failed to consume verification code");
        }
        Ok(registration)
    }

    /// Create the user and its account in one unit.
    pub async fn register(&self, phone: &PhoneNumber) -> Result<Registration, WalletError> {
        let store = Arc::clone(&self.store);
        let phone_str = phone.as_str().to_string();

        let registration = self
            .tx
            .run(Scope::Direct, move |unit| {
                Box::pin(async move {
                    let user = store
                        .create_user(Scope::Unit(&mut *unit), &phone_str)
                        .await?;
                    let account = store.create_account(Scope::Unit(unit), user.id).await?;
                    Ok(Registration { user, account })
                })
            })
            .await?;

        info!(
            user_id = registration.user.id,
            account_id = registration.account.id,
            phone = %phone,
            "User registered"
        );
        Ok(registration)
    }

    // ========================================================================
    // Passwords and login
    // ========================================================================

    /// Authenticate by phone and password.
    pub async fn login(&self, phone: &str, password: &str) -> Result<User, WalletError> {
        let phone = PhoneNumber::new(phone)?;
        let mut user = self
            .store
            .get_user_by_phone(Scope::Direct, phone.as_str())
            .await?;

        if !user.can_login() {
            return Err(WalletError::UserBlocked);
        }

        let matches = match &user.password_hash {
            Some(stored) => verify_password(password.to_string(), stored.clone()).await?,
            None => false,
        };

        if matches {
            self.store.reset_attempts(Scope::Direct, user.id).await?;
            user.password_attempts = 0;
            info!(user_id = user.id, "Login succeeded");
            return Ok(user);
        }

        let attempt = self
            .store
            .record_failed_attempt(Scope::Direct, user.id, self.settings.max_password_attempts)
            .await?;
        if attempt.is_blocked {
            warn!(
                user_id = user.id,
                attempts = attempt.password_attempts,
                "User blocked after repeated wrong passwords"
            );
            return Err(WalletError::UserBlocked);
        }

        debug!(
            user_id = user.id,
            attempts = attempt.password_attempts,
            "Wrong password"
        );
        Err(WalletError::WrongPassword)
    }

    /// Set or replace the password. Resets the attempt counter; a blocked
    /// user stays blocked.
    pub async fn set_password(&self, user_id: UserId, password: &str) -> Result<(), WalletError> {
        check_password_policy(password)?;

        let hash = hash_password(password.to_string()).await?;
        self.store
            .update_password(Scope::Direct, user_id, &hash)
            .await?;

        info!(user_id, "Password updated");
        Ok(())
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Store all identity fields and mark the user verified.
    pub async fn verify_identity(
        &self,
        user_id: UserId,
        details: IdentityDetails,
    ) -> Result<(), WalletError> {
        details
            .validate()
            .map_err(|_| WalletError::RequiredFields)?;

        self.store
            .update_verification(Scope::Direct, user_id, &details.trimmed())
            .await?;

        info!(user_id, "Identity verified");
        Ok(())
    }

    pub async fn profile(&self, user_id: UserId) -> Result<UserProfile, WalletError> {
        let user = self.store.get_user_by_id(Scope::Direct, user_id).await?;
        Ok(UserProfile::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_shape() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 5);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_settings_from_config() {
        let settings = SecuritySettings::default();
        assert_eq!(settings.code_ttl, TimeDelta::minutes(5));
        assert_eq!(settings.max_password_attempts, 3);
    }
}
