use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};

use walletx::WalletError;
use walletx::account::IdentityDetails;
use walletx::clock::ManualClock;
use walletx::store::memory::FailPoint;
use walletx::store::{AccountRepository, MemoryStore, Scope, TxRunner, UserRepository};
use walletx::user_auth::{AccountSecurity, MemoryCodeStore, SecuritySettings};

const PHONE: &str = "+992900000001";
const PASSWORD: &str = "s3cretpw";

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    security: AccountSecurity<MemoryStore>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let tx = TxRunner::new(Arc::clone(&store), Duration::from_secs(5));
    let codes = Arc::new(MemoryCodeStore::with_clock(clock.clone()));
    let security = AccountSecurity::new(
        Arc::clone(&store),
        tx,
        codes,
        SecuritySettings::default(),
    );
    Harness {
        store,
        clock,
        security,
    }
}

impl Harness {
    /// Register `PHONE` and give it `PASSWORD`
    async fn registered_user(&self) -> i64 {
        let code = self.security.request_code(PHONE).await.unwrap();
        let registration = self.security.submit_code(PHONE, &code).await.unwrap();
        self.security
            .set_password(registration.user.id, PASSWORD)
            .await
            .unwrap();
        registration.user.id
    }
}

// ============================================================================
// Verification codes and registration
// ============================================================================

#[tokio::test]
async fn test_code_registers_once() {
    let h = harness();

    let code = h.security.request_code(PHONE).await.unwrap();
    assert_eq!(code.len(), 5);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let registration = h.security.submit_code(PHONE, &code).await.unwrap();
    assert_eq!(registration.user.phone, PHONE);
    assert_eq!(registration.account.user_id, registration.user.id);
    assert!(registration.account.balance.is_zero());
    assert!(registration.account.bonus_balance.is_zero());

    assert_eq!(
        h.security.submit_code(PHONE, &code).await.unwrap_err(),
        WalletError::CodeExpired
    );
    assert_eq!(
        h.security.request_code(PHONE).await.unwrap_err(),
        WalletError::UserExists
    );
}

#[tokio::test]
async fn test_wrong_code_keeps_entry() {
    let h = harness();
    let code = h.security.request_code(PHONE).await.unwrap();
    let wrong = if code == "00000" { "11111" } else { "00000" };

    assert_eq!(
        h.security.submit_code(PHONE, wrong).await.unwrap_err(),
        WalletError::InvalidCode
    );
    assert_eq!(h.store.snapshot().await.user_count(), 0);

    h.security.submit_code(PHONE, &code).await.unwrap();
}

#[tokio::test]
async fn test_code_expires_after_ttl() {
    let h = harness();

    let stale = h.security.request_code(PHONE).await.unwrap();
    h.clock.advance(TimeDelta::minutes(6));
    assert_eq!(
        h.security.submit_code(PHONE, &stale).await.unwrap_err(),
        WalletError::CodeExpired
    );

    let fresh = h.security.request_code(PHONE).await.unwrap();
    h.clock.advance(TimeDelta::minutes(4));
    h.security.submit_code(PHONE, &fresh).await.unwrap();
}

#[tokio::test]
async fn test_new_code_replaces_previous() {
    let h = harness();

    let mut first = h.security.request_code(PHONE).await.unwrap();
    let mut second = h.security.request_code(PHONE).await.unwrap();
    // codes are random; retry until the two differ
    while first == second {
        first = second;
        second = h.security.request_code(PHONE).await.unwrap();
    }

    assert_eq!(
        h.security.submit_code(PHONE, &first).await.unwrap_err(),
        WalletError::InvalidCode
    );
    h.security.submit_code(PHONE, &second).await.unwrap();
}

#[tokio::test]
async fn test_failed_registration_leaves_no_user_and_keeps_code() {
    let h = harness();
    let code = h.security.request_code(PHONE).await.unwrap();

    h.store.fail_next(FailPoint::AccountCreate);
    let err = h.security.submit_code(PHONE, &code).await.unwrap_err();
    assert!(matches!(err, WalletError::Internal(_)));

    let state = h.store.snapshot().await;
    assert_eq!(state.user_count(), 0);
    assert_eq!(state.account_count(), 0);
    assert!(state.user_by_phone(PHONE).is_none());

    let registration = h.security.submit_code(PHONE, &code).await.unwrap();
    let account = h
        .store
        .get_by_user_id(Scope::Direct, registration.user.id)
        .await
        .unwrap();
    assert_eq!(account.id, registration.account.id);
}

#[tokio::test]
async fn test_invalid_phone_rejected() {
    let h = harness();
    for phone in ["992900000001", "+99290000000", "+99290000000a", ""] {
        assert_eq!(
            h.security.request_code(phone).await.unwrap_err(),
            WalletError::InvalidPhone
        );
    }
}

// ============================================================================
// Login lockout
// ============================================================================

#[tokio::test]
async fn test_three_wrong_passwords_block() {
    let h = harness();
    let user_id = h.registered_user().await;

    for _ in 0..2 {
        assert_eq!(
            h.security.login(PHONE, "wrongpw1").await.unwrap_err(),
            WalletError::WrongPassword
        );
    }
    assert_eq!(
        h.security.login(PHONE, "wrongpw1").await.unwrap_err(),
        WalletError::UserBlocked
    );

    // blocking is final, even with the right password
    assert_eq!(
        h.security.login(PHONE, PASSWORD).await.unwrap_err(),
        WalletError::UserBlocked
    );

    let user = h.store.get_user_by_id(Scope::Direct, user_id).await.unwrap();
    assert!(user.is_blocked);
    assert_eq!(user.password_attempts, 3);
}

#[tokio::test]
async fn test_correct_password_resets_counter() {
    let h = harness();
    let user_id = h.registered_user().await;

    for _ in 0..2 {
        h.security.login(PHONE, "wrongpw1").await.unwrap_err();
    }
    let user = h.security.login(PHONE, PASSWORD).await.unwrap();
    assert_eq!(user.id, user_id);
    assert_eq!(user.password_attempts, 0);

    for _ in 0..2 {
        assert_eq!(
            h.security.login(PHONE, "wrongpw1").await.unwrap_err(),
            WalletError::WrongPassword
        );
    }
    h.security.login(PHONE, PASSWORD).await.unwrap();
}

#[tokio::test]
async fn test_set_password_does_not_unblock() {
    let h = harness();
    let user_id = h.registered_user().await;

    for _ in 0..3 {
        h.security.login(PHONE, "wrongpw1").await.unwrap_err();
    }
    h.security.set_password(user_id, "n3wpassw").await.unwrap();

    assert_eq!(
        h.security.login(PHONE, "n3wpassw").await.unwrap_err(),
        WalletError::UserBlocked
    );
}

#[tokio::test]
async fn test_login_without_password_counts_as_wrong() {
    let h = harness();
    let code = h.security.request_code(PHONE).await.unwrap();
    let registration = h.security.submit_code(PHONE, &code).await.unwrap();

    assert_eq!(
        h.security.login(PHONE, "anything").await.unwrap_err(),
        WalletError::WrongPassword
    );
    let user = h
        .store
        .get_user_by_id(Scope::Direct, registration.user.id)
        .await
        .unwrap();
    assert_eq!(user.password_attempts, 1);
}

#[tokio::test]
async fn test_login_unknown_or_malformed_phone() {
    let h = harness();
    assert_eq!(
        h.security.login("+992900000099", PASSWORD).await.unwrap_err(),
        WalletError::UserNotFound
    );
    assert_eq!(
        h.security.login("nope", PASSWORD).await.unwrap_err(),
        WalletError::InvalidPhone
    );
}

#[tokio::test]
async fn test_password_policy() {
    let h = harness();
    let user_id = h.registered_user().await;

    for weak in ["short", "", "ninechars"] {
        assert_eq!(
            h.security.set_password(user_id, weak).await.unwrap_err(),
            WalletError::WeakPassword
        );
    }
    assert_eq!(
        h.security.set_password(9_999, PASSWORD).await.unwrap_err(),
        WalletError::UserNotFound
    );
}

// ============================================================================
// Identity
// ============================================================================

#[tokio::test]
async fn test_verify_identity() {
    let h = harness();
    let user_id = h.registered_user().await;

    let incomplete = IdentityDetails {
        first_name: "Aziz".to_string(),
        last_name: "  ".to_string(),
        middle_name: "Karimovich".to_string(),
        passport_number: "A1234567".to_string(),
    };
    assert_eq!(
        h.security
            .verify_identity(user_id, incomplete)
            .await
            .unwrap_err(),
        WalletError::RequiredFields
    );
    assert!(!h.security.profile(user_id).await.unwrap().is_verified);

    let details = IdentityDetails {
        first_name: " Aziz ".to_string(),
        last_name: "Karimov".to_string(),
        middle_name: "Karimovich".to_string(),
        passport_number: "A1234567".to_string(),
    };
    h.security.verify_identity(user_id, details).await.unwrap();

    let profile = h.security.profile(user_id).await.unwrap();
    assert!(profile.is_verified);
    assert_eq!(profile.first_name.as_deref(), Some("Aziz"));
    assert_eq!(profile.last_name.as_deref(), Some("Karimov"));
    assert_eq!(profile.phone, PHONE);
}
