//! Data models for wallet accounts, users, the ledger and the service catalog

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::core_types::{AccountId, EntryId, ServiceId, TRANSFER_TYPE, UserId};

// ============================================================================
// Account
// ============================================================================

/// Wallet account, exactly one per user
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub balance: Decimal,
    pub bonus_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Balance view returned to the account owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub balance: Decimal,
    pub bonus_balance: Decimal,
}

impl From<&Account> for AccountBalance {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            balance: account.balance,
            bonus_balance: account.bonus_balance,
        }
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Immutable record of one completed balance movement
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_from: Option<AccountId>,
    pub account_to: Option<AccountId>,
    pub amount: Decimal,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub entry_type: String,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry before the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub account_from: Option<AccountId>,
    pub account_to: Option<AccountId>,
    pub amount: Decimal,
    pub entry_type: String,
}

impl NewLedgerEntry {
    pub fn movement(
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        entry_type: impl Into<String>,
    ) -> Self {
        Self {
            account_from: Some(from),
            account_to: Some(to),
            amount,
            entry_type: entry_type.into(),
        }
    }
}

/// Outgoing ledger entry as shown in the owner's history
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct HistoryEntry {
    pub id: EntryId,
    pub account_to: Option<AccountId>,
    pub amount: Decimal,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub entry_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_phone: Option<String>,
}

impl HistoryEntry {
    /// Project a ledger entry; the phone is only kept for transfers.
    pub fn from_entry(entry: &LedgerEntry, to_phone: Option<String>) -> Self {
        Self {
            id: entry.id,
            account_to: entry.account_to,
            amount: entry.amount,
            entry_type: entry.entry_type.clone(),
            created_at: entry.created_at,
            to_phone: to_phone.filter(|_| entry.entry_type == TRANSFER_TYPE),
        }
    }
}

// ============================================================================
// User
// ============================================================================

/// Wallet user, keyed by phone
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: UserId,
    pub phone: String,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub passport_number: Option<String>,
    pub is_verified: bool,
    pub password_attempts: i32,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn can_login(&self) -> bool {
        !self.is_blocked
    }
}

/// Counter state after a failed login was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct LoginAttempt {
    pub password_attempts: i32,
    pub is_blocked: bool,
}

/// Identity fields, stored all together or not at all
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Validate)]
#[serde(default)]
pub struct IdentityDetails {
    #[validate(custom(function = "not_blank"))]
    pub first_name: String,
    #[validate(custom(function = "not_blank"))]
    pub last_name: String,
    #[validate(custom(function = "not_blank"))]
    pub middle_name: String,
    #[validate(custom(function = "not_blank"))]
    pub passport_number: String,
}

impl IdentityDetails {
    /// Copy with surrounding whitespace removed from every field
    pub fn trimmed(&self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            middle_name: self.middle_name.trim().to_string(),
            passport_number: self.passport_number.trim().to_string(),
        }
    }
}

fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub phone: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub is_verified: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            middle_name: user.middle_name.clone(),
            is_verified: user.is_verified,
        }
    }
}

/// Result of a successful registration
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub user: User,
    pub account: Account,
}

// ============================================================================
// Service catalog
// ============================================================================

/// Payable service and the account that collects its payments
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub description: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn entry(entry_type: &str) -> LedgerEntry {
        LedgerEntry {
            id: 7,
            account_from: Some(1),
            account_to: Some(2),
            amount: Decimal::new(6000, 2),
            entry_type: entry_type.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_keeps_phone_for_transfers_only() {
        let phone = Some("+998901234567".to_string());

        let transfer = HistoryEntry::from_entry(&entry("transfer"), phone.clone());
        assert_eq!(transfer.to_phone.as_deref(), Some("+998901234567"));

        let payment = HistoryEntry::from_entry(&entry("mobile"), phone);
        assert_eq!(payment.to_phone, None);
    }

    #[test]
    fn test_history_serializes_type_field() {
        let json = serde_json::to_value(HistoryEntry::from_entry(&entry("mobile"), None)).unwrap();
        assert_eq!(json["type"], "mobile");
        assert_eq!(json["amount"], "60.00");
        assert!(json.get("to_phone").is_none());
    }

    #[test]
    fn test_identity_details_validation() {
        let mut details = IdentityDetails {
            first_name: "Ali".into(),
            last_name: "Valiyev".into(),
            middle_name: "Olim".into(),
            passport_number: "AA1234567".into(),
        };
        assert!(details.validate().is_ok());

        details.middle_name = "   ".into();
        assert!(details.validate().is_err());
    }

    #[test]
    fn test_identity_details_trimmed() {
        let details = IdentityDetails {
            first_name: " Ali ".into(),
            last_name: "Valiyev\n".into(),
            middle_name: "\tOlim".into(),
            passport_number: "AA1234567".into(),
        };
        let trimmed = details.trimmed();
        assert_eq!(trimmed.first_name, "Ali");
        assert_eq!(trimmed.last_name, "Valiyev");
        assert_eq!(trimmed.middle_name, "Olim");
    }
}
