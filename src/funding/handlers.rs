use axum::{
    Extension, Json,
    extract::{Query, State},
    http::HeaderMap,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::account::{AccountBalance, HistoryEntry, LedgerEntry, Service};
use crate::core_types::AccountId;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiError, ApiResult, ok};
use crate::store::WalletStore;
use crate::user_auth::Claims;

pub const INTERNAL_SECRET_HEADER: &str = "X-Internal-Secret";

const DATE_FORMAT: &str = "%Y-%m-%d";

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub recipient_phone: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    pub service_type: String,
    /// Customer reference at the service (phone line, contract number)
    pub account: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
}

// --- Responses ---

#[derive(Debug, Serialize)]
pub struct PaymentReceipt {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub account: String,
}

// --- Handlers ---

/// GET /api/account/balance
pub async fn balance<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<AccountBalance> {
    let user_id = claims.user_id()?;
    ok(state.funds.balance(user_id).await?)
}

/// POST /api/transfer
pub async fn transfer<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<LedgerEntry> {
    let user_id = claims.user_id()?;
    let entry = state
        .funds
        .transfer_to_phone(user_id, &req.recipient_phone, req.amount)
        .await?;
    ok(entry)
}

/// POST /api/pay
pub async fn pay<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PayRequest>,
) -> ApiResult<PaymentReceipt> {
    let user_id = claims.user_id()?;
    let entry = state
        .funds
        .pay_service(user_id, &req.service_type, req.amount)
        .await?;

    info!(
        entry_id = entry.id,
        service = %req.service_type,
        customer_ref = %req.account,
        "Service payment accepted"
    );

    ok(PaymentReceipt {
        entry,
        account: req.account,
    })
}

/// GET /api/history?start=YYYY-MM-DD&end=YYYY-MM-DD
///
/// Unparsable dates fall back to the open default.
pub async fn history<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<HistoryEntry>> {
    let user_id = claims.user_id()?;
    let start = parse_date(query.start.as_deref());
    let end = parse_date(query.end.as_deref());
    ok(state.funds.history(user_id, start, end).await?)
}

/// GET /api/services
pub async fn services<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Vec<Service>> {
    ok(state.funds.list_services().await?)
}

/// Credit an account from a trusted internal caller
///
/// POST /internal/deposit
pub async fn internal_deposit<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<DepositRequest>,
) -> ApiResult<LedgerEntry> {
    if let Err(e) = check_internal_secret(state.internal_secret.as_deref(), &headers) {
        warn!(account_id = req.account_id, "Rejected internal deposit: {}", e.msg);
        return Err(e);
    }

    ok(state.funds.deposit(req.account_id, req.amount).await?)
}

/// Debit an account to an external destination for a trusted internal caller
///
/// POST /internal/withdraw
pub async fn internal_withdraw<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult<LedgerEntry> {
    if let Err(e) = check_internal_secret(state.internal_secret.as_deref(), &headers) {
        warn!(account_id = req.account_id, "Rejected internal withdraw: {}", e.msg);
        return Err(e);
    }

    ok(state.funds.withdraw(req.account_id, req.amount).await?)
}

/// Gate for `/internal/*`: no configured secret disables the endpoints.
fn check_internal_secret(expected: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return ApiError::forbidden("internal endpoints disabled").into_err();
    };
    let provided = headers
        .get(INTERNAL_SECRET_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();

    if bool::from(expected.as_bytes().ct_eq(provided)) {
        Ok(())
    } else {
        ApiError::forbidden("invalid internal secret").into_err()
    }
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(Some("2024-03-01")),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(parse_date(Some("01.03.2024")), None);
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_internal_secret_gate() {
        let mut headers = HeaderMap::new();
        assert!(check_internal_secret(Some("internal"), &headers).is_err());

        headers.insert(INTERNAL_SECRET_HEADER, HeaderValue::from_static("internal"));
        assert!(check_internal_secret(Some("internal"), &headers).is_ok());
        assert!(check_internal_secret(Some("internal-longer"), &headers).is_err());
        assert!(check_internal_secret(Some("interna"), &headers).is_err());

        let err = check_internal_secret(None, &headers).unwrap_err();
        assert_eq!(err.msg, "internal endpoints disabled");
    }

    #[test]
    fn test_transfer_request_accepts_number_or_string() {
        let req: TransferRequest =
            serde_json::from_str(r#"{"recipient_phone":"+992000000002","amount":"12.50"}"#)
                .unwrap();
        assert_eq!(req.amount, Decimal::new(1250, 2));

        let req: TransferRequest =
            serde_json::from_str(r#"{"recipient_phone":"+992000000002","amount":7}"#).unwrap();
        assert_eq!(req.amount, Decimal::from(7));
    }
}
