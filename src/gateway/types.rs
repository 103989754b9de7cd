//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiError`: error side of every handler, rendered as an `ApiResponse`
//! - `error_codes`: Standard error code constants

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::WalletError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - error: stable string code of the failure kind
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            error: None,
            data: Some(data),
        }
    }
}

/// Plain acknowledgement payload
#[derive(Debug, Serialize)]
pub struct MessageData {
    pub message: String,
}

impl MessageData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub kind: Option<&'static str>,
    pub msg: String,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap `data` in a success envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            kind: None,
            msg: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg)
    }

    pub fn missing_auth(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::MISSING_AUTH, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, error_codes::AUTH_FAILED, msg)
    }

    pub fn into_err<T>(self) -> Result<T, ApiError> {
        Err(self)
    }
}

impl From<WalletError> for ApiError {
    fn from(e: WalletError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let msg = match &e {
            WalletError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed with internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        Self {
            status,
            code: error_codes::for_error(&e),
            kind: Some(e.code()),
            msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            code: self.code,
            msg: self.msg,
            error: self.kind,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    use crate::error::WalletError;

    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const VERIFICATION_FAILED: i32 = 1003;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;
    pub const USER_BLOCKED: i32 = 2003;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4004;
    pub const ALREADY_EXISTS: i32 = 4009;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;

    pub fn for_error(e: &WalletError) -> i32 {
        match e {
            WalletError::InvalidAmount
            | WalletError::SelfTransfer
            | WalletError::InvalidPhone
            | WalletError::WeakPassword
            | WalletError::RequiredFields => INVALID_PARAMETER,
            WalletError::InsufficientFunds | WalletError::InsufficientBalance => {
                INSUFFICIENT_BALANCE
            }
            WalletError::CodeExpired | WalletError::InvalidCode => VERIFICATION_FAILED,
            WalletError::WrongPassword | WalletError::Unauthorized => AUTH_FAILED,
            WalletError::UserBlocked => USER_BLOCKED,
            WalletError::AccountNotFound
            | WalletError::UserNotFound
            | WalletError::ServiceNotFound(_) => NOT_FOUND,
            WalletError::UserExists => ALREADY_EXISTS,
            WalletError::Internal(_) => INTERNAL_ERROR,
        }
    }
}
