use axum::{Extension, Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::token::Claims;
use crate::account::{IdentityDetails, UserProfile};
use crate::core_types::{AccountId, UserId};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiError, ApiResponse, ApiResult, MessageData, ok};
use crate::store::WalletStore;

// --- Requests ---

/// Phone alone requests a code; phone plus code registers.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub phone: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
}

// --- Responses ---

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: UserId,
    pub phone: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    CodeSent(MessageData),
    Registered {
        token: String,
        user_id: UserId,
        account_id: AccountId,
    },
}

// --- Handlers ---

/// Request a verification code, or submit one to register
///
/// POST /api/users/sign-up
pub async fn sign_up<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SignUpResponse>>), ApiError> {
    let code = req.code.as_deref().filter(|c| !c.is_empty());

    let Some(code) = code else {
        state.security.request_code(&req.phone).await?;
        return Ok((
            StatusCode::OK,
            Json(ApiResponse::success(SignUpResponse::CodeSent(
                MessageData::new("verification code sent"),
            ))),
        ));
    };

    let registration = state.security.submit_code(&req.phone, code).await?;
    let token = state.tokens.issue(registration.user.id)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SignUpResponse::Registered {
            token,
            user_id: registration.user.id,
            account_id: registration.account.id,
        })),
    ))
}

/// Login by phone and password
///
/// POST /api/users/login
pub async fn login<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let user = state.security.login(&req.phone, &req.password).await?;
    let token = state.tokens.issue(user.id)?;

    ok(AuthResponse {
        token,
        user_id: user.id,
        phone: user.phone,
    })
}

/// POST /api/users/set-password
pub async fn set_password<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetPasswordRequest>,
) -> ApiResult<MessageData> {
    let user_id = claims.user_id()?;
    state.security.set_password(user_id, &req.password).await?;
    ok(MessageData::new("password updated"))
}

/// POST /api/users/verify
pub async fn verify_identity<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
    Json(details): Json<IdentityDetails>,
) -> ApiResult<MessageData> {
    let user_id = claims.user_id()?;
    state.security.verify_identity(user_id, details).await?;
    ok(MessageData::new("identity verified"))
}

/// GET /api/users/profile
pub async fn profile<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<UserProfile> {
    let user_id = claims.user_id()?;
    ok(state.security.profile(user_id).await?)
}
