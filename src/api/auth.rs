use axum::{
    Extension, Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::validation::validate_required;
use super::{
    ApiError, ApiResponse, AppState, LoginRequest, LoginResponse, MessageResponse,
    RegisterRequest, ResendCodeRequest, VerifyCodeRequest,
};
use crate::domain::{Principal, Role};
use crate::services::{AccountInfo, LoginResult};

impl From<LoginResult> for LoginResponse {
    fn from(result: LoginResult) -> Self {
        Self {
            requires_verification: result.requires_verification,
            token: result.token,
            expires_at: result.expires_at,
            user: result.user,
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves `Authorization: Bearer <token>` into a [`Principal`] request
/// extension. Missing and invalid tokens are both rejected with 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers).ok_or_else(ApiError::unauthenticated)?;

    let principal = state.auth_service().authenticate(&token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        ApiError::from(e)
    })?;

    tracing::Span::current().record("account_id", principal.account_id.value());
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
/// Create a student or leader account
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<AccountInfo>>, ApiError> {
    let email = validate_required(&payload.email, "Email")?;
    let role: Role = payload.role.parse().map_err(ApiError::validation)?;

    let account = state
        .auth_service()
        .register(email, &payload.password, role)
        .await?;

    Ok(Json(ApiResponse::success(account)))
}

/// POST /auth/login
/// Check the password; admins receive a token, everyone else a code by email
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let result = state
        .auth_service()
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(ApiResponse::success(result.into())))
}

/// POST /auth/verify-code
/// Exchange a one-time code for a session token
pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let email = validate_required(&payload.email, "Email")?;
    let code = validate_required(&payload.code, "Code")?;

    let result = state.auth_service().verify_code(email, code).await?;

    Ok(Json(ApiResponse::success(result.into())))
}

/// POST /auth/resend-code
/// Replace any outstanding code with a fresh one
pub async fn resend_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResendCodeRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let email = validate_required(&payload.email, "Email")?;

    state.auth_service().resend_code(email).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "A new verification code has been sent".to_string(),
    })))
}

/// GET /auth/me
/// Current account (requires authentication)
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<AccountInfo>>, ApiError> {
    let account = state.auth_service().current_account(principal).await?;
    Ok(Json(ApiResponse::success(account)))
}
