use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{self, OtpError};
use crate::db::operations::{sessions, users};
use crate::response::{json_error, AppError, SuccessResponse};
use crate::routes::require_db;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login-otp", post(request_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtpRequest {
    phone_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OtpIssued {
    phone_number: String,
    expires_in_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_code: Option<String>,
}

async fn request_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let phone = payload.phone_number.trim().to_string();
    if phone.is_empty() {
        return Err(AppError::validation("phoneNumber is required"));
    }

    let config = state.config();
    let code = state.otp_store().issue(&phone, config.otp_length);

    // mock delivery provider: the code only ever reaches logs, or the
    // response body when DEBUG is on
    tracing::info!(phone_number = phone.as_str(), code = code.as_str(), "[MOCK] OTP issued");

    let debug_code = config.debug.then_some(code);

    Ok(Json(SuccessResponse::new(OtpIssued {
        phone_number: phone,
        expires_in_minutes: config.otp_expiry_minutes,
        debug_code,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtpVerify {
    phone_number: String,
    otp_code: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenDto {
    access_token: String,
    token_type: &'static str,
    user_id: String,
    is_new_user: bool,
}

async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpVerify>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;
    let phone = payload.phone_number.trim().to_string();

    state
        .otp_store()
        .verify(&phone, payload.otp_code.trim(), state.config().otp_expiry_minutes)
        .map_err(|err| match err {
            OtpError::NotRequested => AppError::unauthorized("Request a verification code first"),
            OtpError::Expired => AppError::unauthorized("Verification code expired"),
            OtpError::Mismatch => AppError::unauthorized("Invalid verification code"),
        })?;

    let existing = users::get_user_by_phone(db.pool(), &phone)
        .await
        .map_err(|err| AppError::internal(err.to_string()))?;

    let is_new_user = existing.is_none();
    let user = match existing {
        Some(user) => user,
        None => {
            let name = payload.name.as_deref().unwrap_or("Student").trim().to_string();
            users::insert_user(db.pool(), &phone, &name)
                .await
                .map_err(|err| AppError::internal(err.to_string()))?
        }
    };

    let (token, expires_at) = auth::sign_jwt_for_user(&user.id)
        .map_err(|err| AppError::internal(err.to_string()))?;

    // opportunistic cleanup; stale sessions are harmless but pile up
    if let Err(err) = sessions::purge_expired_sessions(db.pool()).await {
        tracing::warn!(error = %err, "session purge failed");
    }

    sessions::insert_session(db.pool(), &auth::hash_token(&token), &user.id, expires_at)
        .await
        .map_err(|err| AppError::internal(err.to_string()))?;

    tracing::info!(user_id = user.id.as_str(), is_new_user, "user authenticated");

    Ok(Json(SuccessResponse::new(TokenDto {
        access_token: token,
        token_type: "bearer",
        user_id: user.id,
        is_new_user,
    })))
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let token = auth::extract_token(&headers).ok_or_else(|| {
        json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Missing authentication token")
    })?;

    let user = auth::verify_request_token(db.as_ref(), &token)
        .await
        .map_err(|_| {
            json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Invalid or expired token")
        })?;

    Ok(Json(SuccessResponse::new(user)))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    if let Some(token) = auth::extract_token(&headers) {
        db.delete_session_by_token_hash(&auth::hash_token(&token))
            .await
            .map_err(|err| AppError::internal(err.to_string()))?;
    }

    Ok(Json(SuccessResponse::new(serde_json::json!({ "loggedOut": true }))))
}
