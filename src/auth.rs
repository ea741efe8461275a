use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use sqlx::Row;
use thiserror::Error;

use crate::db::Database;

const AUTH_COOKIE_NAME: &str = "auth_token";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub phone_number: String,
    pub name: String,
    pub study_level: String,
    pub target_specialty: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("missing JWT_SECRET")]
    MissingSecret,
    #[error("invalid JWT_EXPIRES_IN")]
    InvalidExpiresIn,
    #[error("database error: {0}")]
    Database(String),
}

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("no pending code for this phone number")]
    NotRequested,
    #[error("verification code expired")]
    Expired,
    #[error("verification code mismatch")]
    Mismatch,
}

#[derive(Debug, Clone)]
struct OtpEntry {
    code: String,
    created_at: NaiveDateTime,
}

/// In-process OTP store, owned by `AppState` and handed to handlers
/// explicitly. Codes are single-use: a successful verify consumes the entry.
#[derive(Default)]
pub struct OtpStore {
    entries: Mutex<HashMap<String, OtpEntry>>,
}

impl OtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, phone_number: &str, length: usize) -> String {
        let code = generate_otp(length);
        let mut entries = self.entries.lock();
        entries.insert(
            phone_number.to_string(),
            OtpEntry {
                code: code.clone(),
                created_at: Utc::now().naive_utc(),
            },
        );
        code
    }

    pub fn verify(
        &self,
        phone_number: &str,
        code: &str,
        expiry_minutes: i64,
    ) -> Result<(), OtpError> {
        let mut entries = self.entries.lock();
        let entry = entries.get(phone_number).ok_or(OtpError::NotRequested)?;

        let age = Utc::now().naive_utc() - entry.created_at;
        if age > chrono::Duration::minutes(expiry_minutes) {
            entries.remove(phone_number);
            return Err(OtpError::Expired);
        }
        if entry.code != code {
            return Err(OtpError::Mismatch);
        }

        entries.remove(phone_number);
        Ok(())
    }
}

fn generate_otp(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from_digit(rng.random_range(0..10u32), 10).unwrap_or('0'))
        .collect()
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = get_cookie(headers, AUTH_COOKIE_NAME) {
        return Some(token);
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|value| value.to_string())
}

pub async fn verify_request_token(db: &Database, token: &str) -> Result<AuthUser, AuthError> {
    let secret = std::env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)?;
    let claims = verify_jwt_hs256(token, &secret)?;

    let token_hash = hash_token(token);
    verify_session(db.pool(), &claims.user_id, &token_hash).await
}

#[derive(Debug, Clone)]
struct JwtClaims {
    user_id: String,
}

fn verify_jwt_hs256(token: &str, secret: &str) -> Result<JwtClaims, AuthError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let payload_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let sig_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    if parts.next().is_some() {
        return Err(AuthError::InvalidToken);
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;

    let header_json: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AuthError::InvalidToken)?;
    let alg = header_json
        .get("alg")
        .and_then(|value| value.as_str())
        .ok_or(AuthError::InvalidToken)?;
    if alg != "HS256" {
        return Err(AuthError::InvalidToken);
    }

    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload_json: serde_json::Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::InvalidToken)?;

    validate_registered_claims(&payload_json)?;

    let user_id = payload_json
        .get("userId")
        .and_then(|value| value.as_str())
        .ok_or(AuthError::InvalidToken)?
        .to_string();

    Ok(JwtClaims { user_id })
}

fn validate_registered_claims(payload: &serde_json::Value) -> Result<(), AuthError> {
    let now = Utc::now().timestamp();

    if let Some(exp) = payload.get("exp").and_then(|value| value.as_i64()) {
        if now >= exp {
            return Err(AuthError::InvalidToken);
        }
    }

    if let Some(nbf) = payload.get("nbf").and_then(|value| value.as_i64()) {
        if now < nbf {
            return Err(AuthError::InvalidToken);
        }
    }

    Ok(())
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn sign_jwt_for_user(user_id: &str) -> Result<(String, NaiveDateTime), AuthError> {
    let secret = std::env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)?;
    let expires_in = std::env::var("JWT_EXPIRES_IN").unwrap_or_else(|_| "24h".to_string());

    let expires_in_ms = parse_expires_in_ms(&expires_in)?;

    let issued_at = Utc::now();
    let exp = issued_at
        .checked_add_signed(chrono::Duration::milliseconds(expires_in_ms))
        .ok_or(AuthError::InvalidExpiresIn)?;

    let header_json = serde_json::json!({
        "alg": "HS256",
        "typ": "JWT",
    });

    let payload_json = serde_json::json!({
        "userId": user_id,
        "iat": issued_at.timestamp(),
        "exp": exp.timestamp(),
    });

    let header_b64 = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&header_json).map_err(|_| AuthError::InvalidToken)?);
    let payload_b64 = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&payload_json).map_err(|_| AuthError::InvalidToken)?);
    let signing_input = format!("{header_b64}.{payload_b64}");

    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature);

    let token = format!("{signing_input}.{sig_b64}");
    let expires_at = exp.naive_utc();

    Ok((token, expires_at))
}

pub fn parse_expires_in_ms(value: &str) -> Result<i64, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() < 2 {
        return Err(AuthError::InvalidExpiresIn);
    }

    let (digits, unit) = trimmed.split_at(trimmed.len() - 1);

    let amount: i64 = digits.parse().map_err(|_| AuthError::InvalidExpiresIn)?;
    if amount <= 0 {
        return Err(AuthError::InvalidExpiresIn);
    }

    match unit {
        "s" => Ok(amount * 1000),
        "m" => Ok(amount * 60 * 1000),
        "h" => Ok(amount * 60 * 60 * 1000),
        "d" => Ok(amount * 24 * 60 * 60 * 1000),
        _ => Err(AuthError::InvalidExpiresIn),
    }
}

async fn verify_session(
    pool: &PgPool,
    expected_user_id: &str,
    token_hash: &str,
) -> Result<AuthUser, AuthError> {
    let session_row = sqlx::query(
        r#"
        SELECT "userId", "expiresAt"
        FROM "sessions"
        WHERE "token" = $1
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
    .map_err(|err| AuthError::Database(err.to_string()))?;

    let Some(session_row) = session_row else {
        return Err(AuthError::InvalidToken);
    };

    let session_user_id: String = session_row
        .try_get("userId")
        .map_err(|err| AuthError::Database(err.to_string()))?;
    let session_expires_at: NaiveDateTime = session_row
        .try_get("expiresAt")
        .map_err(|err| AuthError::Database(err.to_string()))?;

    if session_user_id != expected_user_id {
        return Err(AuthError::InvalidToken);
    }

    let now = Utc::now().naive_utc();
    if session_expires_at < now {
        return Err(AuthError::InvalidToken);
    }

    let user_row = sqlx::query(
        r#"
        SELECT
          "id",
          "phoneNumber",
          "name",
          "studyLevel"::text as "studyLevel",
          "targetSpecialty"::text as "targetSpecialty",
          "createdAt",
          "updatedAt"
        FROM "users"
        WHERE "id" = $1
        "#,
    )
    .bind(expected_user_id)
    .fetch_optional(pool)
    .await
    .map_err(|err| AuthError::Database(err.to_string()))?;

    let Some(user_row) = user_row else {
        return Err(AuthError::InvalidToken);
    };

    let id: String = user_row
        .try_get("id")
        .map_err(|err| AuthError::Database(err.to_string()))?;
    let phone_number: String = user_row
        .try_get("phoneNumber")
        .map_err(|err| AuthError::Database(err.to_string()))?;
    let name: String = user_row
        .try_get("name")
        .map_err(|err| AuthError::Database(err.to_string()))?;
    let study_level: String = user_row
        .try_get("studyLevel")
        .map_err(|err| AuthError::Database(err.to_string()))?;
    let target_specialty: Option<String> = user_row.try_get("targetSpecialty").ok();
    let created_at: NaiveDateTime = user_row
        .try_get("createdAt")
        .map_err(|err| AuthError::Database(err.to_string()))?;
    let updated_at: NaiveDateTime = user_row
        .try_get("updatedAt")
        .map_err(|err| AuthError::Database(err.to_string()))?;

    Ok(AuthUser {
        id,
        phone_number,
        name,
        study_level,
        target_specialty,
        created_at: naive_datetime_to_ms(created_at),
        updated_at: naive_datetime_to_ms(updated_at),
    })
}

pub fn naive_datetime_to_ms(value: NaiveDateTime) -> i64 {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc).timestamp_millis()
}

fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in raw.split(';') {
        let trimmed = part.trim();
        let (key, value) = trimmed.split_once('=')?;
        if key == name {
            return Some(value.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_round_trip() {
        let store = OtpStore::new();
        let code = store.issue("+989121234567", 6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        assert!(matches!(
            store.verify("+989121234567", "000000", 5),
            Err(OtpError::Mismatch)
        ));
        assert!(store.verify("+989121234567", &code, 5).is_ok());
        // consumed on success
        assert!(matches!(
            store.verify("+989121234567", &code, 5),
            Err(OtpError::NotRequested)
        ));
    }

    #[test]
    fn expires_in_parsing() {
        assert_eq!(parse_expires_in_ms("30s").unwrap(), 30_000);
        assert_eq!(parse_expires_in_ms("24h").unwrap(), 86_400_000);
        assert!(parse_expires_in_ms("h").is_err());
        assert!(parse_expires_in_ms("10x").is_err());
    }
}
