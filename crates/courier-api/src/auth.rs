//! OTP login. A registered phone number gets a 4-digit code and a verify
//! link; posting the code to that link exchanges it for a JWT pair.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use courier_types::api::{
    AccessTokenResponse, Claims, LoginRequest, LoginResponse, OtpVerifyRequest, RefreshRequest,
    TokenPairResponse, TokenType,
};

use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

const PHONE_NOT_REGISTERED: &str = "Phone number not registered";

/// Payload carried by the verify link. Identifies the user, not the OTP.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct VerifyToken {
    user_id: i64,
    phone_number: String,
}

pub async fn otp_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    WithRejection(Json(req), _): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let phone_number = req
        .phone_number
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Please Enter a phone no."))?;

    let otp = generate_otp();
    let otp_hash = hash_otp(&otp);
    let expires_at = Utc::now() + state.config.otp_ttl;

    let user = state
        .run_db(move |db| {
            let user = db
                .get_user_by_phone(&phone_number)?
                .ok_or_else(|| ApiError::bad_request(PHONE_NOT_REGISTERED))?;
            db.set_otp(user.id, &otp_hash, expires_at)?;
            Ok(user)
        })
        .await?;

    let token = encode_verify_token(user.id, &user.phone_number)?;
    let otp_verify_link = format!("{}/accounts/otp_verify/{}/", base_url(&headers), token);

    info!(user_id = user.id, "OTP issued");

    Ok(Json(LoginResponse {
        detail: "OTP sent successfully".into(),
        otp_verify_link,
        otp,
        message: "You can use this otp for verify".into(),
    }))
}

pub async fn otp_verify(
    State(state): State<AppState>,
    Path(token): Path<String>,
    WithRejection(Json(req), _): ApiJson<OtpVerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = decode_verify_token(&token).ok_or_else(|| ApiError::bad_request("Invalid token"))?;

    let now = Utc::now();
    let user = state
        .run_db(move |db| {
            let user = db
                .get_user_by_phone(&payload.phone_number)?
                .ok_or_else(|| ApiError::bad_request(PHONE_NOT_REGISTERED))?;
            if user.id != payload.user_id {
                return Err(ApiError::bad_request("Invalid token"));
            }

            let otp = req
                .otp
                .filter(|otp| !otp.trim().is_empty())
                .ok_or_else(|| ApiError::bad_request("Please Enter an OTP."))?;

            let (Some(stored), Some(expires_at)) = (&user.otp_hash, user.otp_expires_at) else {
                return Err(ApiError::bad_request("Invalid OTP"));
            };
            if hash_otp(otp.trim()) != *stored {
                return Err(ApiError::bad_request("Invalid OTP"));
            }
            if expires_at < now {
                return Err(ApiError::bad_request("OTP expired"));
            }

            db.complete_login(user.id, now)?;
            Ok(user)
        })
        .await?;

    let config = &state.config;
    let access = create_token(&config.jwt_secret, user.id, &user.phone_number, TokenType::Access, config.access_ttl)?;
    let refresh = create_token(&config.jwt_secret, user.id, &user.phone_number, TokenType::Refresh, config.refresh_ttl)?;

    info!(user_id = user.id, "OTP verified");

    Ok(Json(TokenPairResponse { access, refresh }))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    WithRejection(Json(req), _): ApiJson<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let refresh = req
        .refresh
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| ApiError::unauthorized("Refresh token was not provided."))?;

    let claims = decode_token(&state.config.jwt_secret, &refresh)
        .ok()
        .filter(|claims| claims.token_type == TokenType::Refresh)
        .ok_or_else(|| ApiError::unauthorized("Token is invalid or expired"))?;

    let access = create_token(
        &state.config.jwt_secret,
        claims.sub,
        &claims.phone_number,
        TokenType::Access,
        state.config.access_ttl,
    )?;

    Ok(Json(AccessTokenResponse { access }))
}

pub fn create_token(
    secret: &str,
    user_id: i64,
    phone_number: &str,
    token_type: TokenType,
    ttl: chrono::Duration,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        phone_number: phone_number.to_string(),
        token_type,
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

fn generate_otp() -> String {
    rand::rng().random_range(1000..=9999).to_string()
}

/// Only the digest is stored, never the code itself.
fn hash_otp(otp: &str) -> String {
    hex::encode(Sha256::digest(otp.as_bytes()))
}

fn encode_verify_token(user_id: i64, phone_number: &str) -> anyhow::Result<String> {
    let json = serde_json::to_vec(&VerifyToken {
        user_id,
        phone_number: phone_number.to_string(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_verify_token(token: &str) -> Option<VerifyToken> {
    let bytes = URL_SAFE_NO_PAD.decode(token).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Scheme and host the client used to reach us, for absolute links.
fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    format!("{scheme}://{host}")
}
