use axum::{
    RequestExt,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};

use courier_types::api::TokenType;

use crate::auth::decode_token;
use crate::error::ApiError;
use crate::state::AppState;

/// Extract and validate the access JWT from the Authorization header.
/// On success the decoded `Claims` are stored as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = req
        .extract_parts::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| ApiError::unauthorized("Authentication credentials were not provided."))?;

    let claims = decode_token(&state.config.jwt_secret, bearer.token())
        .map_err(|_| ApiError::unauthorized("Given token not valid for any token type"))?;

    if claims.token_type != TokenType::Access {
        return Err(ApiError::unauthorized("Given token not valid for any token type"));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
