use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, events, messages, recurring, settings, users};

/// Every HTTP route. CORS and tracing layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/accounts/create_user", post(users::create_user))
        .route("/accounts/login/", post(auth::otp_login))
        .route("/accounts/otp_verify/{token}/", post(auth::otp_verify))
        .route("/accounts/token/refresh/", post(auth::refresh_token));

    let protected_routes = Router::new()
        .route(
            "/accounts/manage_user/{id}",
            get(users::get_user).put(users::update_user).patch(users::update_user),
        )
        .route(
            "/accounts/manage_user/{id}/profile_img",
            put(users::upload_profile_img).layer(DefaultBodyLimit::max(users::MAX_PROFILE_IMG_SIZE)),
        )
        .route("/chat/messages/", get(messages::list_messages).post(messages::send_message))
        .route("/chat/forward_message/", post(messages::forward_message))
        .route("/chat/reply_message/", post(messages::reply_message))
        .route("/chat/events/", get(events::list_events).post(events::create_event))
        .route("/chat/message_setting/", get(settings::list_settings).post(settings::create_setting))
        .route(
            "/chat/recurring_messages/",
            get(recurring::list_recurring).post(recurring::create_recurring),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn health_is_public() {
        let app = TestApp::new();
        let (status, body) = app.get("/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let app = TestApp::new();
        let (status, _) = app.get("/chat/nope/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
