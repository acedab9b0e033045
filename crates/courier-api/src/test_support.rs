//! Router harness shared by the handler tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use courier_db::Database;
use courier_types::api::TokenType;

use crate::auth::create_token;
use crate::routes::router;
use crate::state::{ApiConfig, AppState, AppStateInner};

pub const TEST_HOST: &str = "courier.test";

pub struct TestApp {
    pub state: AppState,
    router: Router,
    _media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        let config = ApiConfig {
            jwt_secret: "test-secret".into(),
            timezone: "Asia/Kolkata".parse().unwrap(),
            otp_ttl: chrono::Duration::minutes(5),
            access_ttl: chrono::Duration::minutes(60),
            refresh_ttl: chrono::Duration::days(7),
            media_dir: media.path().to_path_buf(),
        };
        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = AppStateInner::new(db, config);

        Self {
            router: router(state.clone()),
            state,
            _media: media,
        }
    }

    /// Access token for an existing user.
    pub fn token_for(&self, user_id: i64) -> String {
        let user = self.state.db.get_user(user_id).unwrap().unwrap();
        create_token(
            &self.state.config.jwt_secret,
            user.id,
            &user.phone_number,
            TokenType::Access,
            self.state.config.access_ttl,
        )
        .unwrap()
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, token, Some(body)).await
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, path, token, Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, path, token, Some(body)).await
    }

    pub async fn put_bytes(&self, path: &str, token: Option<&str>, bytes: Vec<u8>) -> (StatusCode, Value) {
        let builder = self
            .request(Method::PUT, path, token)
            .header(header::CONTENT_TYPE, "application/octet-stream");
        self.dispatch(builder.body(Body::from(bytes)).unwrap()).await
    }

    async fn send(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let builder = self.request(method, path, token);
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(req).await
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::HOST, TEST_HOST);
        match token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn dispatch(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }
}

/// Create a user through the public endpoint and return its id.
pub async fn register_user(app: &TestApp, first_name: &str, phone_number: &str) -> i64 {
    let (status, body) = app
        .post(
            "/accounts/create_user",
            None,
            json!({
                "first_name": first_name,
                "last_name": "Test",
                "email": format!("{}@example.com", first_name.to_lowercase()),
                "phone_number": phone_number,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}
