use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::info;

use courier_db::Database;
use courier_db::models::{MessageRow, NewMessage};
use courier_tasks::periodic::{TaskRequest, schedule_once};
use courier_tasks::tasks::CREATE_SCHEDULE_MESSAGE;
use courier_types::api::{
    Claims, ForwardMessageRequest, MessageResponse, ReplyMessageRequest, ScheduledTaskResponse,
    SendMessageRequest,
};
use courier_types::models::ScheduledMessagePayload;

use crate::datetime::parse_field;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(MAX_LIMIT);
    let user_id = claims.sub;

    let rows = state
        .run_db(move |db| Ok(db.list_messages_for_user(user_id, limit)?))
        .await?;

    let messages: Vec<MessageResponse> = rows.into_iter().map(to_response).collect();
    Ok(Json(messages))
}

/// Store a message now, or, when `scheduled_time` is given, leave it to the
/// task worker to create at that minute.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): ApiJson<SendMessageRequest>,
) -> Result<Response, ApiError> {
    let sender_id = req.sender.unwrap_or(claims.sub);
    if sender_id != claims.sub {
        return Err(ApiError::forbidden());
    }
    let receiver_id = req.receiver;

    let tz = state.config.timezone;
    let scheduled_time = req
        .scheduled_time
        .as_deref()
        .map(|raw| parse_field("scheduled_time", raw, tz))
        .transpose()?;

    let content = req.content;

    match scheduled_time {
        Some(at) => {
            let task = state
                .run_db(move |db| {
                    ensure_user(db, "sender", sender_id)?;
                    ensure_user(db, "receiver", receiver_id)?;
                    let kwargs = serde_json::to_value(ScheduledMessagePayload {
                        is_recurring: false,
                        sender_id,
                        receiver_id: Some(receiver_id),
                        content: content.clone(),
                        scheduled_time: Some(at),
                    })
                    .map_err(anyhow::Error::from)?;
                    let request = TaskRequest {
                        title: format!("Message task - {}", content.as_deref().unwrap_or_default()),
                        task: CREATE_SCHEDULE_MESSAGE,
                        kwargs,
                    };
                    Ok(schedule_once(db, at, tz, &request)?)
                })
                .await?;

            info!(task = %task.name, sender_id, receiver_id, "Message scheduled");
            let body = ScheduledTaskResponse {
                detail: "Message scheduled".into(),
                task_name: task.name,
                scheduled_time: at,
            };
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
        None => {
            let message = state
                .run_db(move |db| {
                    ensure_user(db, "sender", sender_id)?;
                    ensure_user(db, "receiver", receiver_id)?;
                    let id = db.insert_message(&NewMessage {
                        sender_id,
                        receiver_id,
                        content,
                        ..Default::default()
                    })?;
                    load_message(db, id)
                })
                .await?;

            Ok((StatusCode::CREATED, Json(to_response(message))).into_response())
        }
    }
}

pub async fn forward_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): ApiJson<ForwardMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;

    let message = state
        .run_db(move |db| {
            let original = visible_message(db, req.message_id, caller)?;
            ensure_user(db, "receiver", req.receiver)?;
            let id = db.insert_message(&NewMessage {
                sender_id: caller,
                receiver_id: req.receiver,
                content: original.content,
                ..Default::default()
            })?;
            load_message(db, id)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(message))))
}

pub async fn reply_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): ApiJson<ReplyMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;

    let message = state
        .run_db(move |db| {
            let original = visible_message(db, req.message_id, caller)?;
            ensure_user(db, "receiver_id", req.receiver_id)?;
            let id = db.insert_message(&NewMessage {
                sender_id: caller,
                receiver_id: req.receiver_id,
                content: req.content.or(original.content),
                parent_id: Some(original.id),
                ..Default::default()
            })?;
            load_message(db, id)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(message))))
}

/// A message the caller sent or received. Anything else is reported as
/// missing so ids of other conversations do not leak.
fn visible_message(db: &Database, id: i64, caller: i64) -> Result<MessageRow, ApiError> {
    db.get_message(id)?
        .filter(|m| m.sender_id == caller || m.receiver_id == caller)
        .ok_or_else(ApiError::not_found)
}

fn ensure_user(db: &Database, field: &str, id: i64) -> Result<(), ApiError> {
    match db.get_user(id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::invalid_pk(field, id)),
    }
}

fn load_message(db: &Database, id: i64) -> Result<MessageRow, ApiError> {
    db.get_message(id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("message {id} vanished after insert")))
}

fn to_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: row.id,
        sender: row.sender_id,
        sender_name: row.sender_name,
        receiver: row.receiver_id,
        receiver_name: row.receiver_name,
        content: row.content,
        parent: row.parent_id,
        scheduled_time: row.scheduled_time,
        is_recurring: row.is_recurring,
        created_at: row.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::test_support::{TestApp, register_user};

    async fn two_users(app: &TestApp) -> (i64, i64) {
        (
            register_user(app, "Asha", "+919876543210").await,
            register_user(app, "Bala", "+919876543211").await,
        )
    }

    #[tokio::test]
    async fn send_then_list_from_both_sides() {
        let app = TestApp::new();
        let (asha, bala) = two_users(&app).await;
        let token = app.token_for(asha);

        let (status, body) = app
            .post("/chat/messages/", Some(&token), json!({ "receiver": bala, "content": "hello" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sender"], asha);
        assert_eq!(body["sender_name"], "Asha");
        assert_eq!(body["receiver_name"], "Bala");
        assert_eq!(body["content"], "hello");
        assert!(body["parent"].is_null());

        let (status, body) = app.get("/chat/messages/", Some(&app.token_for(bala))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let carol = register_user(&app, "Carol", "+919876543212").await;
        let (_, body) = app.get("/chat/messages/", Some(&app.token_for(carol))).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_honours_limit() {
        let app = TestApp::new();
        let (asha, bala) = two_users(&app).await;
        let token = app.token_for(asha);

        for i in 0..3 {
            app.post("/chat/messages/", Some(&token), json!({ "receiver": bala, "content": format!("m{i}") }))
                .await;
        }

        let (_, body) = app.get("/chat/messages/?limit=2", Some(&token)).await;
        let contents: Vec<&str> = body.as_array().unwrap().iter().map(|m| m["content"].as_str().unwrap()).collect();
        assert_eq!(contents, ["m2", "m1"]);
    }

    #[tokio::test]
    async fn send_rejects_unknown_receiver_and_spoofed_sender() {
        let app = TestApp::new();
        let (asha, bala) = two_users(&app).await;
        let token = app.token_for(asha);

        let (status, body) = app.post("/chat/messages/", Some(&token), json!({ "receiver": 404 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "receiver: Invalid pk \"404\" - object does not exist.");

        let (status, _) = app
            .post("/chat/messages/", Some(&token), json!({ "sender": bala, "receiver": asha }))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // A still-valid token for a user that no longer exists.
        let ghost = crate::auth::create_token(
            &app.state.config.jwt_secret,
            77,
            "+919876543277",
            courier_types::api::TokenType::Access,
            chrono::Duration::minutes(5),
        )
        .unwrap();
        for body in [
            json!({ "receiver": asha, "content": "now" }),
            json!({ "receiver": asha, "content": "later", "scheduled_time": "2031-01-01T09:00" }),
        ] {
            let (status, body) = app.post("/chat/messages/", Some(&ghost), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["detail"], "sender: Invalid pk \"77\" - object does not exist.");
        }
        assert!(app.state.db.list_periodic_tasks().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_receiver_is_a_detail_400() {
        let app = TestApp::new();
        let (asha, _) = two_users(&app).await;

        let (status, body) = app
            .post("/chat/messages/", Some(&app.token_for(asha)), json!({ "content": "to nobody" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("missing field `receiver`"));
    }

    #[tokio::test]
    async fn scheduled_message_becomes_a_task_not_a_row() {
        let app = TestApp::new();
        let (asha, bala) = two_users(&app).await;
        let token = app.token_for(asha);

        let (status, body) = app
            .post(
                "/chat/messages/",
                Some(&token),
                json!({ "receiver": bala, "content": "later", "scheduled_time": "2030-01-02T09:30" }),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body["task_name"].as_str().unwrap().starts_with("Message task - later - "));
        assert_eq!(body["scheduled_time"], "2030-01-02T04:00:00Z");

        assert!(app.state.db.list_messages_for_user(asha, 50).unwrap().is_empty());

        let tasks = app.state.db.list_periodic_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task, CREATE_SCHEDULE_MESSAGE);
        let kwargs: serde_json::Value = serde_json::from_str(&tasks[0].kwargs).unwrap();
        assert_eq!(kwargs["receiver_id"], bala);
        assert_eq!(kwargs["is_recurring"], false);

        let crontab = app.state.db.get_crontab(tasks[0].crontab_id).unwrap().unwrap();
        assert_eq!((crontab.hour.as_str(), crontab.minute.as_str()), ("9", "30"));
        assert_eq!((crontab.day_of_month.as_str(), crontab.month_of_year.as_str()), ("2", "1"));

        let (status, _) = app
            .post("/chat/messages/", Some(&token), json!({ "receiver": bala, "scheduled_time": "soon" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forward_copies_content_for_participants_only() {
        let app = TestApp::new();
        let (asha, bala) = two_users(&app).await;
        let carol = register_user(&app, "Carol", "+919876543212").await;

        let (_, sent) = app
            .post("/chat/messages/", Some(&app.token_for(asha)), json!({ "receiver": bala, "content": "news" }))
            .await;
        let message_id = sent["id"].as_i64().unwrap();

        let (status, body) = app
            .post(
                "/chat/forward_message/",
                Some(&app.token_for(bala)),
                json!({ "message_id": message_id, "receiver": carol }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sender"], bala);
        assert_eq!(body["receiver"], carol);
        assert_eq!(body["content"], "news");

        let (status, _) = app
            .post(
                "/chat/forward_message/",
                Some(&app.token_for(carol)),
                json!({ "message_id": message_id, "receiver": asha }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .post(
                "/chat/forward_message/",
                Some(&app.token_for(asha)),
                json!({ "message_id": 999, "receiver": carol }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reply_threads_to_parent() {
        let app = TestApp::new();
        let (asha, bala) = two_users(&app).await;

        let (_, sent) = app
            .post("/chat/messages/", Some(&app.token_for(asha)), json!({ "receiver": bala, "content": "lunch?" }))
            .await;
        let message_id = sent["id"].as_i64().unwrap();
        let token = app.token_for(bala);

        let (status, body) = app
            .post(
                "/chat/reply_message/",
                Some(&token),
                json!({ "message_id": message_id, "receiver_id": asha, "content": "yes" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["parent"], message_id);
        assert_eq!(body["content"], "yes");

        let (_, body) = app
            .post("/chat/reply_message/", Some(&token), json!({ "message_id": message_id, "receiver_id": asha }))
            .await;
        assert_eq!(body["content"], "lunch?");
    }
}
