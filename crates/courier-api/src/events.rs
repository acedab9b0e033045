use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use courier_db::models::{EventRow, NewEvent};
use courier_tasks::periodic::{TaskRequest, schedule_once};
use courier_tasks::tasks::SEND_EVENT_MESSAGE;
use courier_types::api::{Claims, CreateEventRequest, EventResponse};
use courier_types::models::EventTaskPayload;

use crate::datetime::parse_field;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

const MAX_TITLE_LEN: usize = 100;

pub async fn list_events(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.run_db(|db| Ok(db.list_events()?)).await?;
    let events: Vec<EventResponse> = rows.into_iter().map(to_response).collect();
    Ok(Json(events))
}

/// Create an event. A `schedule_on` time also queues the announcement to
/// the distribution list for that minute.
pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): ApiJson<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    if title.as_ref().is_some_and(|t| t.chars().count() > MAX_TITLE_LEN) {
        return Err(ApiError::bad_request(format!(
            "title: Ensure this field has no more than {MAX_TITLE_LEN} characters."
        )));
    }

    let tz = state.config.timezone;
    let schedule_on = req
        .schedule_on
        .as_deref()
        .map(|raw| parse_field("schedule_on", raw, tz))
        .transpose()?;

    let event = NewEvent {
        title,
        organize_by: req.organize_by.unwrap_or(claims.sub),
        schedule_on,
        description: req.description,
    };

    let row = state
        .run_db(move |db| {
            if db.get_user(event.organize_by)?.is_none() {
                return Err(ApiError::invalid_pk("organize_by", event.organize_by));
            }

            let id = db.insert_event(&event)?;

            if let Some(at) = event.schedule_on {
                let request = TaskRequest {
                    title: format!("event task - {}", event.title.as_deref().unwrap_or_default()),
                    task: SEND_EVENT_MESSAGE,
                    kwargs: serde_json::to_value(EventTaskPayload { event_id: id })
                        .map_err(anyhow::Error::from)?,
                };
                let task = schedule_once(db, at, tz, &request)?;
                info!(event_id = id, task = %task.name, "Event announcement scheduled");
            }

            db.get_event(id)?
                .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("event {id} vanished after insert")))
        })
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(row))))
}

fn to_response(row: EventRow) -> EventResponse {
    EventResponse {
        id: row.id,
        title: row.title,
        organize_by: row.organize_by,
        description: row.description,
        schedule_on: row.schedule_on,
        is_complete: row.is_complete,
        created_at: row.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    use courier_db::models::NewMessageSetting;
    use courier_tasks::beat::run_due;
    use courier_tasks::registry::TaskRegistry;

    use crate::test_support::{TestApp, register_user};

    #[tokio::test]
    async fn organizer_defaults_to_caller() {
        let app = TestApp::new();
        let asha = register_user(&app, "Asha", "+919876543210").await;
        let token = app.token_for(asha);

        let (status, body) = app
            .post("/chat/events/", Some(&token), json!({ "title": "Standup", "description": "daily sync" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["organize_by"], asha);
        assert_eq!(body["is_complete"], false);
        assert!(body["schedule_on"].is_null());
        assert!(app.state.db.list_periodic_tasks().unwrap().is_empty());

        let (status, body) = app.get("/chat/events/", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "Standup");

        let (status, _) = app
            .post("/chat/events/", Some(&token), json!({ "title": "x", "organize_by": 77 }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post("/chat/events/", Some(&token), json!({ "title": "x".repeat(101) }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn scheduled_event_is_announced_by_the_worker() {
        let app = TestApp::new();
        let asha = register_user(&app, "Asha", "+919876543210").await;
        let bala = register_user(&app, "Bala", "+919876543211").await;
        let carol = register_user(&app, "Carol", "+919876543212").await;
        app.state
            .db
            .create_message_setting(&NewMessageSetting {
                is_auto_sending_on: true,
                is_recurring_on: false,
                receptions: vec![bala, carol],
            })
            .unwrap();

        let (status, body) = app
            .post(
                "/chat/events/",
                Some(&app.token_for(asha)),
                json!({ "title": "Launch", "description": "we ship", "schedule_on": "2031-05-06T10:15" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let event_id = body["id"].as_i64().unwrap();

        let tasks = app.state.db.list_periodic_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].name.starts_with("event task - Launch - "));
        assert_eq!(tasks[0].task, SEND_EVENT_MESSAGE);

        let registry = TaskRegistry::with_chat_tasks();
        assert_eq!(run_due(&app.state.db, &registry, Utc::now()).unwrap(), 0);

        // The crontab has no year, so the first match after creation is the
        // upcoming May 6th.
        let far = Utc::now() + Duration::days(400);
        assert_eq!(run_due(&app.state.db, &registry, far).unwrap(), 1);

        let event = app.state.db.get_event(event_id).unwrap().unwrap();
        assert!(event.is_complete);
        let inbox = app.state.db.list_messages_for_user(carol, 50).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].content.as_deref(), Some("we ship"));
        assert_eq!(inbox[0].sender_id, asha);
    }
}
