use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};

use courier_db::models::{NewRecurringMessage, RecurringMessageRow};
use courier_tasks::periodic::{TaskRequest, schedule_once};
use courier_tasks::recurrence::recurrence_dates;
use courier_tasks::tasks::CREATE_SCHEDULE_MESSAGE;
use courier_types::api::{Claims, CreateRecurringMessageRequest, RecurringMessageResponse};
use courier_types::models::{RecurrenceSchedule, ScheduledMessagePayload};

use crate::datetime::parse_field;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

pub async fn list_recurring(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.run_db(|db| Ok(db.list_recurring_messages()?)).await?;
    let recurring: Vec<RecurringMessageResponse> = rows.into_iter().map(|row| to_response(row, None)).collect();
    Ok(Json(recurring))
}

/// Expand the schedule between `start_date` and `end_date` into one one-off
/// task per occurrence. Each task fans the message out to the distribution
/// list active when it fires.
pub async fn create_recurring(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): ApiJson<CreateRecurringMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tz = state.config.timezone;
    let start = parse_field("start_date", &req.start_date, tz)?;
    let end = parse_field("end_date", &req.end_date, tz)?;
    let dates = recurrence_dates(start, end, req.schedule, tz)?;

    let message_id = req.message;
    let schedule = req.schedule;
    let caller = claims.sub;

    let (row, scheduled) = state
        .run_db(move |db| {
            let message = db
                .get_message(message_id)?
                .ok_or_else(|| ApiError::invalid_pk("message", message_id))?;
            if message.sender_id != caller {
                return Err(ApiError::forbidden());
            }

            let id = db.insert_recurring_message(&NewRecurringMessage {
                message_id,
                start_date: start,
                end_date: end,
                schedule: schedule.as_str().to_string(),
            })?;

            let kwargs = serde_json::to_value(ScheduledMessagePayload {
                is_recurring: true,
                sender_id: message.sender_id,
                receiver_id: None,
                content: message.content.clone(),
                scheduled_time: None,
            })
            .map_err(anyhow::Error::from)?;
            let request = TaskRequest {
                title: format!("Message task - {}", message.content.as_deref().unwrap_or_default()),
                task: CREATE_SCHEDULE_MESSAGE,
                kwargs,
            };

            for at in &dates {
                schedule_once(db, *at, tz, &request)?;
            }

            let row = db
                .list_recurring_messages()?
                .into_iter()
                .find(|r| r.id == id)
                .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("recurring message {id} vanished after insert")))?;
            Ok((row, dates.len()))
        })
        .await?;

    info!(recurring_id = row.id, message_id, schedule = %schedule, scheduled, "Recurring message scheduled");
    Ok((StatusCode::CREATED, Json(to_response(row, Some(scheduled)))))
}

fn to_response(row: RecurringMessageRow, scheduled_tasks: Option<usize>) -> RecurringMessageResponse {
    let schedule = row.schedule.parse().unwrap_or_else(|e| {
        warn!(recurring_id = row.id, "Stored schedule is invalid: {}", e);
        RecurrenceSchedule::default()
    });

    RecurringMessageResponse {
        id: row.id,
        start_date: row.start_date,
        end_date: row.end_date,
        schedule,
        message: row.message_id,
        scheduled_tasks,
    }
}
