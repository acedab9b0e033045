use anyhow::{Context, Result};
use tracing::{info, warn};

use courier_db::Database;
use courier_db::models::NewMessage;
use courier_types::models::{EventTaskPayload, ScheduledMessagePayload};

use crate::fanout::manage_receptions_message;
use crate::registry::Task;

pub const SEND_EVENT_MESSAGE: &str = "chat.tasks.send_event_message";
pub const CREATE_SCHEDULE_MESSAGE: &str = "chat.tasks.create_schedule_message";

/// Announce an event to the distribution list once, on its scheduled minute.
pub struct SendEventMessage;

impl Task for SendEventMessage {
    fn name(&self) -> &'static str {
        SEND_EVENT_MESSAGE
    }

    fn run(&self, db: &Database, kwargs: &serde_json::Value) -> Result<()> {
        let payload: EventTaskPayload =
            serde_json::from_value(kwargs.clone()).context("invalid event task kwargs")?;

        let Some(event) = db.get_event(payload.event_id)? else {
            warn!(event_id = payload.event_id, "Event no longer exists, nothing to send");
            return Ok(());
        };

        if event.is_complete {
            return Ok(());
        }

        let sent = manage_receptions_message(db, event.organize_by, event.description.as_deref(), false)?;
        db.mark_event_complete(event.id)?;

        info!(event_id = event.id, sent, "Event message sent");
        Ok(())
    }
}

/// Deliver a message that was scheduled for later. Recurring messages go to
/// the distribution list; one-shot messages go to their single receiver.
pub struct CreateScheduleMessage;

impl Task for CreateScheduleMessage {
    fn name(&self) -> &'static str {
        CREATE_SCHEDULE_MESSAGE
    }

    fn run(&self, db: &Database, kwargs: &serde_json::Value) -> Result<()> {
        let payload: ScheduledMessagePayload =
            serde_json::from_value(kwargs.clone()).context("invalid scheduled message kwargs")?;

        if payload.is_recurring {
            let sent =
                manage_receptions_message(db, payload.sender_id, payload.content.as_deref(), true)?;
            info!(sender_id = payload.sender_id, sent, "Recurring message sent");
            return Ok(());
        }

        let receiver_id = payload
            .receiver_id
            .context("scheduled message has no receiver")?;

        let id = db.insert_message(&NewMessage {
            sender_id: payload.sender_id,
            receiver_id,
            content: payload.content,
            scheduled_time: payload.scheduled_time,
            ..Default::default()
        })?;

        info!(message_id = id, sender_id = payload.sender_id, receiver_id, "Scheduled message delivered");
        Ok(())
    }
}
