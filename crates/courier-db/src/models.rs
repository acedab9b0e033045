//! Database row types. These map directly to SQLite rows and stay
//! independent of the courier-types API models.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: Option<String>,
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProfileRow {
    pub id: i64,
    pub user_id: i64,
    pub address: Option<String>,
    pub profile_img: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub sender_name: Option<String>,
    pub receiver_id: i64,
    pub receiver_name: Option<String>,
    pub content: Option<String>,
    pub parent_id: Option<i64>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: Option<String>,
    pub parent_id: Option<i64>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub is_recurring: bool,
}

#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: i64,
    pub title: Option<String>,
    pub organize_by: i64,
    pub schedule_on: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: Option<String>,
    pub organize_by: i64,
    pub schedule_on: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageSettingRow {
    pub id: i64,
    pub is_auto_sending_on: bool,
    pub is_recurring_on: bool,
    pub is_active: bool,
    pub receptions: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewMessageSetting {
    pub is_auto_sending_on: bool,
    pub is_recurring_on: bool,
    pub receptions: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct RecurringMessageRow {
    pub id: i64,
    pub message_id: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub schedule: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecurringMessage {
    pub message_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub schedule: String,
}

/// Crontab fields are stored as text, the same way cron expressions are
/// written, so `*` and lists survive round trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrontabRow {
    pub id: i64,
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month_of_year: String,
    pub day_of_week: String,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCrontab {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month_of_year: String,
    pub day_of_week: String,
    pub timezone: String,
}

#[derive(Debug, Clone)]
pub struct PeriodicTaskRow {
    pub id: i64,
    pub name: String,
    pub task: String,
    pub crontab_id: i64,
    pub kwargs: String,
    pub one_off: bool,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub total_run_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPeriodicTask {
    pub name: String,
    pub task: String,
    pub crontab_id: i64,
    pub kwargs: String,
    pub one_off: bool,
}

/// An enabled periodic task joined with the crontab that drives it.
#[derive(Debug, Clone)]
pub struct ScheduledTaskRow {
    pub task: PeriodicTaskRow,
    pub crontab: CrontabRow,
}
