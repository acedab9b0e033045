use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RecurrenceSchedule;

// -- JWT Claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims issued after OTP verification and checked by the auth
/// middleware on every protected route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub phone_number: String,
    pub token_type: TokenType,
    pub exp: usize,
}

// -- Accounts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub address: Option<String>,
    pub profile_img: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub profile: ProfileResponse,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub detail: String,
    pub otp_verify_link: String,
    pub otp: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    #[serde(default)]
    pub otp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub sender: Option<i64>,
    pub receiver: i64,
    pub content: Option<String>,
    /// `%Y-%m-%dT%H:%M` in the server timezone. When present the message is
    /// delivered later by the task worker instead of being stored now.
    pub scheduled_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardMessageRequest {
    pub message_id: i64,
    pub receiver: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyMessageRequest {
    pub message_id: i64,
    pub receiver_id: i64,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: i64,
    pub sender: i64,
    pub sender_name: Option<String>,
    pub receiver: i64,
    pub receiver_name: Option<String>,
    pub content: Option<String>,
    pub parent: Option<i64>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduledTaskResponse {
    pub detail: String,
    pub task_name: String,
    pub scheduled_time: DateTime<Utc>,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub organize_by: Option<i64>,
    pub description: Option<String>,
    pub schedule_on: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: i64,
    pub title: Option<String>,
    pub organize_by: i64,
    pub description: Option<String>,
    pub schedule_on: Option<DateTime<Utc>>,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
}

// -- Message settings --

/// `is_active` is read-only: clients may echo it back, it is ignored.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessageSettingRequest {
    #[serde(default)]
    pub is_auto_sending_on: bool,
    #[serde(default)]
    pub is_recurring_on: bool,
    #[serde(default)]
    pub receptions: Vec<i64>,
    #[serde(default, rename = "is_active")]
    _is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageSettingResponse {
    pub id: i64,
    pub is_auto_sending_on: bool,
    pub is_recurring_on: bool,
    pub is_active: bool,
    pub receptions: Vec<i64>,
}

// -- Recurring messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRecurringMessageRequest {
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub schedule: RecurrenceSchedule,
    pub message: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecurringMessageResponse {
    pub id: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub schedule: RecurrenceSchedule,
    pub message: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_tasks: Option<usize>,
}
