use std::collections::HashMap;

use crate::models::{
    EventRow, MessageRow, MessageSettingRow, NewEvent, NewMessage, NewMessageSetting,
    NewRecurringMessage, NewUser, ProfileRow, RecurringMessageRow, UserRow, UserUpdate,
};
use crate::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str = "id, first_name, last_name, email, phone_number, otp_hash, \
                            otp_expires_at, last_login, created_at, updated_at";

const MESSAGE_SELECT: &str =
    "SELECT m.id, m.sender_id, s.first_name, m.receiver_id, r.first_name, m.content,
            m.parent_id, m.scheduled_time, m.is_recurring, m.created_at
     FROM messages m
     LEFT JOIN users s ON s.id = m.sender_id
     LEFT JOIN users r ON r.id = m.receiver_id";

const EVENT_COLUMNS: &str =
    "id, title, organize_by, schedule_on, description, is_complete, created_at";

impl Database {
    // -- Users --

    /// Insert a user together with its (possibly empty) profile.
    pub fn create_user(&self, user: &NewUser) -> Result<i64> {
        let now = Utc::now();
        self.with_tx(|conn| {
            conn.execute(
                "INSERT INTO users (first_name, last_name, email, phone_number, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![user.first_name, user.last_name, user.email, user.phone_number, now],
            )?;
            let user_id = conn.last_insert_rowid();

            conn.execute(
                "INSERT INTO user_profiles (user_id, address, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                rusqlite::params![user_id, user.address, now],
            )?;

            Ok(user_id)
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id))
    }

    pub fn get_user_by_phone(&self, phone_number: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "phone_number", &phone_number))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", &email))
    }

    /// Returns the subset of `ids` that do not belong to any user.
    pub fn missing_user_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT 1 FROM users WHERE id = ?1")?;
            let mut missing = Vec::new();
            for id in ids {
                if !stmt.exists([id])? {
                    missing.push(*id);
                }
            }
            Ok(missing)
        })
    }

    pub fn get_profile(&self, user_id: i64) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, address, profile_img FROM user_profiles WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(ProfileRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        address: row.get(2)?,
                        profile_img: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn update_user(&self, id: i64, update: &UserUpdate) -> Result<()> {
        let now = Utc::now();
        self.with_tx(|conn| {
            conn.execute(
                "UPDATE users SET
                    first_name   = COALESCE(?2, first_name),
                    last_name    = COALESCE(?3, last_name),
                    email        = COALESCE(?4, email),
                    phone_number = COALESCE(?5, phone_number),
                    updated_at   = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.first_name,
                    update.last_name,
                    update.email,
                    update.phone_number,
                    now
                ],
            )?;

            if let Some(address) = &update.address {
                upsert_profile_column(conn, id, "address", address, now)?;
            }
            Ok(())
        })
    }

    pub fn set_profile_img(&self, user_id: i64, path: &str) -> Result<()> {
        let now = Utc::now();
        self.with_conn(|conn| upsert_profile_column(conn, user_id, "profile_img", path, now))
    }

    pub fn set_otp(&self, user_id: i64, otp_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET otp_hash = ?2, otp_expires_at = ?3, updated_at = ?4 WHERE id = ?1",
                rusqlite::params![user_id, otp_hash, expires_at, Utc::now()],
            )?;
            Ok(())
        })
    }

    /// Consume the pending OTP and stamp the login time.
    pub fn complete_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET otp_hash = NULL, otp_expires_at = NULL, last_login = ?2, updated_at = ?2
                 WHERE id = ?1",
                rusqlite::params![user_id, at],
            )?;
            Ok(())
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &NewMessage) -> Result<i64> {
        self.with_conn(|conn| {
            insert_message_row(conn, message, Utc::now())?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Insert many messages atomically. Returns how many were written.
    pub fn insert_messages(&self, messages: &[NewMessage]) -> Result<usize> {
        if messages.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        self.with_tx(|conn| {
            for message in messages {
                insert_message_row(conn, message, now)?;
            }
            Ok(messages.len())
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
            conn.query_row(&sql, [id], message_from_row).optional()
        })
    }

    /// Messages the user sent or received, newest first.
    pub fn list_messages_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE m.sender_id = ?1 OR m.receiver_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Events --

    pub fn insert_event(&self, event: &NewEvent) -> Result<i64> {
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (title, organize_by, schedule_on, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![event.title, event.organize_by, event.schedule_on, event.description, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_event(&self, id: i64) -> Result<Option<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
            conn.query_row(&sql, [id], event_from_row).optional()
        })
    }

    pub fn list_events(&self) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], event_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn mark_event_complete(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE events SET is_complete = 1, updated_at = ?2 WHERE id = ?1",
                rusqlite::params![id, Utc::now()],
            )?;
            Ok(())
        })
    }

    // -- Message settings --

    /// Store a new setting as the only active one.
    pub fn create_message_setting(&self, setting: &NewMessageSetting) -> Result<i64> {
        let now = Utc::now();
        self.with_tx(|conn| {
            conn.execute(
                "UPDATE message_settings SET is_active = 0, updated_at = ?1 WHERE is_active = 1",
                [now],
            )?;
            conn.execute(
                "INSERT INTO message_settings (is_auto_sending_on, is_recurring_on, is_active, created_at, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?3)",
                rusqlite::params![setting.is_auto_sending_on, setting.is_recurring_on, now],
            )?;
            let setting_id = conn.last_insert_rowid();

            let mut stmt = conn.prepare(
                "INSERT OR IGNORE INTO message_setting_receptions (setting_id, user_id) VALUES (?1, ?2)",
            )?;
            for user_id in &setting.receptions {
                stmt.execute(rusqlite::params![setting_id, user_id])?;
            }

            Ok(setting_id)
        })
    }

    pub fn list_message_settings(&self) -> Result<Vec<MessageSettingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, is_auto_sending_on, is_recurring_on, is_active, created_at
                 FROM message_settings ORDER BY id",
            )?;
            let mut rows = stmt
                .query_map([], setting_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut receptions: HashMap<i64, Vec<i64>> = HashMap::new();
            let mut stmt = conn.prepare(
                "SELECT setting_id, user_id FROM message_setting_receptions ORDER BY setting_id, user_id",
            )?;
            let pairs = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
            for pair in pairs {
                let (setting_id, user_id) = pair?;
                receptions.entry(setting_id).or_default().push(user_id);
            }

            for row in &mut rows {
                row.receptions = receptions.remove(&row.id).unwrap_or_default();
            }
            Ok(rows)
        })
    }

    pub fn get_active_message_setting(&self) -> Result<Option<MessageSettingRow>> {
        self.with_conn(|conn| {
            let setting = conn
                .query_row(
                    "SELECT id, is_auto_sending_on, is_recurring_on, is_active, created_at
                     FROM message_settings WHERE is_active = 1 ORDER BY id DESC LIMIT 1",
                    [],
                    setting_from_row,
                )
                .optional()?;

            let Some(mut setting) = setting else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT user_id FROM message_setting_receptions WHERE setting_id = ?1 ORDER BY user_id",
            )?;
            setting.receptions = stmt
                .query_map([setting.id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Some(setting))
        })
    }

    // -- Recurring messages --

    pub fn insert_recurring_message(&self, recurring: &NewRecurringMessage) -> Result<i64> {
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO recurring_messages (message_id, start_date, end_date, schedule, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![
                    recurring.message_id,
                    recurring.start_date,
                    recurring.end_date,
                    recurring.schedule,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_recurring_messages(&self) -> Result<Vec<RecurringMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message_id, start_date, end_date, schedule, created_at
                 FROM recurring_messages ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(RecurringMessageRow {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        start_date: row.get(2)?,
                        end_date: row.get(3)?,
                        schedule: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &dyn rusqlite::ToSql) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                email: row.get(3)?,
                phone_number: row.get(4)?,
                otp_hash: row.get(5)?,
                otp_expires_at: row.get(6)?,
                last_login: row.get(7)?,
                created_at: row.get(8)?,
                updated_at: row.get(9)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn upsert_profile_column(
    conn: &Connection,
    user_id: i64,
    column: &str,
    value: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO user_profiles (user_id, {column}, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(user_id) DO UPDATE SET {column} = excluded.{column}, updated_at = excluded.updated_at"
    );
    conn.execute(&sql, rusqlite::params![user_id, value, now])?;
    Ok(())
}

fn insert_message_row(conn: &Connection, message: &NewMessage, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (sender_id, receiver_id, content, parent_id, scheduled_time, is_recurring, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        rusqlite::params![
            message.sender_id,
            message.receiver_id,
            message.content,
            message.parent_id,
            message.scheduled_time,
            message.is_recurring,
            now
        ],
    )?;
    Ok(())
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_name: row.get(2)?,
        receiver_id: row.get(3)?,
        receiver_name: row.get(4)?,
        content: row.get(5)?,
        parent_id: row.get(6)?,
        scheduled_time: row.get(7)?,
        is_recurring: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        title: row.get(1)?,
        organize_by: row.get(2)?,
        schedule_on: row.get(3)?,
        description: row.get(4)?,
        is_complete: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn setting_from_row(row: &Row<'_>) -> rusqlite::Result<MessageSettingRow> {
    Ok(MessageSettingRow {
        id: row.get(0)?,
        is_auto_sending_on: row.get(1)?,
        is_recurring_on: row.get(2)?,
        is_active: row.get(3)?,
        receptions: Vec::new(),
        created_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
