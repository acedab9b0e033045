use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name      TEXT NOT NULL,
            last_name       TEXT NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            phone_number    TEXT NOT NULL UNIQUE,
            otp_hash        TEXT,
            otp_expires_at  TEXT,
            last_login      TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            UNIQUE(email, phone_number)
        );

        CREATE TABLE IF NOT EXISTS user_profiles (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            address         TEXT,
            profile_img     TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            receiver_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content         TEXT,
            parent_id       INTEGER REFERENCES messages(id) ON DELETE CASCADE,
            scheduled_time  TEXT,
            is_recurring    INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(sender_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_receiver
            ON messages(receiver_id, created_at);

        CREATE TABLE IF NOT EXISTS events (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            title           TEXT CHECK (title IS NULL OR length(title) <= 100),
            organize_by     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            schedule_on     TEXT,
            description     TEXT,
            is_complete     INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS message_settings (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            is_auto_sending_on  INTEGER NOT NULL DEFAULT 0,
            is_recurring_on     INTEGER NOT NULL DEFAULT 0,
            is_active           INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS message_setting_receptions (
            setting_id  INTEGER NOT NULL REFERENCES message_settings(id) ON DELETE CASCADE,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (setting_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS recurring_messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id  INTEGER REFERENCES messages(id) ON DELETE CASCADE,
            start_date  TEXT,
            end_date    TEXT,
            schedule    TEXT NOT NULL DEFAULT 'daily',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS crontab_schedules (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            minute          TEXT NOT NULL,
            hour            TEXT NOT NULL,
            day_of_month    TEXT NOT NULL,
            month_of_year   TEXT NOT NULL,
            day_of_week     TEXT NOT NULL,
            timezone        TEXT NOT NULL,
            UNIQUE(minute, hour, day_of_month, month_of_year, day_of_week, timezone)
        );

        CREATE TABLE IF NOT EXISTS periodic_tasks (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL UNIQUE,
            task            TEXT NOT NULL,
            crontab_id      INTEGER NOT NULL REFERENCES crontab_schedules(id) ON DELETE CASCADE,
            kwargs          TEXT NOT NULL DEFAULT '{}',
            one_off         INTEGER NOT NULL DEFAULT 0,
            enabled         INTEGER NOT NULL DEFAULT 1,
            last_run_at     TEXT,
            total_run_count INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_periodic_tasks_enabled
            ON periodic_tasks(enabled);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
