use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use crate::models::{CrontabRow, NewCrontab, NewPeriodicTask, PeriodicTaskRow, ScheduledTaskRow};
use crate::queries::OptionalExt;
use crate::Database;

const TASK_COLUMNS: &str = "t.id, t.name, t.task, t.crontab_id, t.kwargs, t.one_off, t.enabled, \
                            t.last_run_at, t.total_run_count, t.created_at";

impl Database {
    // -- Crontab schedules --

    /// Return the crontab row with exactly these fields, creating it if needed.
    pub fn get_or_create_crontab(&self, crontab: &NewCrontab) -> Result<CrontabRow> {
        self.with_tx(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO crontab_schedules
                    (minute, hour, day_of_month, month_of_year, day_of_week, timezone)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    crontab.minute,
                    crontab.hour,
                    crontab.day_of_month,
                    crontab.month_of_year,
                    crontab.day_of_week,
                    crontab.timezone
                ],
            )?;

            let row = conn.query_row(
                "SELECT id, minute, hour, day_of_month, month_of_year, day_of_week, timezone
                 FROM crontab_schedules
                 WHERE minute = ?1 AND hour = ?2 AND day_of_month = ?3
                   AND month_of_year = ?4 AND day_of_week = ?5 AND timezone = ?6",
                rusqlite::params![
                    crontab.minute,
                    crontab.hour,
                    crontab.day_of_month,
                    crontab.month_of_year,
                    crontab.day_of_week,
                    crontab.timezone
                ],
                |row| crontab_from_row(row, 0),
            )?;
            Ok(row)
        })
    }

    pub fn get_crontab(&self, id: i64) -> Result<Option<CrontabRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, minute, hour, day_of_month, month_of_year, day_of_week, timezone
                 FROM crontab_schedules WHERE id = ?1",
                [id],
                |row| crontab_from_row(row, 0),
            )
            .optional()
        })
    }

    // -- Periodic tasks --

    pub fn create_periodic_task(&self, task: &NewPeriodicTask) -> Result<PeriodicTaskRow> {
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO periodic_tasks (name, task, crontab_id, kwargs, one_off, enabled, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
                rusqlite::params![task.name, task.task, task.crontab_id, task.kwargs, task.one_off, now],
            )?;
            let id = conn.last_insert_rowid();
            query_task(conn, id)
        })
    }

    pub fn list_periodic_tasks(&self) -> Result<Vec<PeriodicTaskRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {TASK_COLUMNS} FROM periodic_tasks t ORDER BY t.id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], task_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Enabled tasks joined with their crontab, oldest first.
    pub fn enabled_periodic_tasks(&self) -> Result<Vec<ScheduledTaskRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TASK_COLUMNS},
                        c.id, c.minute, c.hour, c.day_of_month, c.month_of_year, c.day_of_week, c.timezone
                 FROM periodic_tasks t
                 JOIN crontab_schedules c ON c.id = t.crontab_id
                 WHERE t.enabled = 1
                 ORDER BY t.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ScheduledTaskRow {
                        task: task_from_row(row)?,
                        crontab: crontab_from_row(row, 10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Stamp a run. One-off tasks are disabled so they never fire again.
    pub fn record_task_run(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE periodic_tasks SET
                    last_run_at     = ?2,
                    total_run_count = total_run_count + 1,
                    enabled         = CASE WHEN one_off = 1 THEN 0 ELSE enabled END,
                    updated_at      = ?2
                 WHERE id = ?1",
                rusqlite::params![id, at],
            )?;
            Ok(())
        })
    }
}

fn query_task(conn: &Connection, id: i64) -> Result<PeriodicTaskRow> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM periodic_tasks t WHERE t.id = ?1");
    Ok(conn.query_row(&sql, [id], task_from_row)?)
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<PeriodicTaskRow> {
    Ok(PeriodicTaskRow {
        id: row.get(0)?,
        name: row.get(1)?,
        task: row.get(2)?,
        crontab_id: row.get(3)?,
        kwargs: row.get(4)?,
        one_off: row.get(5)?,
        enabled: row.get(6)?,
        last_run_at: row.get(7)?,
        total_run_count: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn crontab_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<CrontabRow> {
    Ok(CrontabRow {
        id: row.get(offset)?,
        minute: row.get(offset + 1)?,
        hour: row.get(offset + 2)?,
        day_of_month: row.get(offset + 3)?,
        month_of_year: row.get(offset + 4)?,
        day_of_week: row.get(offset + 5)?,
        timezone: row.get(offset + 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crontab() -> NewCrontab {
        NewCrontab {
            minute: "30".into(),
            hour: "9".into(),
            day_of_month: "18".into(),
            month_of_year: "10".into(),
            day_of_week: "*".into(),
            timezone: "Asia/Kolkata".into(),
        }
    }

    #[test]
    fn crontab_rows_are_shared() {
        let db = Database::open_in_memory().unwrap();
        let first = db.get_or_create_crontab(&crontab()).unwrap();
        let second = db.get_or_create_crontab(&crontab()).unwrap();
        assert_eq!(first, second);

        let other = db
            .get_or_create_crontab(&NewCrontab { minute: "31".into(), ..crontab() })
            .unwrap();
        assert_ne!(first.id, other.id);
        assert_eq!(db.get_crontab(other.id).unwrap().unwrap().minute, "31");
    }

    #[test]
    fn one_off_task_is_disabled_after_run() {
        let db = Database::open_in_memory().unwrap();
        let cron = db.get_or_create_crontab(&crontab()).unwrap();

        let one_off = db
            .create_periodic_task(&NewPeriodicTask {
                name: "event task - launch - abcdefghij".into(),
                task: "chat.tasks.send_event_message".into(),
                crontab_id: cron.id,
                kwargs: r#"{"event_id":1}"#.into(),
                one_off: true,
            })
            .unwrap();
        let repeating = db
            .create_periodic_task(&NewPeriodicTask {
                name: "digest".into(),
                task: "chat.tasks.create_schedule_message".into(),
                crontab_id: cron.id,
                kwargs: "{}".into(),
                one_off: false,
            })
            .unwrap();
        assert!(one_off.enabled);
        assert_eq!(one_off.total_run_count, 0);

        let enabled = db.enabled_periodic_tasks().unwrap();
        assert_eq!(enabled.len(), 2);
        assert_eq!(enabled[0].crontab, cron);

        let now = Utc::now();
        db.record_task_run(one_off.id, now).unwrap();
        db.record_task_run(repeating.id, now).unwrap();

        let enabled = db.enabled_periodic_tasks().unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].task.id, repeating.id);
        assert_eq!(enabled[0].task.total_run_count, 1);
        assert!(enabled[0].task.last_run_at.is_some());

        let all = db.list_periodic_tasks().unwrap();
        assert!(!all[0].enabled);
        assert_eq!(all[0].total_run_count, 1);
    }

    #[test]
    fn task_names_are_unique() {
        let db = Database::open_in_memory().unwrap();
        let cron = db.get_or_create_crontab(&crontab()).unwrap();
        let task = NewPeriodicTask {
            name: "same".into(),
            task: "chat.tasks.send_event_message".into(),
            crontab_id: cron.id,
            kwargs: "{}".into(),
            one_off: true,
        };
        db.create_periodic_task(&task).unwrap();
        assert!(db.create_periodic_task(&task).is_err());
    }
}
