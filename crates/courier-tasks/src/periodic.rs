use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rand::Rng;
use tracing::debug;

use courier_db::Database;
use courier_db::models::{CrontabRow, NewPeriodicTask, PeriodicTaskRow};

use crate::crontab::CrontabSpec;

const NAME_SUFFIX_LEN: usize = 10;

/// A unit of deferred work, not yet bound to a crontab.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub title: String,
    pub task: &'static str,
    pub kwargs: serde_json::Value,
}

/// Get or create the crontab row that fires at the local minute of `at`.
pub fn create_cronjob(db: &Database, at: DateTime<Utc>, tz: Tz) -> Result<CrontabRow> {
    let spec = CrontabSpec::from_datetime(at, tz);
    db.get_or_create_crontab(&spec.to_new_row())
}

/// Register a one-off periodic task driven by `crontab`.
pub fn manage_periodic_task(
    db: &Database,
    request: &TaskRequest,
    crontab: &CrontabRow,
) -> Result<PeriodicTaskRow> {
    let task = db.create_periodic_task(&NewPeriodicTask {
        name: format!("{} - {}", request.title, random_suffix()),
        task: request.task.to_string(),
        crontab_id: crontab.id,
        kwargs: serde_json::to_string(&request.kwargs)?,
        one_off: true,
    })?;

    debug!(task = %task.name, crontab_id = crontab.id, "Periodic task registered");
    Ok(task)
}

/// Crontab plus one-off task for a single point in time.
pub fn schedule_once(
    db: &Database,
    at: DateTime<Utc>,
    tz: Tz,
    request: &TaskRequest,
) -> Result<PeriodicTaskRow> {
    let crontab = create_cronjob(db, at, tz)?;
    manage_periodic_task(db, request, &crontab)
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..NAME_SUFFIX_LEN)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}
