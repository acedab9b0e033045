//! Beat worker: polls periodic tasks and fires the due ones.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use courier_db::Database;
use courier_db::models::PeriodicTaskRow;

use crate::crontab::CrontabSpec;
use crate::registry::TaskRegistry;

pub struct Beat {
    db: Arc<Database>,
    registry: Arc<TaskRegistry>,
    interval: Duration,
}

impl Beat {
    pub fn new(db: Arc<Database>, registry: Arc<TaskRegistry>, interval: Duration) -> Self {
        Self { db, registry, interval }
    }

    /// Poll until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            tasks = ?self.registry.names(),
            "Beat worker started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => self.tick().await,
            }
        }

        info!("Beat worker stopped");
    }

    async fn tick(&self) {
        let db = Arc::clone(&self.db);
        let registry = Arc::clone(&self.registry);

        match tokio::task::spawn_blocking(move || run_due(&db, &registry, Utc::now())).await {
            Ok(Ok(0)) => {}
            Ok(Ok(ran)) => debug!(ran, "Beat tick complete"),
            Ok(Err(e)) => error!("Beat tick failed: {:#}", e),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }
    }
}

/// Run every enabled task whose next fire time is at or before `now`.
///
/// A task's next fire time is measured from its last run, or from its
/// creation when it has never run. Returns how many tasks were fired.
pub fn run_due(db: &Database, registry: &TaskRegistry, now: DateTime<Utc>) -> Result<usize> {
    let mut ran = 0;

    for scheduled in db.enabled_periodic_tasks()? {
        let task = &scheduled.task;

        let spec = match CrontabSpec::from_row(&scheduled.crontab) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(task = %task.name, "Skipping task with bad crontab: {}", e);
                continue;
            }
        };

        let anchor = task.last_run_at.unwrap_or(task.created_at);
        let next = match spec.next_after(anchor) {
            Ok(Some(next)) => next,
            Ok(None) => continue,
            Err(e) => {
                warn!(task = %task.name, "Skipping task with bad crontab: {}", e);
                continue;
            }
        };

        if next > now {
            continue;
        }

        execute(db, registry, task);

        // Recorded even on failure so one-off tasks cannot fire in a loop.
        db.record_task_run(task.id, now)?;
        ran += 1;
    }

    Ok(ran)
}

fn execute(db: &Database, registry: &TaskRegistry, task: &PeriodicTaskRow) {
    let Some(handler) = registry.get(&task.task) else {
        warn!(task = %task.name, name = %task.task, "No handler registered for task");
        return;
    };

    let kwargs: serde_json::Value = match serde_json::from_str(&task.kwargs) {
        Ok(kwargs) => kwargs,
        Err(e) => {
            error!(task = %task.name, "Corrupt task kwargs: {}", e);
            return;
        }
    };

    match handler.run(db, &kwargs) {
        Ok(()) => info!(task = %task.name, "Task succeeded"),
        Err(e) => error!(task = %task.name, "Task failed: {:#}", e),
    }
}
