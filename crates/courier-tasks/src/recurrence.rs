use chrono::{DateTime, Duration, Months, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use courier_types::models::RecurrenceSchedule;

use crate::error::ScheduleError;

/// Upper bound on the dates one recurring message may expand into.
pub const MAX_OCCURRENCES: usize = 1000;

/// Every occurrence from `start` up to and including `end`.
///
/// Steps are taken on the wall clock in `tz`, so a daily message keeps its
/// local time of day. Monthly steps count calendar months from `start` and
/// clamp to the last day of shorter months (Jan 31 → Feb 29 → Mar 31).
pub fn recurrence_dates(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    schedule: RecurrenceSchedule,
    tz: Tz,
) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
    if end < start {
        return Err(ScheduleError::InvalidRange);
    }

    let local_start = start.with_timezone(&tz).naive_local();
    let mut dates = Vec::new();

    for step in 0.. {
        let Some(local) = nth_occurrence(local_start, schedule, step) else {
            break;
        };
        // Wall-clock times that do not exist in `tz` (DST gaps) are skipped.
        let Some(at) = tz.from_local_datetime(&local).earliest() else {
            continue;
        };
        let at = at.with_timezone(&Utc);
        if at > end {
            break;
        }
        if dates.len() == MAX_OCCURRENCES {
            return Err(ScheduleError::TooManyOccurrences { limit: MAX_OCCURRENCES });
        }
        dates.push(at);
    }

    Ok(dates)
}

fn nth_occurrence(start: NaiveDateTime, schedule: RecurrenceSchedule, n: u32) -> Option<NaiveDateTime> {
    match schedule {
        RecurrenceSchedule::Daily => start.checked_add_signed(Duration::days(n.into())),
        RecurrenceSchedule::Weekly => start.checked_add_signed(Duration::weeks(n.into())),
        RecurrenceSchedule::Monthly => start.checked_add_months(Months::new(n)),
    }
}
