use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;

use courier_db::models::{CrontabRow, NewCrontab};

use crate::error::ScheduleError;

/// Parse an IANA timezone name such as `Asia/Kolkata`.
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.parse::<Tz>()
        .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))
}

/// The five crontab fields plus the timezone they are evaluated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrontabSpec {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month_of_year: String,
    pub day_of_week: String,
    pub timezone: Tz,
}

impl CrontabSpec {
    /// Pin a crontab to the wall-clock minute of `at` in `tz`. There is no
    /// year field, so the row matches the same minute every year.
    pub fn from_datetime(at: DateTime<Utc>, tz: Tz) -> Self {
        let local = at.with_timezone(&tz);
        Self {
            minute: local.minute().to_string(),
            hour: local.hour().to_string(),
            day_of_month: local.day().to_string(),
            month_of_year: local.month().to_string(),
            day_of_week: "*".to_string(),
            timezone: tz,
        }
    }

    pub fn from_row(row: &CrontabRow) -> Result<Self, ScheduleError> {
        Ok(Self {
            minute: row.minute.clone(),
            hour: row.hour.clone(),
            day_of_month: row.day_of_month.clone(),
            month_of_year: row.month_of_year.clone(),
            day_of_week: row.day_of_week.clone(),
            timezone: parse_timezone(&row.timezone)?,
        })
    }

    pub fn to_new_row(&self) -> NewCrontab {
        NewCrontab {
            minute: self.minute.clone(),
            hour: self.hour.clone(),
            day_of_month: self.day_of_month.clone(),
            month_of_year: self.month_of_year.clone(),
            day_of_week: self.day_of_week.clone(),
            timezone: self.timezone.name().to_string(),
        }
    }

    /// Seconds-first expression understood by the `cron` crate.
    pub fn to_cron_expression(&self) -> String {
        format!(
            "0 {} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month_of_year, self.day_of_week
        )
    }

    /// Next fire time strictly after `after`, evaluated in the crontab's timezone.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        let expression = self.to_cron_expression();
        let schedule = CronSchedule::from_str(&expression).map_err(|e| {
            ScheduleError::InvalidCronExpression {
                expression: expression.clone(),
                reason: e.to_string(),
            }
        })?;

        let reference = after.with_timezone(&self.timezone);
        Ok(schedule
            .after(&reference)
            .next()
            .map(|next| next.with_timezone(&Utc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kolkata() -> Tz {
        parse_timezone("Asia/Kolkata").unwrap()
    }

    #[test]
    fn fields_come_from_local_time() {
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 4, 0, 0).unwrap();
        let spec = CrontabSpec::from_datetime(at, kolkata());

        assert_eq!(spec.minute, "30");
        assert_eq!(spec.hour, "9");
        assert_eq!(spec.day_of_month, "10");
        assert_eq!(spec.month_of_year, "3");
        assert_eq!(spec.day_of_week, "*");
        assert_eq!(spec.to_cron_expression(), "0 30 9 10 3 *");
        assert_eq!(spec.to_new_row().timezone, "Asia/Kolkata");
    }

    #[test]
    fn next_fire_time_round_trips_to_utc() {
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 4, 0, 0).unwrap();
        let spec = CrontabSpec::from_datetime(at, kolkata());

        let before = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(spec.next_after(before).unwrap(), Some(at));

        let next_year = Utc.with_ymd_and_hms(2025, 3, 10, 4, 0, 0).unwrap();
        assert_eq!(spec.next_after(at).unwrap(), Some(next_year));
    }

    #[test]
    fn bad_rows_are_reported() {
        let row = CrontabRow {
            id: 1,
            minute: "75".into(),
            hour: "9".into(),
            day_of_month: "10".into(),
            month_of_year: "3".into(),
            day_of_week: "*".into(),
            timezone: "Asia/Kolkata".into(),
        };
        let spec = CrontabSpec::from_row(&row).unwrap();
        assert!(matches!(
            spec.next_after(Utc::now()),
            Err(ScheduleError::InvalidCronExpression { .. })
        ));

        let row = CrontabRow { timezone: "Mars/Olympus".into(), ..row };
        assert!(matches!(CrontabSpec::from_row(&row), Err(ScheduleError::UnknownTimezone(_))));
    }
}
