use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::ApiError;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Accepts RFC 3339, or a naive timestamp read as wall-clock time in `tz`.
pub fn parse_datetime(input: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(input, format).ok()?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

pub fn parse_field(field: &str, input: &str, tz: Tz) -> Result<DateTime<Utc>, ApiError> {
    parse_datetime(input, tz).ok_or_else(|| {
        ApiError::bad_request(format!(
            "{field}: Datetime has wrong format. Use one of these formats instead: \
             YYYY-MM-DDThh:mm[:ss][+HH:MM|-HH:MM|Z]."
        ))
    })
}
