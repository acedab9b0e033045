use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;

use courier_api::state::ApiConfig;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub beat_interval: Duration,
    pub api: ApiConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("COURIER_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("COURIER_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let timezone_name = lookup("COURIER_TIMEZONE").unwrap_or_else(|| "Asia/Kolkata".into());
        let timezone: Tz = courier_tasks::crontab::parse_timezone(&timezone_name)?;

        Ok(Self {
            host: lookup("COURIER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_var(&lookup, "COURIER_PORT", 8000)?,
            db_path: lookup("COURIER_DB_PATH").unwrap_or_else(|| "courier.db".into()).into(),
            beat_interval: Duration::from_secs(parse_var(&lookup, "COURIER_BEAT_INTERVAL_SECS", 30)?),
            api: ApiConfig {
                jwt_secret,
                timezone,
                otp_ttl: chrono::Duration::seconds(parse_var(&lookup, "COURIER_OTP_TTL_SECS", 300)?),
                access_ttl: chrono::Duration::minutes(parse_var(&lookup, "COURIER_ACCESS_TTL_MINS", 60)?),
                refresh_ttl: chrono::Duration::days(parse_var(&lookup, "COURIER_REFRESH_TTL_DAYS", 7)?),
                media_dir: lookup("COURIER_MEDIA_DIR").unwrap_or_else(|| "./media".into()).into(),
            },
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
