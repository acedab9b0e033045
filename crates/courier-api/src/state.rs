use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use chrono_tz::Tz;
use tracing::error;

use courier_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

/// Settings the handlers need at request time.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub jwt_secret: String,
    /// Zone used for naive datetimes in requests and for crontab rows.
    pub timezone: Tz,
    pub otp_ttl: Duration,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub media_dir: PathBuf,
}

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub config: ApiConfig,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, config: ApiConfig) -> AppState {
        Arc::new(Self { db, config })
    }

    /// Run blocking DB work off the async runtime.
    pub async fn run_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(anyhow::anyhow!("blocking task failed"))
            })?
    }
}
