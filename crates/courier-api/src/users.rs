use std::sync::LazyLock;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use courier_db::Database;
use courier_db::models::{NewUser, UserUpdate};
use courier_types::api::{Claims, CreateUserRequest, ProfileResponse, UpdateUserRequest, UserResponse};

use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// Body limit for the profile image route, enforced by the router.
pub const MAX_PROFILE_IMG_SIZE: usize = 5 * 1024 * 1024;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("phone regex is valid"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid"));

/// POST /accounts/create_user — registers a user and its profile.
pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(req), _): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = NewUser {
        first_name: required("first_name", req.first_name)?,
        last_name: required("last_name", req.last_name)?,
        email: validate_email(&required("email", req.email)?)?,
        phone_number: validate_phone(&required("phone_number", req.phone_number)?)?,
        address: req.address,
    };

    let created = state
        .run_db(move |db| {
            ensure_unique(db, None, Some(&user.email), Some(&user.phone_number))?;
            let id = db.create_user(&user).map_err(unique_violation)?;
            load_user(db, id)
        })
        .await?;

    info!(user_id = created.id, "User created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.run_db(move |db| load_user(db, id)).await?;
    Ok(Json(user))
}

/// PUT/PATCH /accounts/manage_user/{id} — partial update of the caller's
/// own account. Omitted fields keep their value.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.sub != id {
        return Err(ApiError::forbidden());
    }

    let update = UserUpdate {
        first_name: req.first_name.map(|v| required("first_name", Some(v))).transpose()?,
        last_name: req.last_name.map(|v| required("last_name", Some(v))).transpose()?,
        email: req.email.as_deref().map(validate_email).transpose()?,
        phone_number: req.phone_number.as_deref().map(validate_phone).transpose()?,
        address: req.address,
    };

    let user = state
        .run_db(move |db| {
            if db.get_user(id)?.is_none() {
                return Err(ApiError::not_found());
            }
            ensure_unique(db, Some(id), update.email.as_deref(), update.phone_number.as_deref())?;
            db.update_user(id, &update).map_err(unique_violation)?;
            load_user(db, id)
        })
        .await?;

    Ok(Json(user))
}

/// PUT /accounts/manage_user/{id}/profile_img — raw image bytes, saved to
/// `{media_dir}/user_img/{uuid}` and linked from the profile.
pub async fn upload_profile_img(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if claims.sub != id {
        return Err(ApiError::forbidden());
    }
    if bytes.is_empty() {
        return Err(ApiError::bad_request("profile_img: The submitted file is empty."));
    }

    if state.run_db(move |db| Ok(db.get_user(id)?)).await?.is_none() {
        return Err(ApiError::not_found());
    }

    let dir = state.config.media_dir.join("user_img");
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        error!("Failed to create media directory {}: {}", dir.display(), e);
        ApiError::Internal(e.into())
    })?;

    let file_name = Uuid::new_v4().to_string();
    let file_path = dir.join(&file_name);
    let mut file = tokio::fs::File::create(&file_path).await.map_err(|e| {
        error!("Failed to create file {}: {}", file_path.display(), e);
        ApiError::Internal(e.into())
    })?;
    file.write_all(&bytes).await.map_err(|e| {
        error!("Failed to write file {}: {}", file_path.display(), e);
        ApiError::Internal(e.into())
    })?;

    let stored = format!("user_img/{file_name}");
    let result = state
        .run_db(move |db| {
            db.set_profile_img(id, &stored)?;
            load_user(db, id)
        })
        .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&file_path).await {
            error!("Failed to remove orphaned file {}: {}", file_path.display(), e);
        }
    }

    Ok(Json(result?))
}

fn load_user(db: &Database, id: i64) -> Result<UserResponse, ApiError> {
    let user = db.get_user(id)?.ok_or_else(ApiError::not_found)?;
    let profile = db.get_profile(id)?;

    Ok(UserResponse {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        phone_number: user.phone_number,
        profile: ProfileResponse {
            address: profile.as_ref().and_then(|p| p.address.clone()),
            profile_img: profile.and_then(|p| p.profile_img),
        },
    })
}

/// Reject email/phone values already held by a user other than `except`.
fn ensure_unique(
    db: &Database,
    except: Option<i64>,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(email) = email {
        if let Some(existing) = db.get_user_by_email(email)? {
            if Some(existing.id) != except {
                return Err(ApiError::bad_request("email: user with this email address already exists."));
            }
        }
    }
    if let Some(phone_number) = phone_number {
        if let Some(existing) = db.get_user_by_phone(phone_number)? {
            if Some(existing.id) != except {
                return Err(ApiError::bad_request("phone_number: user with this phone number already exists."));
            }
        }
    }
    Ok(())
}

/// The store's UNIQUE constraints back up `ensure_unique` when two requests
/// race for the same email or phone number.
fn unique_violation(e: anyhow::Error) -> ApiError {
    let Some(rusqlite::Error::SqliteFailure(failure, Some(message))) = e.downcast_ref::<rusqlite::Error>() else {
        return ApiError::Internal(e);
    };
    if failure.code != rusqlite::ErrorCode::ConstraintViolation {
        return ApiError::Internal(e);
    }

    if message.contains("users.email") {
        ApiError::bad_request("email: user with this email address already exists.")
    } else if message.contains("users.phone_number") {
        ApiError::bad_request("phone_number: user with this phone number already exists.")
    } else {
        ApiError::Internal(e)
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        None => Err(ApiError::bad_request(format!("{field}: This field is required."))),
        Some(v) if v.is_empty() => Err(ApiError::bad_request(format!("{field}: This field may not be blank."))),
        Some(v) => Ok(v),
    }
}

fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim();
    if EMAIL_RE.is_match(email) {
        Ok(email.to_string())
    } else {
        Err(ApiError::bad_request("email: Enter a valid email address."))
    }
}

fn validate_phone(phone_number: &str) -> Result<String, ApiError> {
    let phone_number = phone_number.trim();
    if PHONE_RE.is_match(phone_number) {
        Ok(phone_number.to_string())
    } else {
        Err(ApiError::bad_request(
            "phone_number: Phone number must be entered in the format: '+999999999'.",
        ))
    }
}
