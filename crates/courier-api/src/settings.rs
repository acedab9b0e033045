use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use courier_db::models::{MessageSettingRow, NewMessageSetting};
use courier_types::api::{Claims, CreateMessageSettingRequest, MessageSettingResponse};

use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

pub async fn list_settings(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.run_db(|db| Ok(db.list_message_settings()?)).await?;
    let settings: Vec<MessageSettingResponse> = rows.into_iter().map(to_response).collect();
    Ok(Json(settings))
}

/// Store a new distribution list. It becomes the active one and every
/// earlier setting is deactivated.
pub async fn create_setting(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): ApiJson<CreateMessageSettingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut receptions = req.receptions;
    receptions.sort_unstable();
    receptions.dedup();

    let setting = NewMessageSetting {
        is_auto_sending_on: req.is_auto_sending_on,
        is_recurring_on: req.is_recurring_on,
        receptions,
    };

    let row = state
        .run_db(move |db| {
            if let Some(&missing) = db.missing_user_ids(&setting.receptions)?.first() {
                return Err(ApiError::invalid_pk("receptions", missing));
            }
            let id = db.create_message_setting(&setting)?;
            db.get_active_message_setting()?
                .filter(|s| s.id == id)
                .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("setting {id} is not active after insert")))
        })
        .await?;

    info!(setting_id = row.id, receptions = row.receptions.len(), by = claims.sub, "Message setting activated");
    Ok((StatusCode::CREATED, Json(to_response(row))))
}

fn to_response(row: MessageSettingRow) -> MessageSettingResponse {
    MessageSettingResponse {
        id: row.id,
        is_auto_sending_on: row.is_auto_sending_on,
        is_recurring_on: row.is_recurring_on,
        is_active: row.is_active,
        receptions: row.receptions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::test_support::{TestApp, register_user};

    #[tokio::test]
    async fn newest_setting_is_the_only_active_one() {
        let app = TestApp::new();
        let asha = register_user(&app, "Asha", "+919876543210").await;
        let bala = register_user(&app, "Bala", "+919876543211").await;
        let token = app.token_for(asha);

        let (status, first) = app
            .post(
                "/chat/message_setting/",
                Some(&token),
                json!({ "is_auto_sending_on": true, "receptions": [bala, asha, bala] }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["is_active"], true);
        assert_eq!(first["receptions"], json!([asha, bala]));

        // is_active is read-only: an echoed `false` is ignored.
        let (status, second) = app
            .post(
                "/chat/message_setting/",
                Some(&token),
                json!({ "is_recurring_on": true, "is_active": false, "receptions": [bala] }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(second["is_active"], true);

        let (status, body) = app.get("/chat/message_setting/", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let settings = body.as_array().unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings[0]["id"], first["id"]);
        assert_eq!(settings[0]["is_active"], false);
        assert_eq!(settings[1]["id"], second["id"]);
        assert_eq!(settings[1]["is_active"], true);
    }

    #[tokio::test]
    async fn unknown_receptions_are_rejected() {
        let app = TestApp::new();
        let asha = register_user(&app, "Asha", "+919876543210").await;

        let (status, body) = app
            .post("/chat/message_setting/", Some(&app.token_for(asha)), json!({ "receptions": [asha, 42] }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "receptions: Invalid pk \"42\" - object does not exist.");
        assert!(app.state.db.list_message_settings().unwrap().is_empty());
    }
}
