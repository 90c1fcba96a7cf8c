use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::{error, instrument};

use crate::error::ApiError;
use crate::food::dto::MessageResponse;
use crate::profile::repo::{self, ProfileUpdate};
use crate::state::AppState;

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile/update", post(update_profile))
}

/// Unknown keys are a client error, not extra columns to write.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdateRequest {
    pub user_id: String,
    #[serde(default)]
    pub body_weight_kg: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub rdi_kcal: Option<f64>,
}

#[instrument(skip(state, body))]
pub async fn update_profile(
    State(state): State<AppState>,
    Json(body): Json<ProfileUpdateRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if body.user_id.trim().is_empty() {
        return Err(ApiError::Validation("user_id is required".into()));
    }

    let update = ProfileUpdate {
        body_weight_kg: body.body_weight_kg,
        height_cm: body.height_cm,
        age: body.age,
        rdi_kcal: body.rdi_kcal,
    };
    if update.is_empty() {
        return Err(ApiError::Validation("no updatable fields provided".into()));
    }

    let affected = repo::update_profile(&state.db, &body.user_id, &update)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %body.user_id, "profile update failed");
            ApiError::from(e)
        })?;
    if affected == 0 {
        return Err(ApiError::NoData("User not found".into()));
    }

    Ok(Json(MessageResponse {
        message: "User updated successfully".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<ProfileUpdateRequest>(
            r#"{"user_id": "상엽", "body_weight_kg": 70.0, "is_admin": true}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("is_admin"));
    }

    #[test]
    fn partial_updates_deserialize() {
        let req: ProfileUpdateRequest =
            serde_json::from_str(r#"{"user_id": "상엽", "rdi_kcal": 2200}"#).unwrap();
        assert_eq!(req.rdi_kcal, Some(2200.0));
        assert_eq!(req.body_weight_kg, None);
        assert_eq!(req.age, None);
    }
}
