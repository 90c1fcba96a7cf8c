use std::collections::BTreeMap;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{delete, get, post},
    Json, Router,
};
use time::Date;
use tracing::{error, instrument};

use crate::error::ApiError;
use crate::food::aggregate::{self, date_for, parse_month};
use crate::food::dto::{
    AddFoodRequest, AdviceOutcome, AdviceResponse, AvgKcalResponse, DayQuery, DayResponse,
    DeleteFoodRequest, FoodItem, FoodWriteResponse, MessageResponse, MonthAggregate, MonthQuery,
    PhotoQuery, StoredFood, UpdateFoodRequest, UploadResponse,
};
use crate::food::repo::{self, FoodEntry};
use crate::food::services;
use crate::state::AppState;

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/food/quarterly", get(get_quarterly))
        .route("/food/advice", get(get_advice))
        .route("/food/avg_kcal", get(get_avg_kcal))
        .route("/food/get_day", get(get_day))
        .route("/food/photo", get(get_photo))
}

pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/food/add", post(add_food))
        .route("/food/update", post(update_food))
        .route("/food/delete", delete(delete_food))
        .route("/food/upload", post(upload_food))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

fn require_user(user_id: &str) -> Result<(), ApiError> {
    if user_id.trim().is_empty() {
        return Err(ApiError::Validation("user_id is required".into()));
    }
    Ok(())
}

fn parse_date_param(s: &str) -> Result<Date, ApiError> {
    Date::parse(s, time::macros::format_description!("[year]-[month]-[day]"))
        .map_err(|_| ApiError::Validation(format!("invalid date: {s}")))
}

#[instrument(skip(state))]
pub async fn get_quarterly(
    State(state): State<AppState>,
    Query(q): Query<MonthQuery>,
) -> Result<Json<BTreeMap<String, MonthAggregate>>, ApiError> {
    require_user(&q.user_id)?;
    parse_month(q.month)?;

    match aggregate::aggregate_quarter(&state.db, &q.user_id, q.year, q.month).await {
        Ok(quarter) => Ok(Json(quarter)),
        Err(e) => {
            error!(error = %e, user_id = %q.user_id, year = q.year, month = q.month, "quarterly aggregation failed");
            Err(e)
        }
    }
}

#[instrument(skip(state))]
pub async fn get_advice(
    State(state): State<AppState>,
    Query(q): Query<MonthQuery>,
) -> Result<Json<AdviceResponse>, ApiError> {
    require_user(&q.user_id)?;
    parse_month(q.month)?;

    let month = aggregate::aggregate_month(&state.db, &q.user_id, q.year, q.month)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %q.user_id, "monthly aggregation failed");
            e
        })?;
    let averages = aggregate::average_percentages(&month)?;

    // Advice failure never discards the averages we already computed.
    let advice = match state
        .advice
        .dietary_advice(
            averages.average_carbohydrates_percentage,
            averages.average_protein_percentage,
            averages.average_fat_percentage,
        )
        .await
    {
        Ok(text) => AdviceOutcome::Text(text),
        Err(e) => {
            error!(error = %e, user_id = %q.user_id, "advice request failed");
            AdviceOutcome::Failed {
                error: format!("Failed to get advice from LLM: {e}"),
            }
        }
    };

    Ok(Json(AdviceResponse { averages, advice }))
}

#[instrument(skip(state))]
pub async fn get_avg_kcal(
    State(state): State<AppState>,
    Query(q): Query<MonthQuery>,
) -> Result<Json<AvgKcalResponse>, ApiError> {
    require_user(&q.user_id)?;
    parse_month(q.month)?;

    let month = aggregate::aggregate_month(&state.db, &q.user_id, q.year, q.month)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %q.user_id, "monthly aggregation failed");
            e
        })?;
    let average_kcal = aggregate::average_calories(&month)?;
    Ok(Json(AvgKcalResponse { average_kcal }))
}

#[instrument(skip(state))]
pub async fn get_day(
    State(state): State<AppState>,
    Query(q): Query<DayQuery>,
) -> Result<Json<DayResponse>, ApiError> {
    require_user(&q.user_id)?;
    let date = date_for(q.year, parse_month(q.month)?, q.day)?;

    let entries = repo::list_day_entries(&state.db, &q.user_id, date)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %q.user_id, %date, "day lookup failed");
            ApiError::from(e)
        })?;
    let totals = repo::get_daily_totals(&state.db, &q.user_id, date).await?;

    Ok(Json(DayResponse {
        foods: entries.into_iter().map(FoodItem::from).collect(),
        percentages: totals
            .map(aggregate::percentages_for)
            .unwrap_or_default(),
    }))
}

/// 302 to a presigned URL for the photo behind a food entry.
#[instrument(skip(state))]
pub async fn get_photo(
    State(state): State<AppState>,
    Query(q): Query<PhotoQuery>,
) -> Result<Redirect, ApiError> {
    require_user(&q.user_id)?;
    let date = date_for(q.year, parse_month(q.month)?, q.day)?;

    let key = repo::get_photo_key(&state.db, &q.user_id, date, q.index)
        .await?
        .ok_or_else(|| ApiError::NoData("Photo not found".into()))?;
    let url = state
        .storage
        .presign_get(&key, services::PHOTO_URL_TTL_SECS)
        .await?;
    Ok(Redirect::temporary(&url))
}

#[instrument(skip(state, body))]
pub async fn add_food(
    State(state): State<AppState>,
    Json(body): Json<AddFoodRequest>,
) -> Result<(StatusCode, Json<FoodWriteResponse>), ApiError> {
    require_user(&body.user_id)?;
    if body.food_name.trim().is_empty() {
        return Err(ApiError::Validation("food_name is required".into()));
    }
    let date = parse_date_param(&body.date)?;

    let estimate = match state.nutrition.nutrition_for_name(&body.food_name).await {
        Ok(est) => est,
        Err(e) => {
            error!(error = %e, food_name = %body.food_name, "nutrition lookup failed");
            return Err(e.into());
        }
    };

    let food_index = repo::next_food_index(&state.db, &body.user_id, date).await?;
    let entry = FoodEntry {
        user_id: body.user_id,
        entry_date: date,
        food_index,
        food_name: estimate.food_name,
        carbohydrate_g: estimate.carbohydrate_g,
        protein_g: estimate.protein_g,
        fat_g: estimate.fat_g,
        calorie_kcal: estimate.calorie_kcal,
    };
    repo::insert_entry(&state.db, &entry).await?;

    Ok((
        StatusCode::CREATED,
        Json(FoodWriteResponse {
            message: "음식이 성공적으로 추가되었습니다.".into(),
            data: StoredFood::from(entry),
        }),
    ))
}

#[instrument(skip(state, body))]
pub async fn update_food(
    State(state): State<AppState>,
    Json(body): Json<UpdateFoodRequest>,
) -> Result<Json<FoodWriteResponse>, ApiError> {
    require_user(&body.user_id)?;
    if body.new_food_name.trim().is_empty() {
        return Err(ApiError::Validation("new_food_name is required".into()));
    }
    let date = parse_date_param(&body.date)?;

    let estimate = match state.nutrition.nutrition_for_name(&body.new_food_name).await {
        Ok(est) => est,
        Err(e) => {
            error!(error = %e, food_name = %body.new_food_name, "nutrition lookup failed");
            return Err(e.into());
        }
    };

    let affected =
        repo::update_entry(&state.db, &body.user_id, date, body.food_index, &estimate).await?;
    if affected == 0 {
        return Err(ApiError::NoData("Food entry not found".into()));
    }

    let entry = FoodEntry {
        user_id: body.user_id,
        entry_date: date,
        food_index: body.food_index,
        food_name: estimate.food_name,
        carbohydrate_g: estimate.carbohydrate_g,
        protein_g: estimate.protein_g,
        fat_g: estimate.fat_g,
        calorie_kcal: estimate.calorie_kcal,
    };
    Ok(Json(FoodWriteResponse {
        message: "음식이 성공적으로 수정되었습니다.".into(),
        data: StoredFood::from(entry),
    }))
}

#[instrument(skip(state, body))]
pub async fn delete_food(
    State(state): State<AppState>,
    Json(body): Json<DeleteFoodRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_user(&body.user_id)?;
    let date = parse_date_param(&body.date)?;

    // Remaining indices are not renumbered; the next insert still takes
    // MAX+1, so deleted indices are never reused.
    let affected = repo::delete_entry(&state.db, &body.user_id, date, body.food_index).await?;
    if affected == 0 {
        return Err(ApiError::NoData("Food entry not found".into()));
    }
    Ok(Json(MessageResponse {
        message: "음식이 성공적으로 삭제되었습니다.".into(),
    }))
}

/// POST /food/upload (multipart): `user_id` text field + `file` image field.
#[instrument(skip(state, mp))]
pub async fn upload_food(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut user_id: Option<String> = None;
    let mut file: Option<(bytes::Bytes, String)> = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("user_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("invalid user_id field: {e}")))?;
                user_id = Some(text);
            }
            Some("file") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "image/jpeg".into());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("invalid file field: {e}")))?;
                file = Some((data, content_type));
            }
            _ => {}
        }
    }

    let user_id = user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("user_id is required".into()))?;
    let (image, content_type) =
        file.ok_or_else(|| ApiError::Validation("No file part".into()))?;
    if image.is_empty() {
        return Err(ApiError::Validation("No selected file".into()));
    }

    let (entry, photo_id) =
        match services::ingest_meal_photo(&state, &user_id, image, &content_type).await {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, user_id = %user_id, "photo upload failed");
                return Err(e);
            }
        };

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "음식이 성공적으로 추가되었습니다.".into(),
            data: StoredFood::from(entry),
            photo_id,
        }),
    ))
}
