use bytes::Bytes;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::food::repo::{self, FoodEntry};
use crate::state::AppState;

/// Photo upload flow: resolve nutrition from the image, record a food entry
/// for today with the next index, then archive the photo and link it to the
/// entry.
pub async fn ingest_meal_photo(
    state: &AppState,
    user_id: &str,
    image: Bytes,
    content_type: &str,
) -> Result<(FoodEntry, Uuid), ApiError> {
    let estimate = state.nutrition.nutrition_for_image(image.clone(), content_type).await?;
    debug!(food_name = %estimate.food_name, "resolved nutrition from photo");

    let date = OffsetDateTime::now_utc().date();
    let food_index = repo::next_food_index(&state.db, user_id, date).await?;
    let entry = FoodEntry {
        user_id: user_id.to_string(),
        entry_date: date,
        food_index,
        food_name: estimate.food_name,
        carbohydrate_g: estimate.carbohydrate_g,
        protein_g: estimate.protein_g,
        fat_g: estimate.fat_g,
        calorie_kcal: estimate.calorie_kcal,
    };
    repo::insert_entry(&state.db, &entry).await?;

    let photo_id = Uuid::new_v4();
    let ext = ext_from_mime(content_type).unwrap_or("jpg");
    let key = format!("photos/{user_id}/{date}/{photo_id}.{ext}");
    state.storage.put_object(&key, image, content_type).await?;
    repo::insert_photo(&state.db, photo_id, user_id, date, food_index, &key).await?;

    Ok((entry, photo_id))
}

pub const PHOTO_URL_TTL_SECS: u64 = 10 * 60;

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::state::AppState;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(super::ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(super::ext_from_mime("image/png"), Some("png"));
        assert_eq!(super::ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(super::ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(super::ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn fake_storage_presigns_by_key() {
        let state = AppState::fake();
        let url = state
            .storage
            .presign_get("photos/상엽/2024-08-05/abc.jpg", super::PHOTO_URL_TTL_SECS)
            .await
            .unwrap();
        assert!(url.contains("photos/상엽/2024-08-05/abc.jpg"));
    }
}
