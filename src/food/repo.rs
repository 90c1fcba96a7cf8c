use sqlx::{FromRow, PgPool};
use time::Date;
use uuid::Uuid;

use crate::llm::NutritionEstimate;

/// One recorded food for one user on one date. `food_index` counts up from 0
/// within a (user, date) pair and is never renumbered, so deletes leave gaps.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct FoodEntry {
    pub user_id: String,
    pub entry_date: Date,
    pub food_index: i32,
    pub food_name: String,
    pub carbohydrate_g: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub calorie_kcal: f64,
}

/// Summed intake for one (user, day) plus that user's daily targets.
/// Maintained elsewhere; this module only reads it.
#[derive(Debug, Clone, Copy, FromRow, PartialEq)]
pub struct DailyTotals {
    pub carbohydrate_g: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub target_carbohydrate_g: f64,
    pub target_protein_g: f64,
    pub target_fat_g: f64,
}

/// Entries in `[from, to)`, date ascending and insertion order within a day.
pub async fn list_entries_between(
    db: &PgPool,
    user_id: &str,
    from: Date,
    to: Date,
) -> sqlx::Result<Vec<FoodEntry>> {
    sqlx::query_as::<_, FoodEntry>(
        r#"
        SELECT user_id, entry_date, food_index, food_name,
               carbohydrate_g, protein_g, fat_g, calorie_kcal
        FROM food_entries
        WHERE user_id = $1 AND entry_date >= $2 AND entry_date < $3
        ORDER BY entry_date, food_index
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await
}

pub async fn list_day_entries(
    db: &PgPool,
    user_id: &str,
    date: Date,
) -> sqlx::Result<Vec<FoodEntry>> {
    sqlx::query_as::<_, FoodEntry>(
        r#"
        SELECT user_id, entry_date, food_index, food_name,
               carbohydrate_g, protein_g, fat_g, calorie_kcal
        FROM food_entries
        WHERE user_id = $1 AND entry_date = $2
        ORDER BY food_index
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(db)
    .await
}

pub async fn get_daily_totals(
    db: &PgPool,
    user_id: &str,
    date: Date,
) -> sqlx::Result<Option<DailyTotals>> {
    sqlx::query_as::<_, DailyTotals>(
        r#"
        SELECT carbohydrate_g, protein_g, fat_g,
               target_carbohydrate_g, target_protein_g, target_fat_g
        FROM daily_totals
        WHERE user_id = $1 AND entry_date = $2
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(db)
    .await
}

/// Highest index for the pair plus one, or 0 for the first entry of the day.
pub async fn next_food_index(db: &PgPool, user_id: &str, date: Date) -> sqlx::Result<i32> {
    let (next,): (i32,) = sqlx::query_as(
        r#"
        SELECT COALESCE(MAX(food_index) + 1, 0)
        FROM food_entries
        WHERE user_id = $1 AND entry_date = $2
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_one(db)
    .await?;
    Ok(next)
}

pub async fn insert_entry(db: &PgPool, entry: &FoodEntry) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO food_entries
            (user_id, entry_date, food_index, food_name,
             carbohydrate_g, protein_g, fat_g, calorie_kcal)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(&entry.user_id)
    .bind(entry.entry_date)
    .bind(entry.food_index)
    .bind(&entry.food_name)
    .bind(entry.carbohydrate_g)
    .bind(entry.protein_g)
    .bind(entry.fat_g)
    .bind(entry.calorie_kcal)
    .execute(db)
    .await?;
    Ok(())
}

/// Replace name, macros and calories in place; index and date stay fixed.
pub async fn update_entry(
    db: &PgPool,
    user_id: &str,
    date: Date,
    food_index: i32,
    est: &NutritionEstimate,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE food_entries
        SET food_name = $4, carbohydrate_g = $5, protein_g = $6,
            fat_g = $7, calorie_kcal = $8
        WHERE user_id = $1 AND entry_date = $2 AND food_index = $3
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(food_index)
    .bind(&est.food_name)
    .bind(est.carbohydrate_g)
    .bind(est.protein_g)
    .bind(est.fat_g)
    .bind(est.calorie_kcal)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_entry(
    db: &PgPool,
    user_id: &str,
    date: Date,
    food_index: i32,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM food_entries
        WHERE user_id = $1 AND entry_date = $2 AND food_index = $3
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(food_index)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

pub async fn insert_photo(
    db: &PgPool,
    photo_id: Uuid,
    user_id: &str,
    date: Date,
    food_index: i32,
    s3_key: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO food_photos (id, user_id, entry_date, food_index, s3_key)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(photo_id)
    .bind(user_id)
    .bind(date)
    .bind(food_index)
    .bind(s3_key)
    .execute(db)
    .await?;
    Ok(())
}

/// Latest archived photo for an entry, if any.
pub async fn get_photo_key(
    db: &PgPool,
    user_id: &str,
    date: Date,
    food_index: i32,
) -> sqlx::Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT s3_key
        FROM food_photos
        WHERE user_id = $1 AND entry_date = $2 AND food_index = $3
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(food_index)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|(key,)| key))
}
