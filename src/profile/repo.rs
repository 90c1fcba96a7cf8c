use sqlx::PgPool;

/// The only columns a profile-update request may touch. Anything else in the
/// request body is rejected at deserialization, so column names never come
/// from client input.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProfileUpdate {
    pub body_weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub age: Option<i32>,
    pub rdi_kcal: Option<f64>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.body_weight_kg.is_none()
            && self.height_cm.is_none()
            && self.age.is_none()
            && self.rdi_kcal.is_none()
    }
}

/// One fixed statement; absent fields keep their current value.
pub async fn update_profile(
    db: &PgPool,
    user_id: &str,
    update: &ProfileUpdate,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE users SET
            body_weight_kg = COALESCE($2, body_weight_kg),
            height_cm      = COALESCE($3, height_cm),
            age            = COALESCE($4, age),
            rdi_kcal       = COALESCE($5, rdi_kcal)
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(update.body_weight_kg)
    .bind(update.height_cm)
    .bind(update.age)
    .bind(update.rdi_kcal)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_is_detected() {
        assert!(ProfileUpdate::default().is_empty());
        assert!(!ProfileUpdate {
            body_weight_kg: Some(72.5),
            ..Default::default()
        }
        .is_empty());
        assert!(!ProfileUpdate {
            age: Some(29),
            ..Default::default()
        }
        .is_empty());
    }
}
