use axum::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod openai;

/// Structured nutrition facts as the model reports them, grams and kcal.
#[derive(Debug, Clone, PartialEq)]
pub struct NutritionEstimate {
    pub food_name: String,
    pub calorie_kcal: f64,
    pub carbohydrate_g: f64,
    pub protein_g: f64,
    pub fat_g: f64,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("llm request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The model answered, but not in the shape we asked for. `raw` keeps the
    /// full response text for diagnostics.
    #[error("malformed llm response: {reason}")]
    Malformed { reason: String, raw: String },
}

/// Turns a food name or a meal photo into a nutrition estimate.
#[async_trait]
pub trait FoodNutritionResolver: Send + Sync {
    async fn nutrition_for_name(&self, food_name: &str) -> Result<NutritionEstimate, ResolveError>;

    async fn nutrition_for_image(
        &self,
        image: Bytes,
        content_type: &str,
    ) -> Result<NutritionEstimate, ResolveError>;
}

/// Produces short natural-language dietary advice from monthly macro
/// percentages. Failures here must never discard already-computed averages;
/// the caller decides how to surface them.
#[async_trait]
pub trait AdviceRequester: Send + Sync {
    async fn dietary_advice(
        &self,
        carb_pct: f64,
        protein_pct: f64,
        fat_pct: f64,
    ) -> Result<String, ResolveError>;
}

fn malformed(reason: impl Into<String>, raw: &str) -> ResolveError {
    ResolveError::Malformed {
        reason: reason.into(),
        raw: raw.to_string(),
    }
}

/// Models routinely wrap JSON answers in markdown fences.
fn strip_code_fences(raw: &str) -> &str {
    let s = raw.trim();
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

/// Accepts a JSON number or a numeric string ("1400", "1400 kcal").
fn numeric_field(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let t = s.trim();
            t.parse::<f64>().ok().or_else(|| {
                let prefix: String = t
                    .chars()
                    .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                    .collect();
                prefix.parse::<f64>().ok()
            })
        }
        _ => None,
    }
}

/// Parse `{"food_name": ..., "calorie": ..., "carbohydrate": ..., "protein":
/// ..., "fat": ...}` out of a model answer.
fn parse_nutrition(raw: &str) -> Result<NutritionEstimate, ResolveError> {
    let body = strip_code_fences(raw);
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| malformed(format!("not valid JSON: {e}"), raw))?;

    let food_name = value
        .get("food_name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("missing food_name", raw))?
        .to_string();

    let field = |key: &str| -> Result<f64, ResolveError> {
        value
            .get(key)
            .and_then(numeric_field)
            .ok_or_else(|| malformed(format!("missing numeric field {key}"), raw))
    };

    Ok(NutritionEstimate {
        food_name,
        calorie_kcal: field("calorie")?,
        carbohydrate_g: field("carbohydrate")?,
        protein_g: field("protein")?,
        fat_g: field("fat")?,
    })
}

/// Parse the `{"음식": "..."}` answer of the photo-recognition step.
fn parse_food_name(raw: &str) -> Result<String, ResolveError> {
    let body = strip_code_fences(raw);
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| malformed(format!("not valid JSON: {e}"), raw))?;
    let name = value
        .get("음식")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("missing \"음식\" field", raw))?;
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_nutrition_json() {
        let est = parse_nutrition(
            r#"{"food_name": "돈까스", "calorie": 1400, "carbohydrate": 50, "protein": 90, "fat": 60}"#,
        )
        .unwrap();
        assert_eq!(est.food_name, "돈까스");
        assert_eq!(est.calorie_kcal, 1400.0);
        assert_eq!(est.carbohydrate_g, 50.0);
        assert_eq!(est.protein_g, 90.0);
        assert_eq!(est.fat_g, 60.0);
    }

    #[test]
    fn parses_fenced_json_with_string_numbers() {
        let raw = "```json\n{\"food_name\": \"에너지바\", \"calorie\": \"200 kcal\", \"carbohydrate\": \"20\", \"protein\": \"12\", \"fat\": \"10\"}\n```";
        let est = parse_nutrition(raw).unwrap();
        assert_eq!(est.food_name, "에너지바");
        assert_eq!(est.calorie_kcal, 200.0);
        assert_eq!(est.carbohydrate_g, 20.0);
    }

    #[test]
    fn malformed_nutrition_carries_raw_body() {
        let raw = "I cannot analyze that.";
        let err = parse_nutrition(raw).unwrap_err();
        match err {
            ResolveError::Malformed { raw: kept, .. } => assert_eq!(kept, raw),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_macro_field_is_malformed() {
        let err =
            parse_nutrition(r#"{"food_name": "라면", "calorie": 500, "protein": 10, "fat": 16}"#)
                .unwrap_err();
        assert!(err.to_string().contains("carbohydrate"));
    }

    #[test]
    fn parses_food_name_answer() {
        assert_eq!(
            parse_food_name(r#"{"음식": "햄버거"}"#).unwrap(),
            "햄버거"
        );
        assert_eq!(
            parse_food_name("```json\n{\"음식\": \" 김치찌개 \"}\n```").unwrap(),
            "김치찌개"
        );
    }

    #[test]
    fn blank_food_name_is_malformed() {
        // The recognizer answers a single-space name when nothing is visible.
        assert!(parse_food_name(r#"{"음식": " "}"#).is_err());
        assert!(parse_food_name(r#"{"dish": "pizza"}"#).is_err());
    }

    #[test]
    fn numeric_field_variants() {
        use serde_json::json;
        assert_eq!(numeric_field(&json!(42)), Some(42.0));
        assert_eq!(numeric_field(&json!(36.6)), Some(36.6));
        assert_eq!(numeric_field(&json!("17.5")), Some(17.5));
        assert_eq!(numeric_field(&json!("250kcal")), Some(250.0));
        assert_eq!(numeric_field(&json!("about right")), None);
        assert_eq!(numeric_field(&json!(null)), None);
    }
}
