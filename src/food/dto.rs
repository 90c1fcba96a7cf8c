use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::food::repo::FoodEntry;

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u8,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PhotoQuery {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub index: i32,
    pub user_id: String,
}

/// One food on the wire, field names as clients already parse them.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FoodItem {
    pub food_index: i32,
    pub food_name: String,
    pub protein: f64,
    pub fat: f64,
    pub carbohydrates: f64,
    pub calories: f64,
}

impl From<FoodEntry> for FoodItem {
    fn from(e: FoodEntry) -> Self {
        Self {
            food_index: e.food_index,
            food_name: e.food_name,
            protein: e.protein_g,
            fat: e.fat_g,
            carbohydrates: e.carbohydrate_g,
            calories: e.calorie_kcal,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct DayPercentages {
    pub carbohydrates_percentage: f64,
    pub protein_percentage: f64,
    pub fat_percentage: f64,
}

/// Per-day foods and macro percentages for one calendar month, indexed by
/// day-of-month. A day without a totals row carries `None` internally and
/// serializes as `{}` so clients keep their positional day lookup.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthAggregate {
    pub foods: Vec<Vec<FoodItem>>,
    #[serde(serialize_with = "percentages_with_empty_days")]
    pub percentages: Vec<Option<DayPercentages>>,
}

fn percentages_with_empty_days<S>(
    days: &[Option<DayPercentages>],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    struct EmptyMap;
    impl Serialize for EmptyMap {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_map(Some(0))?.end()
        }
    }

    let mut seq = serializer.serialize_seq(Some(days.len()))?;
    for day in days {
        match day {
            Some(p) => seq.serialize_element(p)?,
            None => seq.serialize_element(&EmptyMap)?,
        }
    }
    seq.end()
}

/// `get_day` answer. Percentages default to zeros when no totals exist,
/// matching the positional-month shape's known conflation of "no data" and
/// "0% of target".
#[derive(Debug, Serialize)]
pub struct DayResponse {
    pub foods: Vec<FoodItem>,
    pub percentages: DayPercentages,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PercentageAverages {
    pub average_carbohydrates_percentage: f64,
    pub average_protein_percentage: f64,
    pub average_fat_percentage: f64,
}

/// Advice text, or the error that prevented it. Either way the averages the
/// advice was based on are part of the response.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AdviceOutcome {
    Text(String),
    Failed { error: String },
}

#[derive(Debug, Serialize)]
pub struct AdviceResponse {
    pub averages: PercentageAverages,
    pub advice: AdviceOutcome,
}

#[derive(Debug, Serialize)]
pub struct AvgKcalResponse {
    pub average_kcal: f64,
}

#[derive(Debug, Deserialize)]
pub struct AddFoodRequest {
    pub user_id: String,
    pub date: String,
    pub food_name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFoodRequest {
    pub user_id: String,
    pub date: String,
    pub food_index: i32,
    pub new_food_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFoodRequest {
    pub user_id: String,
    pub date: String,
    pub food_index: i32,
}

#[derive(Debug, Serialize)]
pub struct StoredFood {
    pub user_id: String,
    pub date: String,
    pub food_index: i32,
    pub food_name: String,
    pub carbohydrate_g: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub calorie_kcal: f64,
}

impl From<FoodEntry> for StoredFood {
    fn from(e: FoodEntry) -> Self {
        Self {
            user_id: e.user_id,
            date: e.entry_date.to_string(),
            food_index: e.food_index,
            food_name: e.food_name,
            carbohydrate_g: e.carbohydrate_g,
            protein_g: e.protein_g,
            fat_g: e.fat_g,
            calorie_kcal: e.calorie_kcal,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FoodWriteResponse {
    pub message: String,
    pub data: StoredFood,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub data: StoredFood,
    pub photo_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn item(idx: i32) -> FoodItem {
        FoodItem {
            food_index: idx,
            food_name: "김밥".into(),
            protein: 10.0,
            fat: 8.0,
            carbohydrates: 60.0,
            calories: 450.0,
        }
    }

    #[test]
    fn absent_day_percentages_serialize_as_empty_object() {
        let agg = MonthAggregate {
            foods: vec![vec![item(0)], vec![]],
            percentages: vec![
                Some(DayPercentages {
                    carbohydrates_percentage: 33.3,
                    protein_percentage: 50.0,
                    fat_percentage: 0.0,
                }),
                None,
            ],
        };
        let json = serde_json::to_value(&agg).unwrap();
        assert_eq!(json["percentages"][0]["carbohydrates_percentage"], 33.3);
        assert_eq!(json["percentages"][1], serde_json::json!({}));
        assert_eq!(json["foods"][1], serde_json::json!([]));
    }

    #[test]
    fn food_item_wire_field_names() {
        let json = serde_json::to_value(item(2)).unwrap();
        for key in ["food_index", "food_name", "protein", "fat", "carbohydrates", "calories"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["food_name"], "김밥");
    }

    #[test]
    fn advice_outcome_is_text_or_error_object() {
        let ok = serde_json::to_value(AdviceOutcome::Text("골고루 드세요.".into())).unwrap();
        assert_eq!(ok, serde_json::json!("골고루 드세요."));

        let failed = serde_json::to_value(AdviceOutcome::Failed {
            error: "Failed to get advice from LLM: timeout".into(),
        })
        .unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"error": "Failed to get advice from LLM: timeout"})
        );
    }

    #[test]
    fn stored_food_formats_date_as_iso() {
        let entry = FoodEntry {
            user_id: "상엽".into(),
            entry_date: date!(2024 - 07 - 01),
            food_index: 0,
            food_name: "햄버거".into(),
            carbohydrate_g: 40.0,
            protein_g: 25.0,
            fat_g: 30.0,
            calorie_kcal: 550.0,
        };
        let stored = StoredFood::from(entry);
        assert_eq!(stored.date, "2024-07-01");
    }
}
