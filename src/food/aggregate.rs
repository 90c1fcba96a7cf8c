//! Month and quarter aggregation over recorded food entries, plus the
//! summary reductions the advice and avg_kcal endpoints share.

use std::collections::BTreeMap;

use sqlx::PgPool;
use time::{Date, Month};

use crate::error::ApiError;
use crate::food::dto::{DayPercentages, FoodItem, MonthAggregate, PercentageAverages};
use crate::food::repo::{self, DailyTotals, FoodEntry};

pub fn parse_month(month: u8) -> Result<Month, ApiError> {
    Month::try_from(month).map_err(|_| {
        ApiError::Validation("Invalid month. Please enter a value between 1 and 12.".into())
    })
}

pub fn date_for(year: i32, month: Month, day: u8) -> Result<Date, ApiError> {
    Date::from_calendar_date(year, month, day)
        .map_err(|_| ApiError::Validation("Invalid date. Please enter valid values.".into()))
}

/// Gregorian day count for (year, month): 28-31 with the leap-year rule.
pub fn month_length(year: i32, month: Month) -> u8 {
    time::util::days_in_month(month, year)
}

/// First day of the month and first day of the next month, for `[from, to)`
/// range queries.
pub fn month_bounds(year: i32, month: Month) -> Result<(Date, Date), ApiError> {
    let first = date_for(year, month, 1)?;
    let next = match month {
        Month::December => date_for(year + 1, Month::January, 1)?,
        m => date_for(year, m.next(), 1)?,
    };
    Ok((first, next))
}

/// Round to one decimal place, halves away from zero.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn pct(total: f64, target: f64) -> f64 {
    // A zero or missing target is defined as 0%, not an error.
    if target > 0.0 {
        round1(total / target * 100.0)
    } else {
        0.0
    }
}

pub fn percentages_for(totals: DailyTotals) -> DayPercentages {
    DayPercentages {
        carbohydrates_percentage: pct(totals.carbohydrate_g, totals.target_carbohydrate_g),
        protein_percentage: pct(totals.protein_g, totals.target_protein_g),
        fat_percentage: pct(totals.fat_g, totals.target_fat_g),
    }
}

/// Pure shaping step: bucket a month's entries by day-of-month and pair them
/// with per-day percentages. `totals` is indexed day-1 and must cover the
/// whole month; entries are expected to be pre-filtered to (year, month) by
/// the storage query.
pub fn build_month(
    year: i32,
    month: Month,
    entries: Vec<FoodEntry>,
    totals: Vec<Option<DailyTotals>>,
) -> MonthAggregate {
    let num_days = month_length(year, month) as usize;
    debug_assert_eq!(totals.len(), num_days);

    let mut foods: Vec<Vec<FoodItem>> = vec![Vec::new(); num_days];
    for entry in entries {
        let day = entry.entry_date.day() as usize;
        debug_assert!((1..=num_days).contains(&day));
        foods[day - 1].push(FoodItem::from(entry));
    }

    MonthAggregate {
        foods,
        percentages: totals.into_iter().map(|t| t.map(percentages_for)).collect(),
    }
}

/// One list query plus one daily-totals lookup per day, assembled in day
/// order. Storage errors propagate; they are never folded into "no data".
pub async fn aggregate_month(
    db: &PgPool,
    user_id: &str,
    year: i32,
    month: u8,
) -> Result<MonthAggregate, ApiError> {
    let month = parse_month(month)?;
    let (first, next) = month_bounds(year, month)?;
    let entries = repo::list_entries_between(db, user_id, first, next).await?;

    let num_days = month_length(year, month);
    let mut totals = Vec::with_capacity(num_days as usize);
    for day in 1..=num_days {
        let date = date_for(year, month, day)?;
        totals.push(repo::get_daily_totals(db, user_id, date).await?);
    }

    Ok(build_month(year, month, entries, totals))
}

/// The (year, month) pairs for the month before, the given month and the
/// month after, with year rollover at the December/January boundaries.
pub fn quarter_months(year: i32, center_month: u8) -> [(i32, u8); 3] {
    [-1i32, 0, 1].map(|offset| {
        let idx = year * 12 + i32::from(center_month) - 1 + offset;
        (idx.div_euclid(12), (idx.rem_euclid(12) + 1) as u8)
    })
}

/// `YYYY-MM` key for the quarter map, month zero-padded.
pub fn month_key(year: i32, month: u8) -> String {
    format!("{year}-{month:02}")
}

pub async fn aggregate_quarter(
    db: &PgPool,
    user_id: &str,
    year: i32,
    center_month: u8,
) -> Result<BTreeMap<String, MonthAggregate>, ApiError> {
    let mut quarter = BTreeMap::new();
    for (y, m) in quarter_months(year, center_month) {
        let aggregate = aggregate_month(db, user_id, y, m).await?;
        quarter.insert(month_key(y, m), aggregate);
    }
    Ok(quarter)
}

/// Average each macro percentage over the days that have a totals row. Days
/// without one count in neither numerator nor denominator.
pub fn average_percentages(month: &MonthAggregate) -> Result<PercentageAverages, ApiError> {
    let mut carbs = 0.0;
    let mut protein = 0.0;
    let mut fat = 0.0;
    let mut count = 0u32;
    for day in month.percentages.iter().flatten() {
        carbs += day.carbohydrates_percentage;
        protein += day.protein_percentage;
        fat += day.fat_percentage;
        count += 1;
    }
    if count == 0 {
        return Err(ApiError::no_data());
    }
    let n = f64::from(count);
    Ok(PercentageAverages {
        average_carbohydrates_percentage: round1(carbs / n),
        average_protein_percentage: round1(protein / n),
        average_fat_percentage: round1(fat / n),
    })
}

/// Flat mean of calories over every entry in the month, not a mean of
/// per-day means.
pub fn average_calories(month: &MonthAggregate) -> Result<f64, ApiError> {
    let mut total = 0.0;
    let mut count = 0u32;
    for food in month.foods.iter().flatten() {
        total += food.calories;
        count += 1;
    }
    if count == 0 {
        return Err(ApiError::no_data());
    }
    Ok(round1(total / f64::from(count)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn entry(d: Date, idx: i32, kcal: f64) -> FoodEntry {
        FoodEntry {
            user_id: "상엽".into(),
            entry_date: d,
            food_index: idx,
            food_name: format!("음식{idx}"),
            carbohydrate_g: 50.0,
            protein_g: 20.0,
            fat_g: 10.0,
            calorie_kcal: kcal,
        }
    }

    fn totals(carb: f64, target_carb: f64) -> DailyTotals {
        DailyTotals {
            carbohydrate_g: carb,
            protein_g: 50.0,
            fat_g: 30.0,
            target_carbohydrate_g: target_carb,
            target_protein_g: 100.0,
            target_fat_g: 60.0,
        }
    }

    fn empty_month(year: i32, month: Month) -> MonthAggregate {
        let days = month_length(year, month) as usize;
        build_month(year, month, Vec::new(), vec![None; days])
    }

    #[test]
    fn month_length_follows_gregorian_rules() {
        assert_eq!(month_length(2024, Month::February), 29);
        assert_eq!(month_length(2023, Month::February), 28);
        assert_eq!(month_length(2000, Month::February), 29);
        assert_eq!(month_length(1900, Month::February), 28);
        assert_eq!(month_length(2024, Month::January), 31);
        assert_eq!(month_length(2024, Month::April), 30);
    }

    #[test]
    fn parse_month_rejects_out_of_range() {
        assert!(parse_month(0).is_err());
        assert!(parse_month(13).is_err());
        assert_eq!(parse_month(12).unwrap(), Month::December);
    }

    #[test]
    fn month_bounds_roll_into_next_year() {
        let (first, next) = month_bounds(2024, Month::December).unwrap();
        assert_eq!(first, date!(2024 - 12 - 01));
        assert_eq!(next, date!(2025 - 01 - 01));

        let (first, next) = month_bounds(2024, Month::June).unwrap();
        assert_eq!(first, date!(2024 - 06 - 01));
        assert_eq!(next, date!(2024 - 07 - 01));
    }

    #[test]
    fn quarter_months_roll_over_year_boundaries() {
        assert_eq!(quarter_months(2024, 1), [(2023, 12), (2024, 1), (2024, 2)]);
        assert_eq!(quarter_months(2024, 12), [(2024, 11), (2024, 12), (2025, 1)]);
        assert_eq!(quarter_months(2024, 6), [(2024, 5), (2024, 6), (2024, 7)]);
    }

    #[test]
    fn quarter_keys_are_zero_padded() {
        let keys: Vec<String> = quarter_months(2024, 1)
            .iter()
            .map(|&(y, m)| month_key(y, m))
            .collect();
        assert_eq!(keys, vec!["2023-12", "2024-01", "2024-02"]);

        let keys: Vec<String> = quarter_months(2024, 12)
            .iter()
            .map(|&(y, m)| month_key(y, m))
            .collect();
        assert_eq!(keys, vec!["2024-11", "2024-12", "2025-01"]);
    }

    #[test]
    fn percentage_rounding_cases() {
        assert_eq!(pct(33.0, 100.0), 33.0);
        assert_eq!(pct(1.0, 3.0), 33.3);
        assert_eq!(pct(123.0, 0.0), 0.0);
        assert_eq!(pct(2.0, 3.0), 66.7);
    }

    #[test]
    fn build_month_buckets_by_day_in_insertion_order() {
        let entries = vec![
            entry(date!(2024 - 03 - 02), 0, 500.0),
            entry(date!(2024 - 03 - 02), 1, 300.0),
            entry(date!(2024 - 03 - 24), 0, 700.0),
        ];
        let mut totals_by_day = vec![None; 31];
        totals_by_day[1] = Some(totals(120.0, 300.0));

        let agg = build_month(2024, Month::March, entries, totals_by_day);
        assert_eq!(agg.foods.len(), 31);
        assert_eq!(agg.percentages.len(), 31);

        let day2: Vec<i32> = agg.foods[1].iter().map(|f| f.food_index).collect();
        assert_eq!(day2, vec![0, 1]);
        assert_eq!(agg.foods[23].len(), 1);
        assert!(agg.foods[0].is_empty());

        let p = agg.percentages[1].expect("day 2 has totals");
        assert_eq!(p.carbohydrates_percentage, 40.0);
        assert_eq!(p.protein_percentage, 50.0);
        assert_eq!(p.fat_percentage, 50.0);
        assert!(agg.percentages[0].is_none());
    }

    #[test]
    fn day_with_totals_but_no_foods_still_gets_percentages() {
        let mut totals_by_day = vec![None; 30];
        totals_by_day[9] = Some(totals(0.0, 300.0));
        let agg = build_month(2024, Month::April, Vec::new(), totals_by_day);
        assert!(agg.foods[9].is_empty());
        let p = agg.percentages[9].expect("day 10 has totals");
        assert_eq!(p.carbohydrates_percentage, 0.0);
    }

    #[test]
    fn average_percentages_skips_days_without_totals() {
        let mut totals_by_day = vec![None; 31];
        totals_by_day[0] = Some(totals(100.0, 200.0)); // 50.0 / 50.0 / 50.0
        totals_by_day[30] = Some(totals(200.0, 200.0)); // 100.0 / 50.0 / 50.0
        let agg = build_month(2024, Month::March, Vec::new(), totals_by_day);

        let avg = average_percentages(&agg).unwrap();
        assert_eq!(avg.average_carbohydrates_percentage, 75.0);
        assert_eq!(avg.average_protein_percentage, 50.0);
        assert_eq!(avg.average_fat_percentage, 50.0);
    }

    #[test]
    fn average_percentages_with_no_qualifying_days_is_no_data() {
        let agg = empty_month(2023, Month::February);
        let err = average_percentages(&agg).unwrap_err();
        assert!(matches!(err, ApiError::NoData(_)));
    }

    #[test]
    fn average_calories_is_a_flat_mean_over_entries() {
        let entries = vec![
            entry(date!(2024 - 02 - 01), 0, 100.0),
            entry(date!(2024 - 02 - 01), 1, 200.0),
            entry(date!(2024 - 02 - 29), 0, 300.0),
        ];
        let agg = build_month(2024, Month::February, entries, vec![None; 29]);
        // 200.0, not the 150/300 per-day means averaged.
        assert_eq!(average_calories(&agg).unwrap(), 200.0);
    }

    #[test]
    fn average_calories_with_no_entries_is_no_data() {
        let agg = empty_month(2024, Month::June);
        assert!(matches!(
            average_calories(&agg).unwrap_err(),
            ApiError::NoData(_)
        ));
    }

    #[test]
    fn reductions_are_pure_functions_of_the_aggregate() {
        let entries = vec![
            entry(date!(2024 - 05 - 03), 0, 640.0),
            entry(date!(2024 - 05 - 17), 0, 410.0),
        ];
        let mut totals_by_day = vec![None; 31];
        totals_by_day[2] = Some(totals(150.0, 310.0));
        let agg = build_month(2024, Month::May, entries, totals_by_day);

        let first = (average_percentages(&agg).unwrap(), average_calories(&agg).unwrap());
        let second = (average_percentages(&agg).unwrap(), average_calories(&agg).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn round1_is_single_decimal_half_away_from_zero() {
        assert_eq!(round1(33.333), 33.3);
        assert_eq!(round1(66.666), 66.7);
        assert_eq!(round1(0.05), 0.1);
        assert_eq!(round1(200.0), 200.0);
    }
}
