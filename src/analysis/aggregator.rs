//! Per-endpoint metric aggregators.
//!
//! Averages use the positive-only rule: a field contributes only where it is
//! present and strictly greater than zero, and the average of no values is 0.
//! The rule is applied per field, so fields of one result may average over
//! different subsets of rows.

use crate::models::{AggregateResult, RowRecord};
use serde_json::{json, Map, Value};

/// Levels reported by `levels/dropoff`, with the rate each one starts with.
const TRACKED_LEVELS: [(&str, &str); 4] = [
    ("0", "drop_rate"),
    ("20", "remain_rate"),
    ("50", "remain_rate"),
    ("100", "remain_rate"),
];

/// Mean of the strictly positive values of `field`, or 0 when there are none.
pub fn positive_average(rows: &[RowRecord], field: &str) -> f64 {
    let (sum, count) = rows
        .iter()
        .filter_map(|row| row.positive(field))
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Build a result from `(label, field)` pairs, averaging each field.
fn averages(rows: &[RowRecord], mapping: &[(&str, &str)]) -> AggregateResult {
    mapping
        .iter()
        .map(|(label, field)| (label.to_string(), json!(positive_average(rows, field))))
        .collect()
}

/// `apps/release`: version, build date and notes of the first row.
pub fn aggregate_app_release(rows: &[RowRecord]) -> AggregateResult {
    let Some(first) = rows.first() else {
        return AggregateResult::new();
    };

    ["appVersion", "buildDate", "notes"]
        .into_iter()
        .map(|field| (field.to_string(), first.value(field)))
        .collect()
}

/// `levels/dropoff`: drop/remain rates of the tracked levels.
///
/// Levels absent from the response keep a `null` rate.
pub fn aggregate_levels_dropoff(rows: &[RowRecord]) -> AggregateResult {
    let mut result: AggregateResult = TRACKED_LEVELS
        .iter()
        .map(|(level, rate)| {
            let mut slot = Map::new();
            slot.insert(rate.to_string(), Value::Null);
            (level.to_string(), Value::Object(slot))
        })
        .collect();

    for row in rows {
        let Some(level) = row.key("level") else {
            continue;
        };
        let Some(Value::Object(slot)) = result.get_mut(&level) else {
            continue;
        };

        for rate in ["drop_rate", "remain_rate"] {
            if row.contains(rate) {
                slot.insert(rate.to_string(), row.value(rate));
            }
        }
    }

    result
}

/// `engagement/engagement-time`: average engagement time per DAU.
pub fn aggregate_engagement_time(rows: &[RowRecord]) -> AggregateResult {
    averages(
        rows,
        &[
            ("avg_engagement_time", "avg_engagement_time_per_dau"),
            (
                "avg_new_users_engagement_time",
                "avg_engagement_time_per_dau_new_users",
            ),
            (
                "avg_old_users_engagement_time",
                "avg_engagement_time_per_dau_old_users",
            ),
        ],
    )
}

/// `monetization/day-show-inters`: interstitial impressions per DAU.
pub fn aggregate_day_show_inters(rows: &[RowRecord]) -> AggregateResult {
    averages(
        rows,
        &[
            ("avg_imp/dau", "impressions_per_dau"),
            ("avg_new_users_imp/dau", "new_users_impressions_per_dau"),
            ("avg_old_users_imp/dau", "old_users_impressions_per_dau"),
        ],
    )
}

/// `monetization/day-rewarded-video`: rewarded video impressions per DAU.
///
/// The backend reports these under the same field names as interstitials.
pub fn aggregate_day_rewarded_video(rows: &[RowRecord]) -> AggregateResult {
    averages(
        rows,
        &[
            ("avg_rwd/dau", "impressions_per_dau"),
            ("avg_new_users_rwd/dau", "new_users_impressions_per_dau"),
            ("avg_old_users_rwd/dau", "old_users_impressions_per_dau"),
        ],
    )
}

/// `monetization/total-revenue-date`: in-app purchase revenue.
pub fn aggregate_total_revenue_date(rows: &[RowRecord]) -> AggregateResult {
    averages(rows, &[("iap_rev", "iap_revenue")])
}

/// `monetization/average-revenue`: paying users and ARPPU.
pub fn aggregate_average_revenue(rows: &[RowRecord]) -> AggregateResult {
    averages(rows, &[("PU", "paying_users"), ("ARPPU", "arppu")])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: Vec<Value>) -> Vec<RowRecord> {
        values
            .into_iter()
            .filter_map(RowRecord::from_value)
            .collect()
    }

    #[test]
    fn test_positive_average_ignores_zero_negative_and_missing() {
        let data = rows(vec![
            json!({"x": 10}),
            json!({"x": 0}),
            json!({"x": -5}),
            json!({"y": 3}),
            json!({"x": "7"}),
            json!({"x": 30.0}),
        ]);
        assert_eq!(positive_average(&data, "x"), 20.0);
    }

    #[test]
    fn test_positive_average_of_nothing_is_zero() {
        let data = rows(vec![json!({"x": 0}), json!({"x": null})]);
        assert_eq!(positive_average(&data, "x"), 0.0);
        assert_eq!(positive_average(&[], "x"), 0.0);
    }

    #[test]
    fn test_fields_average_over_their_own_rows() {
        let data = rows(vec![
            json!({"paying_users": 4, "arppu": 0}),
            json!({"paying_users": 0, "arppu": 2.5}),
            json!({"paying_users": 8}),
        ]);
        let result = aggregate_average_revenue(&data);

        assert_eq!(result.get("PU"), Some(&json!(6.0)));
        assert_eq!(result.get("ARPPU"), Some(&json!(2.5)));
    }

    #[test]
    fn test_app_release_takes_first_row() {
        let data = rows(vec![
            json!({"appVersion": "1.2.0", "buildDate": "2024-03-01", "notes": ["fix"]}),
            json!({"appVersion": "1.1.0", "buildDate": "2024-02-01", "notes": []}),
        ]);
        let result = aggregate_app_release(&data);

        assert_eq!(result.get("appVersion"), Some(&json!("1.2.0")));
        assert_eq!(result.get("buildDate"), Some(&json!("2024-03-01")));
        assert_eq!(result.get("notes"), Some(&json!(["fix"])));
    }

    #[test]
    fn test_app_release_missing_fields_and_no_rows() {
        let data = rows(vec![json!({"appVersion": "2.0"})]);
        let result = aggregate_app_release(&data);
        assert_eq!(result.get("buildDate"), Some(&Value::Null));
        assert_eq!(result.len(), 3);

        assert!(aggregate_app_release(&[]).is_empty());
    }

    #[test]
    fn test_levels_dropoff_partial_levels() {
        let data = rows(vec![
            json!({"level": "0", "drop_rate": 0.12}),
            json!({"level": "50", "remain_rate": 0.4}),
            json!({"level": "7", "remain_rate": 0.9}),
        ]);
        let result = aggregate_levels_dropoff(&data);

        assert_eq!(result.get("0"), Some(&json!({"drop_rate": 0.12})));
        assert_eq!(result.get("20"), Some(&json!({"remain_rate": null})));
        assert_eq!(result.get("50"), Some(&json!({"remain_rate": 0.4})));
        assert_eq!(result.get("100"), Some(&json!({"remain_rate": null})));
        assert!(!result.contains_key("7"));
    }

    #[test]
    fn test_levels_dropoff_numeric_level_and_both_rates() {
        let data = rows(vec![json!({"level": 20, "drop_rate": 0.1, "remain_rate": 0.8})]);
        let result = aggregate_levels_dropoff(&data);

        assert_eq!(
            result.get("20"),
            Some(&json!({"drop_rate": 0.1, "remain_rate": 0.8}))
        );
    }

    #[test]
    fn test_engagement_time() {
        let data = rows(vec![
            json!({
                "avg_engagement_time_per_dau": 100,
                "avg_engagement_time_per_dau_new_users": 50,
                "avg_engagement_time_per_dau_old_users": 0
            }),
            json!({
                "avg_engagement_time_per_dau": 200,
                "avg_engagement_time_per_dau_new_users": 0,
                "avg_engagement_time_per_dau_old_users": 120
            }),
        ]);
        let result = aggregate_engagement_time(&data);

        assert_eq!(result.get("avg_engagement_time"), Some(&json!(150.0)));
        assert_eq!(result.get("avg_new_users_engagement_time"), Some(&json!(50.0)));
        assert_eq!(result.get("avg_old_users_engagement_time"), Some(&json!(120.0)));
    }

    #[test]
    fn test_rewarded_video_reads_interstitial_fields() {
        // Rewarded video rows are read through the interstitial field names;
        // reward-specific names are ignored.
        let data = rows(vec![json!({
            "impressions_per_dau": 3,
            "new_users_impressions_per_dau": 2,
            "old_users_impressions_per_dau": 4,
            "rewarded_impressions_per_dau": 99
        })]);

        let inters = aggregate_day_show_inters(&data);
        let rewarded = aggregate_day_rewarded_video(&data);

        assert_eq!(inters.get("avg_imp/dau"), Some(&json!(3.0)));
        assert_eq!(rewarded.get("avg_rwd/dau"), Some(&json!(3.0)));
        assert_eq!(rewarded.get("avg_new_users_rwd/dau"), Some(&json!(2.0)));
        assert_eq!(rewarded.get("avg_old_users_rwd/dau"), Some(&json!(4.0)));
    }

    #[test]
    fn test_total_revenue_date() {
        let data = rows(vec![
            json!({"iap_revenue": 10}),
            json!({"iap_revenue": 0}),
            json!({"iap_revenue": 30}),
        ]);
        let result = aggregate_total_revenue_date(&data);
        assert_eq!(result.get("iap_rev"), Some(&json!(20.0)));
    }
}
