//! Retention rate aggregation.
//!
//! Retention is a weighted ratio over the whole window: the D1 rate is the sum
//! of D1 returners divided by the sum of day-0 users of the rows that report
//! any D1 returners, and likewise for D7. It is not a mean of per-row ratios.

use crate::models::{AggregateResult, RowRecord};
use serde_json::json;

/// Running sums for the D1 and D7 cohorts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RetentionTally {
    d1_base: f64,
    d1_returned: f64,
    d7_base: f64,
    d7_returned: f64,
}

impl RetentionTally {
    fn add(&mut self, row: &RowRecord) {
        let metrics = row.child("metricValue");
        let d0 = metrics.number_or_zero("d0");
        let d1 = metrics.number_or_zero("d1");
        let d7 = metrics.number_or_zero("d7");

        if d1 > 0.0 {
            self.d1_base += d0;
            self.d1_returned += d1;
        }
        if d7 > 0.0 {
            self.d7_base += d0;
            self.d7_returned += d7;
        }
    }

    fn rate_d1(&self) -> f64 {
        ratio(self.d1_returned, self.d1_base)
    }

    fn rate_d7(&self) -> f64 {
        ratio(self.d7_returned, self.d7_base)
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// `leaderboard/details/retention-rate`: weighted D1 and D7 retention.
pub fn aggregate_retention(rows: &[RowRecord]) -> AggregateResult {
    let mut tally = RetentionTally::default();
    for row in rows {
        tally.add(row);
    }

    AggregateResult::from([
        ("avg_rr_d1".to_string(), json!(tally.rate_d1())),
        ("avg_rr_d7".to_string(), json!(tally.rate_d7())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn rows(values: Vec<Value>) -> Vec<RowRecord> {
        values
            .into_iter()
            .filter_map(RowRecord::from_value)
            .collect()
    }

    #[test]
    fn test_weighted_ratio() {
        let data = rows(vec![
            json!({"metricValue": {"d0": 100, "d1": 50, "d7": 0}}),
            json!({"metricValue": {"d0": 50, "d1": 0, "d7": 10}}),
        ]);
        let result = aggregate_retention(&data);

        assert_eq!(result.get("avg_rr_d1"), Some(&json!(0.5)));
        assert_eq!(result.get("avg_rr_d7"), Some(&json!(0.2)));
    }

    #[test]
    fn test_weighted_not_row_average() {
        // Row ratios are 0.5 and 0.1; their mean would be 0.3.
        let data = rows(vec![
            json!({"metricValue": {"d0": 10, "d1": 5}}),
            json!({"metricValue": {"d0": 90, "d1": 9}}),
        ]);
        let result = aggregate_retention(&data);

        assert_eq!(result.get("avg_rr_d1"), Some(&json!(14.0 / 100.0)));
        assert_eq!(result.get("avg_rr_d7"), Some(&json!(0.0)));
    }

    #[test]
    fn test_missing_metric_value_contributes_nothing() {
        let data = rows(vec![
            json!({"date": "2024-03-01"}),
            json!({"metricValue": {"d1": 3}}),
        ]);
        let tally = data.iter().fold(RetentionTally::default(), |mut t, r| {
            t.add(r);
            t
        });

        assert_eq!(tally.d1_base, 0.0);
        assert_eq!(tally.d1_returned, 3.0);
        assert_eq!(tally.rate_d1(), 0.0);
    }

    #[test]
    fn test_empty_rows() {
        let result = aggregate_retention(&[]);
        assert_eq!(result.get("avg_rr_d1"), Some(&json!(0.0)));
        assert_eq!(result.get("avg_rr_d7"), Some(&json!(0.0)));
    }
}
