//! Response aggregation.
//!
//! Every endpoint maps to exactly one aggregator, which reduces the rows of
//! one response to a small set of labelled statistics.

pub mod aggregator;
pub mod retention;

pub use aggregator::*;
pub use retention::aggregate_retention;

use crate::fetch::FetchError;
use crate::models::{AggregateResult, Endpoint, RowRecord};
use serde_json::Value;
use tracing::{debug, error};

/// Signature shared by all aggregators.
pub type Aggregator = fn(&[RowRecord]) -> AggregateResult;

impl Endpoint {
    /// The aggregator that reduces this endpoint's rows.
    pub fn aggregator(&self) -> Aggregator {
        match self {
            Endpoint::AppRelease => aggregate_app_release,
            Endpoint::LevelsDropoff => aggregate_levels_dropoff,
            Endpoint::EngagementTime => aggregate_engagement_time,
            Endpoint::DayShowInters => aggregate_day_show_inters,
            Endpoint::DayRewardedVideo => aggregate_day_rewarded_video,
            Endpoint::TotalRevenueDate => aggregate_total_revenue_date,
            Endpoint::AverageRevenue => aggregate_average_revenue,
            Endpoint::RetentionRate => aggregate_retention,
        }
    }
}

/// Aggregate rows for an endpoint identified by its path.
///
/// Unknown paths are logged and yield an empty result. Planned descriptors
/// resolve their aggregator through [`Endpoint::aggregator`] instead.
#[allow(dead_code)]
pub fn aggregate_path(path: &str, rows: &[RowRecord]) -> AggregateResult {
    match Endpoint::from_path(path) {
        Some(endpoint) => (endpoint.aggregator())(rows),
        None => {
            error!("No calculations defined for path: {}", path);
            AggregateResult::new()
        }
    }
}

/// Split a response body into row records.
///
/// GET endpoints must answer with an array of objects. Retention answers with
/// an array whose non-object items are skipped.
pub fn parse_rows(endpoint: Endpoint, body: Value) -> Result<Vec<RowRecord>, FetchError> {
    let Value::Array(items) = body else {
        return Err(FetchError::Shape("expected a JSON array"));
    };

    let total = items.len();
    let rows: Vec<RowRecord> = items.into_iter().filter_map(RowRecord::from_value).collect();

    if rows.len() != total {
        if endpoint == Endpoint::RetentionRate {
            debug!("Skipped {} non-object retention rows", total - rows.len());
        } else {
            return Err(FetchError::Shape("expected a list of objects"));
        }
    }

    Ok(rows)
}
