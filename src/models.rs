//! Data models for the harvester.
//!
//! This module contains the core data structures shared by the planner,
//! the aggregators and the report store: endpoints, fetch descriptors,
//! row records and the nested report.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Country label used for requests that carry no country filter.
pub const GLOBAL_COUNTRY: &str = "Global";

/// Flat mapping from metric label to summary value, produced by one aggregator call.
pub type AggregateResult = BTreeMap<String, Value>;

/// Metrics recorded for one (application, country) pair.
pub type CountryMetrics = BTreeMap<String, Value>;

/// Country label to metrics for one application.
pub type AppReport = BTreeMap<String, CountryMetrics>;

/// Application identifier to per-country metrics.
pub type Report = BTreeMap<String, AppReport>;

/// HTTP method used to query an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMethod::Get => write!(f, "GET"),
            RequestMethod::Post => write!(f, "POST"),
        }
    }
}

/// Analytics endpoint, each mapped to one HTTP resource and one aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    AppRelease,
    LevelsDropoff,
    EngagementTime,
    DayShowInters,
    DayRewardedVideo,
    TotalRevenueDate,
    AverageRevenue,
    /// Cohort retention, queried by POST with a JSON payload.
    RetentionRate,
}

impl Endpoint {
    /// GET-style endpoints in the order they are planned.
    pub const METRICS: [Endpoint; 7] = [
        Endpoint::AppRelease,
        Endpoint::LevelsDropoff,
        Endpoint::EngagementTime,
        Endpoint::DayShowInters,
        Endpoint::DayRewardedVideo,
        Endpoint::TotalRevenueDate,
        Endpoint::AverageRevenue,
    ];

    /// Path of the endpoint relative to the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::AppRelease => "apps/release",
            Endpoint::LevelsDropoff => "levels/dropoff",
            Endpoint::EngagementTime => "engagement/engagement-time",
            Endpoint::DayShowInters => "monetization/day-show-inters",
            Endpoint::DayRewardedVideo => "monetization/day-rewarded-video",
            Endpoint::TotalRevenueDate => "monetization/total-revenue-date",
            Endpoint::AverageRevenue => "monetization/average-revenue",
            Endpoint::RetentionRate => "leaderboard/details/retention-rate",
        }
    }

    /// Resolve a path string back to its endpoint.
    pub fn from_path(path: &str) -> Option<Self> {
        Self::METRICS
            .into_iter()
            .chain(std::iter::once(Endpoint::RetentionRate))
            .find(|endpoint| endpoint.path() == path)
    }

    pub fn method(&self) -> RequestMethod {
        match self {
            Endpoint::RetentionRate => RequestMethod::Post,
            _ => RequestMethod::Get,
        }
    }

    /// HTTP status the backend answers with on success.
    pub fn expected_status(&self) -> u16 {
        match self.method() {
            RequestMethod::Get => 200,
            RequestMethod::Post => 201,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Geography filter of the retention payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoFilter {
    /// Two-letter ISO codes; empty means global.
    pub geo: Vec<String>,
}

/// JSON body sent to the retention endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPayload {
    #[serde(rename = "appId")]
    pub app_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub filters: GeoFilter,
    pub groupings: Vec<String>,
}

/// Request parameters carried by a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestSpec {
    /// Ordered query-string parameters for a GET request.
    Query(Vec<(String, String)>),
    /// JSON body for a POST request.
    Json(RetentionPayload),
}

/// One logical fetch operation, with the context needed to route its response.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchDescriptor {
    pub app_id: String,
    pub endpoint: Endpoint,
    /// `None` for the global variant.
    pub country: Option<String>,
    pub request: RequestSpec,
}

impl FetchDescriptor {
    pub fn method(&self) -> RequestMethod {
        match self.request {
            RequestSpec::Query(_) => RequestMethod::Get,
            RequestSpec::Json(_) => RequestMethod::Post,
        }
    }

    /// Country label under which the response is merged.
    pub fn country_label(&self) -> &str {
        self.country.as_deref().unwrap_or(GLOBAL_COUNTRY)
    }
}

impl fmt::Display for FetchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{} / {}]",
            self.method(),
            self.endpoint,
            self.app_id,
            self.country_label()
        )
    }
}

/// One object of an endpoint's response array.
///
/// Every field read goes through an accessor with an explicit default so
/// missing, null and non-numeric values are handled the same way everywhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord {
    fields: Map<String, Value>,
}

impl RowRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Wrap a JSON value, returning `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(fields)),
            _ => None,
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Numeric value of a field, `None` when absent or not a number.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }

    /// Numeric value of a field, defaulting to zero.
    pub fn number_or_zero(&self, field: &str) -> f64 {
        self.number(field).unwrap_or(0.0)
    }

    /// Numeric value of a field only when it is strictly positive.
    pub fn positive(&self, field: &str) -> Option<f64> {
        self.number(field).filter(|v| *v > 0.0)
    }

    /// Raw value of a field, `null` when absent.
    pub fn value(&self, field: &str) -> Value {
        self.fields.get(field).cloned().unwrap_or(Value::Null)
    }

    /// Field rendered as a key: strings verbatim, integers in decimal.
    pub fn key(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => n
                .as_i64()
                .map(|i| i.to_string())
                .or_else(|| n.as_u64().map(|u| u.to_string())),
            _ => None,
        }
    }

    /// Nested object field, empty when absent or not an object.
    pub fn child(&self, field: &str) -> RowRecord {
        match self.fields.get(field) {
            Some(Value::Object(fields)) => RowRecord::new(fields.clone()),
            _ => RowRecord::default(),
        }
    }
}
