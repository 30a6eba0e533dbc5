//! Request planning.
//!
//! Enumerates every fetch the harvester performs: for each application,
//! each GET endpoint globally and per country, then the retention
//! endpoint globally and per country.

pub mod countries;

pub use countries::CountryCodes;

use crate::config::{Config, ConfigError};
use crate::models::{Endpoint, FetchDescriptor, GeoFilter, RequestSpec, RetentionPayload};
use chrono::NaiveDate;
use tracing::{debug, error, warn};

/// Builds the ordered list of fetch descriptors for a run.
#[derive(Debug, Clone)]
pub struct RequestPlanner {
    app_ids: Vec<String>,
    countries: Vec<String>,
    params: Vec<(String, String)>,
    from: NaiveDate,
    to: NaiveDate,
    country_codes: CountryCodes,
}

impl RequestPlanner {
    /// Create a planner from a validated configuration.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let (start, end) = config.query.window()?;
        let from = start.pred_opt().ok_or(ConfigError::DateRange(start))?;

        Ok(Self {
            app_ids: dedup("application id", &config.app_ids),
            countries: dedup("country", &config.countries),
            params: config.query.params()?,
            from,
            to: end,
            country_codes: CountryCodes::with_overrides(&config.country_codes),
        })
    }

    /// Number of descriptors [`plan`](Self::plan) produces.
    pub fn expected_count(&self) -> usize {
        let variants = 1 + self.countries.len();
        self.app_ids.len() * (Endpoint::METRICS.len() * variants + variants)
    }

    /// Enumerate all descriptors in a fixed order.
    pub fn plan(&self) -> Vec<FetchDescriptor> {
        let mut descriptors = Vec::with_capacity(self.expected_count());

        for app_id in &self.app_ids {
            for endpoint in Endpoint::METRICS {
                descriptors.push(self.metric_descriptor(app_id, endpoint, None));
                for country in &self.countries {
                    descriptors.push(self.metric_descriptor(app_id, endpoint, Some(country)));
                }
            }

            descriptors.push(self.retention_descriptor(app_id, None));
            for country in &self.countries {
                descriptors.push(self.retention_descriptor(app_id, Some(country)));
            }
        }

        debug!("Planned {} requests", descriptors.len());
        descriptors
    }

    fn metric_descriptor(
        &self,
        app_id: &str,
        endpoint: Endpoint,
        country: Option<&str>,
    ) -> FetchDescriptor {
        let mut params = self.params.clone();
        params.push(("appId".to_string(), app_id.to_string()));
        if let Some(country) = country {
            params.push(("country".to_string(), country.to_string()));
        }

        FetchDescriptor {
            app_id: app_id.to_string(),
            endpoint,
            country: country.map(String::from),
            request: RequestSpec::Query(params),
        }
    }

    fn retention_descriptor(&self, app_id: &str, country: Option<&str>) -> FetchDescriptor {
        let geo = match country {
            None => Vec::new(),
            Some(name) => match self.country_codes.code(name) {
                Some(code) => vec![code.to_string()],
                None => {
                    error!("Country code for {} not found, using global retention", name);
                    Vec::new()
                }
            },
        };

        FetchDescriptor {
            app_id: app_id.to_string(),
            endpoint: Endpoint::RetentionRate,
            country: country.map(String::from),
            request: RequestSpec::Json(RetentionPayload {
                app_id: app_id.to_string(),
                from: self.from,
                to: self.to,
                filters: GeoFilter { geo },
                groupings: vec!["date".to_string()],
            }),
        }
    }
}

/// Drop repeated entries, keeping first occurrences in order.
fn dedup(kind: &str, values: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if unique.contains(value) {
            warn!("Ignoring duplicate {}: {}", kind, value);
        } else {
            unique.push(value.clone());
        }
    }
    unique
}
