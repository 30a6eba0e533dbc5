//! HTTP client for the analytics API.

use super::{FetchError, FetchFuture, Fetcher};
use crate::models::{FetchDescriptor, RequestSpec};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Parse the API base URL, making sure endpoint paths join below it.
pub fn parse_base_url(base_url: &str) -> Result<Url> {
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&normalized).with_context(|| format!("Invalid base URL: {}", base_url))
}

/// Full request URL for a descriptor.
///
/// GET requests carry their parameters in the query string; the retention
/// POST carries only `appId` there and the rest in its JSON body.
pub fn request_url(base: &Url, descriptor: &FetchDescriptor) -> Result<Url, FetchError> {
    let mut url = base
        .join(descriptor.endpoint.path())
        .map_err(|e| FetchError::Transport(format!("invalid endpoint URL: {}", e)))?;

    match &descriptor.request {
        RequestSpec::Query(params) => {
            url.query_pairs_mut().extend_pairs(params);
        }
        RequestSpec::Json(_) => {
            url.query_pairs_mut()
                .append_pair("appId", &descriptor.app_id);
        }
    }

    Ok(url)
}

/// Fetcher backed by a reqwest client carrying the bearer token.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
    timeout_seconds: u64,
}

impl HttpFetcher {
    pub fn new(base_url: &str, token: &str, timeout_seconds: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("Bearer token contains invalid header characters")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            timeout_seconds,
        })
    }

    async fn execute(&self, descriptor: &FetchDescriptor) -> Result<Value, FetchError> {
        let url = request_url(&self.base_url, descriptor)?;
        debug!("{} {}", descriptor.method(), url);

        let request = match &descriptor.request {
            RequestSpec::Query(_) => self.client.get(url),
            RequestSpec::Json(payload) => self.client.post(url).json(payload),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Transport(format!(
                    "timed out after {}s",
                    self.timeout_seconds
                ))
            } else if e.is_connect() {
                FetchError::Transport(format!("cannot connect to {}", self.base_url))
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let expected = descriptor.endpoint.expected_status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read body: {}", e)))?;

        if status != expected {
            debug!("Response body: {}", body);
            return Err(FetchError::Status { status, expected });
        }

        serde_json::from_str(&body).map_err(|e| {
            debug!("Response body: {}", body);
            FetchError::Decode(e.to_string())
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, descriptor: &'a FetchDescriptor) -> FetchFuture<'a> {
        Box::pin(self.execute(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Endpoint, GeoFilter, RetentionPayload};
    use chrono::NaiveDate;

    fn base() -> Url {
        parse_base_url("https://bi.example.com/api").unwrap()
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        assert_eq!(base().as_str(), "https://bi.example.com/api/");
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_get_url_carries_ordered_query() {
        let descriptor = FetchDescriptor {
            app_id: "A1".to_string(),
            endpoint: Endpoint::LevelsDropoff,
            country: Some("United States".to_string()),
            request: RequestSpec::Query(vec![
                ("startDate".to_string(), "2024-03-01".to_string()),
                ("appId".to_string(), "A1".to_string()),
                ("country".to_string(), "United States".to_string()),
            ]),
        };

        let url = request_url(&base(), &descriptor).unwrap();
        assert_eq!(
            url.as_str(),
            "https://bi.example.com/api/levels/dropoff?startDate=2024-03-01&appId=A1&country=United+States"
        );
    }

    #[test]
    fn test_post_url_carries_app_id_only() {
        let descriptor = FetchDescriptor {
            app_id: "A1".to_string(),
            endpoint: Endpoint::RetentionRate,
            country: None,
            request: RequestSpec::Json(RetentionPayload {
                app_id: "A1".to_string(),
                from: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
                to: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
                filters: GeoFilter { geo: vec![] },
                groupings: vec!["date".to_string()],
            }),
        };

        let url = request_url(&base(), &descriptor).unwrap();
        assert_eq!(
            url.as_str(),
            "https://bi.example.com/api/leaderboard/details/retention-rate?appId=A1"
        );
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        assert!(HttpFetcher::new("https://bi.example.com/", "bad\ntoken", 10).is_err());
        assert!(HttpFetcher::new("https://bi.example.com/", "good-token", 10).is_ok());
    }
}
