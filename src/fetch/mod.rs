//! Fetching endpoint responses.
//!
//! The pipeline talks to the analytics backend through the [`Fetcher`]
//! trait; [`HttpFetcher`] is the reqwest implementation.

pub mod client;

pub use client::{request_url, HttpFetcher};

use crate::models::FetchDescriptor;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Recoverable failure of a single fetch. The descriptor is skipped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request failed with status {status} (expected {expected})")]
    Status { status: u16, expected: u16 },

    #[error("failed to decode JSON body: {0}")]
    Decode(String),

    #[error("unexpected JSON format: {0}")]
    Shape(&'static str),
}

/// Boxed future returned by [`Fetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, FetchError>> + Send + 'a>>;

/// Performs the network call for one descriptor.
pub trait Fetcher: Send + Sync {
    /// Fetch the JSON body of a successful response.
    fn fetch<'a>(&'a self, descriptor: &'a FetchDescriptor) -> FetchFuture<'a>;
}
