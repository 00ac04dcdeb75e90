//! Quota API Adapter
//!
//! Implements the [`QuotaSource`] port against the HTTP quota-accounting API.
//! Each fetch is a single POST with an empty body, bounded by a deadline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::ports::{QuotaRecord, QuotaSource};
use crate::error::{Error, FetchError, Result};

/// `code` value the API uses to signal success
pub const SUCCESS_CODE: &str = "0000";

// =============================================================================
// Response Types
// =============================================================================

/// Response envelope returned by the quota API
#[derive(Debug, Deserialize)]
struct QuotaEnvelope {
    code: String,
    #[serde(default)]
    data: Option<Vec<QuotaRecord>>,
}

/// Decode a response body and check the envelope's success code.
pub fn decode_envelope(body: &[u8]) -> std::result::Result<Vec<QuotaRecord>, FetchError> {
    let envelope: QuotaEnvelope = serde_json::from_slice(body).map_err(FetchError::Decode)?;

    if envelope.code != SUCCESS_CODE {
        return Err(FetchError::Semantic(envelope.code));
    }

    Ok(envelope.data.unwrap_or_default())
}

// =============================================================================
// Quota API Client
// =============================================================================

/// HTTP client for the quota API
#[derive(Debug, Clone)]
pub struct QuotaApiClient {
    endpoint: String,
    client: Client,
}

impl QuotaApiClient {
    /// Create a client for `endpoint`.
    ///
    /// The endpoint is not validated here; a malformed URL surfaces as
    /// [`FetchError::RequestBuild`] on every fetch.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(endpoint, client))
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    /// Endpoint this client posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch quota records, giving up once `deadline` has elapsed.
    ///
    /// The in-flight request is dropped on timeout, which cancels it.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn fetch_records(
        &self,
        deadline: Duration,
    ) -> std::result::Result<Vec<QuotaRecord>, FetchError> {
        match tokio::time::timeout(deadline, self.request()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(deadline)),
        }
    }

    async fn request(&self) -> std::result::Result<Vec<QuotaRecord>, FetchError> {
        let request = self
            .client
            .post(&self.endpoint)
            .build()
            .map_err(FetchError::RequestBuild)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::UnexpectedStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(classify_transport_error)?;

        debug!(bytes = body.len(), "Received quota API response");

        decode_envelope(&body)
    }
}

fn classify_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_builder() {
        FetchError::RequestBuild(e)
    } else {
        FetchError::Network(e)
    }
}

#[async_trait]
impl QuotaSource for QuotaApiClient {
    async fn fetch(&self, deadline: Duration) -> std::result::Result<Vec<QuotaRecord>, FetchError> {
        self.fetch_records(deadline).await
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}
