//! Shared HTTP transport for provider adapters.

use std::time::Duration;

use tracing::debug;

use crate::error::{FailureCause, FxError, FxResult};

const USER_AGENT: &str = concat!("coinrate-exchange/", env!("CARGO_PKG_VERSION"));

/// Issues one bounded GET per call. Cheap to clone; clones share a
/// connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> FxResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` and return the body of a 2xx response.
    pub async fn get_text(&self, provider: &str, url: &str) -> FxResult<String> {
        debug!(provider, url, "Requesting rate");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FxError::provider(provider, classify(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::provider(provider, FailureCause::Status(status.as_u16())));
        }

        response
            .text()
            .await
            .map_err(|e| FxError::provider(provider, classify(&e)))
    }
}

fn classify(err: &reqwest::Error) -> FailureCause {
    if err.is_timeout() {
        FailureCause::Timeout
    } else if err.is_decode() {
        FailureCause::Decode(err.to_string())
    } else {
        FailureCause::Network(err.to_string())
    }
}

/// Decode a JSON body, attributing failures to `provider`.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(provider: &str, body: &str) -> FxResult<T> {
    serde_json::from_str(body)
        .map_err(|e| FxError::provider(provider, FailureCause::Decode(e.to_string())))
}
