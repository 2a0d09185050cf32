use async_trait::async_trait;
use core_logic::{MetadataSource, NetworkError};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Plain HTTPS GET returning decoded JSON
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    client: Client,
    timeout: Duration,
}

impl HttpMetadataSource {
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flow-bulk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::InvalidResponse {
                endpoint: "client".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, url: &str, e: reqwest::Error) -> NetworkError {
        if e.is_timeout() {
            NetworkError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
                endpoint: url.to_string(),
            }
        } else if e.is_connect() {
            NetworkError::ConnectionRefused {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }
        } else if e.is_decode() {
            NetworkError::InvalidResponse {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            NetworkError::ConnectionRefused {
                endpoint: url.to_string(),
                reason: format!("network error: {}", e),
            }
        }
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, NetworkError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::HttpError {
                status_code: status.as_u16(),
                endpoint: url.to_string(),
                body,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| self.classify(url, e))
    }
}
