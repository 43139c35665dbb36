use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// Fixed overall cap on a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability to send one HTTP POST.
///
/// Returns the status code of whatever response came back, or an error when
/// no response was obtained at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: &[(String, String)],
    ) -> Result<u16, TransportError>;
}

/// Transport backed by a shared `reqwest::Client`.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// Client with the default 30 second cap.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT, default_user_agent())
    }

    pub fn with_timeout(timeout: Duration, user_agent: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.into())
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;

        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: &[(String, String)],
    ) -> Result<u16, TransportError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body);

        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        match request.send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(err) => {
                if err.is_timeout() {
                    Err(TransportError::Timeout)
                } else if err.is_connect() {
                    Err(TransportError::Connect(err.to_string()))
                } else {
                    Err(TransportError::Request(err.to_string()))
                }
            }
        }
    }
}

pub fn default_user_agent() -> String {
    format!("webhook-fanout/{}", env!("CARGO_PKG_VERSION"))
}
