//! HTTP transport for the AI gateway

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a request produced no response
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Network(String),
}

/// A response of any status
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// POSTs JSON bodies with a per-call timeout
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        url: &Url,
        bearer: Option<&str>,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// Production transport on reqwest
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: &Url,
        bearer: Option<&str>,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let mut req = self.client.post(url.clone()).json(body).timeout(timeout);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| classify(e, timeout))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| classify(e, timeout))?;
        Ok(TransportResponse { status, body })
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout.as_millis() as u64)
    } else {
        TransportError::Network(e.to_string())
    }
}
