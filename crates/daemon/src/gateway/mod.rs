//! AI gateway client
//!
//! Turns recorder output into structured intent, or approved intent into test
//! code, through an external language-model endpoint. OpenAI-compatible chat
//! endpoints get a chat payload; any other endpoint receives the request
//! payload as-is. Failed attempts are retried with linear backoff and every
//! response is normalized before it leaves the gateway.

pub mod normalize;
pub mod transport;

use recplay_common::{AiRequest, AiRequestKind, AiResponse, Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AiConfig;

pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Backoff unit; attempt `n` is followed by `n` units of delay
const BACKOFF_STEP: Duration = Duration::from_millis(1000);

const SYSTEM_PROMPT: &str = "You are an assistant for browser test automation with Playwright. \
Answer with the requested artifact only, without commentary.";

/// Resolved gateway settings
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl GatewayConfig {
    /// Merge file settings over `RECPLAY_AI_*` environment variables over
    /// defaults
    pub fn resolve(file: &AiConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            endpoint: file.endpoint.clone().or_else(|| var("RECPLAY_AI_ENDPOINT")),
            api_key: file.api_key.clone().or_else(|| var("RECPLAY_AI_API_KEY")),
            model: file
                .model
                .clone()
                .or_else(|| var("RECPLAY_AI_MODEL"))
                .unwrap_or(defaults.model),
            timeout: file
                .timeout_ms
                .or_else(|| var("RECPLAY_AI_TIMEOUT_MS").and_then(|v| v.parse().ok()))
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            max_retries: file
                .max_retries
                .or_else(|| var("RECPLAY_AI_MAX_RETRIES").and_then(|v| v.parse().ok()))
                .unwrap_or(defaults.max_retries),
        }
    }

    /// Resolve against the process environment
    pub fn from_env(file: &AiConfig) -> Self {
        Self::resolve(file, |key| std::env::var(key).ok())
    }
}

/// Retrying, normalizing client for the language-model endpoint
pub struct AiGateway {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
}

impl AiGateway {
    pub fn new(config: GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Call with the configured timeout and retry budget
    pub async fn call(&self, request: &AiRequest) -> Result<AiResponse> {
        self.call_with(request, self.config.timeout, self.config.max_retries)
            .await
    }

    /// Call with an explicit per-attempt timeout and attempt budget. At least
    /// one attempt is always made.
    pub async fn call_with(
        &self,
        request: &AiRequest,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<AiResponse> {
        let url = self.endpoint()?;
        let body = build_body(&url, &self.config.model, request);
        let attempts = max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            debug!(
                "AI {} attempt {}/{} to {}",
                request.kind.as_str(),
                attempt,
                attempts,
                url
            );

            match self
                .transport
                .post_json(&url, self.config.api_key.as_deref(), &body, timeout)
                .await
            {
                Ok(resp) if resp.is_success() => {
                    info!("AI {} succeeded on attempt {}", request.kind.as_str(), attempt);
                    return Ok(normalize::normalize(request.kind, &resp.body));
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}: {}", resp.status, snippet(&resp.body));
                }
                Err(e) => last_error = e.to_string(),
            }

            warn!(
                "AI {} attempt {}/{} failed: {}",
                request.kind.as_str(),
                attempt,
                attempts,
                last_error
            );
            if attempt < attempts {
                tokio::time::sleep(BACKOFF_STEP * attempt).await;
            }
        }

        Err(Error::Upstream {
            attempts,
            message: last_error,
        })
    }

    fn endpoint(&self) -> Result<Url> {
        let raw = self
            .config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                Error::InvalidConfig(
                    "no AI endpoint configured (set RECPLAY_AI_ENDPOINT or [ai].endpoint)".into(),
                )
            })?;

        let url = Url::parse(raw)
            .map_err(|e| Error::InvalidConfig(format!("invalid AI endpoint '{}': {}", raw, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::InvalidConfig(format!(
                "AI endpoint must be http(s), got '{}'",
                other
            ))),
        }
    }
}

/// OpenAI-compatible endpoints take a chat payload
pub fn is_chat_endpoint(url: &Url) -> bool {
    url.host_str().map(|h| h.contains("openai")).unwrap_or(false)
        || url.path().contains("/chat/completions")
}

/// Request body for the endpoint shape
pub fn build_body(url: &Url, model: &str, request: &AiRequest) -> Value {
    if !is_chat_endpoint(url) {
        return request.payload.clone();
    }

    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": user_message(request) },
        ],
        "temperature": 0.2,
    })
}

fn user_message(request: &AiRequest) -> String {
    let payload = match &request.payload {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };

    match request.kind {
        AiRequestKind::Analyze => format!(
            "Analyze this recorded browser session. Reply with a JSON object with the fields \
             \"intent\" (string), \"steps\" (array), \"assertions\" (array) and \"confidence\" \
             (number between 0 and 1).\n\n{}",
            payload
        ),
        AiRequestKind::Generate => format!(
            "Write a Playwright test in JavaScript for the following approved intent. Reply with \
             the code only.\n\n{}",
            payload
        ),
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};
    use tokio::time::Instant;

    /// Replays scripted outcomes and records when each call happened
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<std::result::Result<TransportResponse, TransportError>>>,
        calls: Mutex<Vec<(Instant, Value)>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<std::result::Result<TransportResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_json(
            &self,
            _url: &Url,
            _bearer: Option<&str>,
            body: &Value,
            _timeout: Duration,
        ) -> std::result::Result<TransportResponse, TransportError> {
            self.calls.lock().push((Instant::now(), body.clone()));
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("script exhausted".into())))
        }
    }

    fn ok(body: &str) -> std::result::Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn gateway(endpoint: &str, transport: Arc<ScriptedTransport>) -> AiGateway {
        AiGateway::new(
            GatewayConfig {
                endpoint: Some(endpoint.to_string()),
                ..Default::default()
            },
            transport,
        )
    }

    fn generate(payload: Value) -> AiRequest {
        AiRequest {
            kind: AiRequestKind::Generate,
            payload,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_linear_backoff() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout(10_000)),
            Ok(TransportResponse {
                status: 503,
                body: "overloaded".into(),
            }),
            ok(r#"{"choices":[{"message":{"content":"await page.goto('x')"}}]}"#),
        ]);
        let gw = gateway("https://api.openai.com/v1/chat/completions", transport.clone());

        let resp = gw
            .call_with(&generate(json!({"intent": "open"})), Duration::from_secs(10), 3)
            .await
            .unwrap();
        assert_eq!(
            resp,
            AiResponse::Generate {
                code: "await page.goto('x')".into()
            }
        );

        let calls = transport.calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].0 - calls[0].0, Duration::from_millis(1000));
        assert_eq!(calls[2].0 - calls[1].0, Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_error_after_exhausting_attempts() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Network("connection refused".into())),
            Err(TransportError::Network("connection refused".into())),
        ]);
        let gw = gateway("https://llm.test/generate", transport.clone());

        let err = gw.call(&generate(json!({}))).await.unwrap_err();
        match err {
            Error::Upstream { attempts, message } => {
                assert_eq!(attempts, DEFAULT_MAX_RETRIES);
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(transport.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let transport = ScriptedTransport::new(vec![ok("await page.click('#a')")]);
        let gw = gateway("https://llm.test/generate", transport.clone());

        let resp = gw
            .call_with(&generate(json!({})), Duration::from_secs(1), 0)
            .await
            .unwrap();
        assert_eq!(resp, AiResponse::Generate { code: "await page.click('#a')".into() });
        assert_eq!(transport.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_or_bad_endpoint_fails_before_network() {
        let transport = ScriptedTransport::new(vec![]);
        let gw = AiGateway::new(GatewayConfig::default(), transport.clone());
        assert!(matches!(
            gw.call(&generate(json!({}))).await.unwrap_err(),
            Error::InvalidConfig(_)
        ));

        let gw = gateway("not a url", transport.clone());
        assert!(matches!(
            gw.call(&generate(json!({}))).await.unwrap_err(),
            Error::InvalidConfig(_)
        ));
        assert!(transport.calls.lock().is_empty());
    }

    #[test]
    fn test_body_shape_follows_endpoint() {
        let request = AiRequest {
            kind: AiRequestKind::Analyze,
            payload: json!({"code": "await page.goto('x')"}),
        };

        let chat = Url::parse("https://gateway.local/v1/chat/completions").unwrap();
        let body = build_body(&chat, "gpt-4o-mini", &request);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("await page.goto('x')"));

        let openai_host = Url::parse("https://my-openai-proxy.example/v1/x").unwrap();
        assert!(is_chat_endpoint(&openai_host));

        let raw = Url::parse("https://llm.local/analyze").unwrap();
        assert_eq!(build_body(&raw, "m", &request), request.payload);
    }

    #[test]
    fn test_config_file_overrides_env() {
        let env: HashMap<&str, &str> = [
            ("RECPLAY_AI_ENDPOINT", "https://env.test/v1/chat/completions"),
            ("RECPLAY_AI_API_KEY", "env-key"),
            ("RECPLAY_AI_TIMEOUT_MS", "2500"),
            ("RECPLAY_AI_MAX_RETRIES", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        let file = AiConfig {
            endpoint: Some("https://file.test/generate".into()),
            ..Default::default()
        };
        let config = GatewayConfig::resolve(&file, lookup);
        assert_eq!(config.endpoint.as_deref(), Some("https://file.test/generate"));
        assert_eq!(config.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.model, DEFAULT_MODEL);
    }
}
