//! Backend call types and the reqwest-based HTTP backend.

use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use shakegate_core::HttpMethod;
use tracing::debug;

use crate::traits::Backend;

/// A single outbound call to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub method: HttpMethod,
    /// Path relative to the backend base URL, starting with `/`.
    pub path: String,
    /// JSON body; only sent for methods that carry one.
    pub body: Option<Value>,
    /// Full `Authorization` header value, when forwarding a credential.
    pub authorization: Option<String>,
}

impl BackendRequest {
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            authorization: None,
        }
    }
}

/// Why a backend call did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendFailure {
    /// The backend answered with a non-success status.
    Status { status: u16, body: Value },
    /// The backend could not be reached, or the exchange broke off.
    ///
    /// `detail` is for logs only and never reaches clients.
    Transport { detail: String },
}

/// Outcome of one backend call.
pub type BackendResult = Result<Value, BackendFailure>;

/// Decodes a response body: JSON when possible, otherwise the raw text.
/// An empty body is `null`.
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// Backend reached over plain HTTP with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a backend client for `base_url` with a per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    /// (e.g. TLS backend initialization fails).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build backend HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn call(&self, request: BackendRequest) -> BackendResult {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, self.url(&request.path));
        if let Some(authorization) = &request.authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        if request.method.has_body() {
            builder = builder.json(request.body.as_ref().unwrap_or(&Value::Null));
        }

        let response = builder.send().await.map_err(|e| BackendFailure::Transport {
            detail: e.to_string(),
        })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| BackendFailure::Transport {
            detail: e.to_string(),
        })?;
        let body = decode_body(&bytes);

        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            "backend call complete"
        );

        if status.is_success() {
            Ok(body)
        } else {
            Err(BackendFailure::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
