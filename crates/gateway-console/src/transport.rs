//! Request transport to the gateway backend.
//!
//! [`RemoteSync`] is the seam between the console and the network: one call
//! in, one JSON document out. Calls are at-most-once; nothing here retries.
//!
//! [`HttpRemote`] is the production implementation over `reqwest`. Paths are
//! relative to the configured API base.

use async_trait::async_trait;
use gateway_core::ConsoleSettings;
use gateway_protocol::CodecError;
use reqwest::Url;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Longest response body kept in a [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection failed.
    #[error("Request to {path} failed: {reason}")]
    Request { path: String, reason: String },

    /// The request did not complete within the configured timeout.
    #[error("Request to {path} timed out")]
    Timeout { path: String },

    /// Non-2xx answer without a JSON body.
    #[error("{path} returned HTTP {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    /// The answer was not the expected JSON.
    #[error(transparent)]
    Decode(#[from] CodecError),

    /// The base URL or a path could not form a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// HTTP method of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. `opcua/nodes`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Generic request transport.
///
/// An answer whose body is JSON is returned as `Ok` whatever the HTTP status:
/// the backend reports application failures (`{ok: false}`, `{error}`) in
/// the body, sometimes with a 4xx/5xx status.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn call(&self, request: ApiRequest) -> Result<Value, TransportError>;
}

/// [`RemoteSync`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base: Url,
}

impl HttpRemote {
    pub fn new(settings: &ConsoleSettings) -> Result<Self, TransportError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", settings.base_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| TransportError::Request {
                path: settings.base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidUrl(format!("{path}: {e}")))
    }
}

#[async_trait]
impl RemoteSync for HttpRemote {
    async fn call(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let url = self.url(&request.path)?;
        let path = request.path.clone();

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!("{:?} {}", request.method, path);
        let response = builder.send().await.map_err(|e| classify(&path, e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| classify(&path, e))?;

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Ok(value),
            Err(source) if status.is_success() => Err(CodecError::Decode {
                what: "backend",
                source,
            }
            .into()),
            Err(_) => Err(TransportError::Status {
                path,
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            }),
        }
    }
}

fn classify(path: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            path: path.to_string(),
        }
    } else {
        TransportError::Request {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
