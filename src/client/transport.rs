//! HTTP transport seam for gateway traffic.
//!
//! Everything above this module talks to gateways through [`Transport`], so
//! the retry wrapper, the endpoint fallback and the polling driver can be
//! exercised against scripted responses.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use std::time::Duration;
use tracing::debug;

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Value of the `Content-Type` header, if a body is sent.
    pub content_type: Option<String>,
    /// Request body.
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// A `GET` request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            content_type: None,
            body: None,
        }
    }

    /// A `POST` request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized.
    pub fn post_json<T: serde::Serialize + ?Sized>(url: impl Into<String>, body: &T) -> Result<Self> {
        Ok(Self {
            method: Method::POST,
            url: url.into(),
            content_type: Some("application/json".to_string()),
            body: Some(Bytes::from(serde_json::to_vec(body)?)),
        })
    }
}

/// A response as seen by the gateway client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Value of the `Content-Type` header.
    pub content_type: Option<String>,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response.
    #[must_use]
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// A `200 OK` JSON response.
    #[must_use]
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(200, Some("application/json"), value.to_string())
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the status is 429.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Whether the status is 5xx.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    fn mime(&self) -> Option<String> {
        self.content_type.as_deref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Whether the content type is JSON (`application/json` or `+json`).
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mime()
            .is_some_and(|m| m == "application/json" || m.ends_with("+json"))
    }

    /// The body as UTF-8 text, if the payload is textual.
    ///
    /// A payload counts as textual when its content type is `text/*` or JSON,
    /// or when no content type was sent. Non-UTF-8 bodies are never textual.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        let textual = match self.mime() {
            None => true,
            Some(m) => m.starts_with("text/") || self.is_json(),
        };
        if textual {
            std::str::from_utf8(&self.body).ok()
        } else {
            None
        }
    }
}

/// Sends HTTP requests to gateways.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request.
    ///
    /// Any HTTP status is a successful send; only failures to obtain a
    /// response are errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransientNetworkFailure`] if no response was received.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by `reqwest` with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with an optional per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("truthguard/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        debug!("{} {}", request.method, request.url);

        let mut builder = self.client.request(request.method.clone(), &request.url);
        if let Some(ref content_type) = request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::TransientNetworkFailure(format!("{}: {e}", request.url)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::TransientNetworkFailure(format!("{}: {e}", request.url)))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
