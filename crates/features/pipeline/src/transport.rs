//! Transport abstraction and request/response shapes.
//!
//! The pipeline never talks to a socket. It prepares a [`WireRequest`] and
//! hands it to whatever [`Transport`] the embedding application provides;
//! timeouts are that transport's responsibility.

use serde_json::Value;
use std::borrow::Cow;
use std::future::Future;

/// Methods the pipeline issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// A request as the caller describes it, before the pipeline decorates it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    /// Seal the body into a transport envelope; the response body is
    /// expected sealed as well.
    pub encrypt: bool,
    /// Skip identity-token attachment (login, refresh, public endpoints).
    pub skip_auth: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::Get, path: path.into(), body: None, encrypt: false, skip_auth: false }
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
            encrypt: false,
            skip_auth: false,
        }
    }

    /// Seal the body before sending.
    #[must_use]
    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }

    /// Do not attach the identity token.
    #[must_use]
    pub fn without_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }
}

/// The fully prepared request handed to the transport.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    /// Serialized body (plain JSON or a sealed envelope).
    pub body: Option<String>,
}

impl WireRequest {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw response from the transport.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl WireResponse {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failure classes a transport can report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection-level failure (refused, reset, DNS). Eligible for
    /// backoff retry.
    #[error("Network error: {message}")]
    Network { message: Cow<'static, str> },

    /// Anything else (protocol violation, oversized body). Never retried.
    #[error("Transport error: {message}")]
    Other { message: Cow<'static, str> },
}

/// The network seam. Implemented over the application's HTTP client; tests
/// use an in-memory double.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: WireRequest,
    ) -> impl Future<Output = Result<WireResponse, TransportError>> + Send;
}
