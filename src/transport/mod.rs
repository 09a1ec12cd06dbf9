//! HTTP transport layer
//!
//! This module provides the seam between the workflow and the network:
//! - `HttpTransport`: the trait every request goes through
//! - `ReqwestTransport`: the production implementation (feature `http`)
//! - `CancellationSignal`: caller-owned signal that aborts in-flight requests
//! - `dispatch`: sends one request under a deadline and a cancellation signal
//!
//! Transports return the status and parsed JSON body of *every* response,
//! success or not; mapping statuses to workflow errors is up to the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use posql_client::transport::{dispatch, HttpRequest, ReqwestTransport};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ReqwestTransport::new();
//! let request = HttpRequest::get("https://api.makeinfinite.dev/health");
//! let response = dispatch(&transport, request, Duration::from_secs(5), None).await?;
//! println!("status: {}", response.status);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "http")]
pub mod http;
#[cfg(test)]
pub(crate) mod mock;

#[cfg(feature = "http")]
pub use http::ReqwestTransport;

use crate::error::TransportError;
use crate::types::AccessToken;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

/// Outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Request method
    pub method: Method,

    /// Absolute URL
    pub url: String,

    /// Extra headers (name, value)
    pub headers: Vec<(String, String)>,

    /// JSON body, if any
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// A GET request without headers
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST request carrying a JSON body
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// A POST request without a body
    pub fn post_empty(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add `Authorization: Bearer <token>`
    pub fn bearer(self, token: &AccessToken) -> Self {
        self.header("Authorization", format!("Bearer {}", token.as_str()))
    }

    /// Look up a header value by case-insensitive name
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response status and parsed body
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Reason phrase for the status (may be empty)
    pub reason: String,

    /// Parsed JSON body; `Null` when the body was empty
    pub body: serde_json::Value,
}

impl HttpResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues HTTP requests
///
/// Implementations must be safe to share between concurrent workflows.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and return the status and JSON body
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Caller-owned cancellation signal
///
/// Cloneable; every clone observes the same [`CancellationHandle`].
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

/// Triggers a [`CancellationSignal`]
#[derive(Debug)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
}

impl CancellationSignal {
    /// Create a linked handle and signal
    pub fn new() -> (CancellationHandle, CancellationSignal) {
        let (tx, rx) = watch::channel(false);
        (CancellationHandle { tx }, CancellationSignal { rx })
    }

    /// Whether cancellation has been requested
    pub fn is_canceled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested
    ///
    /// Never resolves if the handle is dropped without canceling.
    pub async fn canceled(&self) {
        let mut rx = self.rx.clone();
        let observed = rx.wait_for(|canceled| *canceled).await.map(|_| ());
        if observed.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl CancellationHandle {
    /// Request cancellation
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Send `request` bounded by `timeout` and an optional cancellation signal
///
/// Whichever fires first wins; the in-flight request future is dropped on
/// timeout or cancellation.
pub async fn dispatch(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    timeout: Duration,
    cancel: Option<&CancellationSignal>,
) -> Result<HttpResponse, TransportError> {
    if cancel.is_some_and(CancellationSignal::is_canceled) {
        return Err(TransportError::Canceled);
    }

    let send = tokio::time::timeout(timeout, transport.send(request));
    let outcome = match cancel {
        Some(signal) => {
            tokio::select! {
                res = send => res,
                _ = signal.canceled() => return Err(TransportError::Canceled),
            }
        }
        None => send.await,
    };

    outcome.unwrap_or(Err(TransportError::Timeout))
}
