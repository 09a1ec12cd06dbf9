//! reqwest-backed transport
//!
//! # Example
//!
//! ```rust,no_run
//! use posql_client::transport::{HttpRequest, HttpTransport, ReqwestTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = ReqwestTransport::new();
//!     let response = transport
//!         .send(HttpRequest::get("https://api.makeinfinite.dev/health"))
//!         .await?;
//!     println!("{} {}", response.status, response.body);
//!     Ok(())
//! }
//! ```

use super::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::error::TransportError;
use async_trait::async_trait;

/// HTTP transport built on a shared `reqwest::Client`
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status();
        let text = response.text().await.map_err(map_error)?;

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(body) => body,
                // Error pages are often plain text; keep them for diagnostics.
                Err(_) if !status.is_success() => serde_json::Value::String(text),
                Err(e) => {
                    return Err(TransportError::Decode(format!(
                        "{}: {} (body: {})",
                        request.url, e, text
                    )))
                }
            }
        };

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

fn map_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{HeaderMap, StatusCode},
        response::Json,
        routing::{get, post},
        Router,
    };
    use serde_json::{json, Value};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let apikey = headers
            .get("apikey")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Json(json!({ "apikey": apikey, "body": body }))
    }

    #[tokio::test]
    async fn test_post_sends_headers_and_json() {
        let base = serve(Router::new().route("/echo", post(echo))).await;
        let transport = ReqwestTransport::new();

        let response = transport
            .send(HttpRequest::post(format!("{base}/echo"), json!({"q": 1})).header("apikey", "k1"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_success());
        assert_eq!(response.body, json!({"apikey": "k1", "body": {"q": 1}}));
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        let app = Router::new().route(
            "/denied",
            get(|| async { (StatusCode::UNAUTHORIZED, "no such key") }),
        );
        let base = serve(app).await;

        let response = ReqwestTransport::new()
            .send(HttpRequest::get(format!("{base}/denied")))
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(response.reason, "Unauthorized");
        assert_eq!(response.body, json!("no such key"));
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_a_decode_error() {
        let app = Router::new().route("/text", get(|| async { "not json" }));
        let base = serve(app).await;

        let err = ReqwestTransport::new()
            .send(HttpRequest::get(format!("{base}/text")))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = ReqwestTransport::new()
            .send(HttpRequest::get(format!("http://{addr}/")))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Network(_)));
    }
}
