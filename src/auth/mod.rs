//! Auth gateway client
//!
//! Exchanges an API key for a short-lived access token. Tokens are fetched
//! once per workflow and never cached: a later workflow always asks again.
//!
//! # Example
//!
//! ```rust,no_run
//! use posql_client::auth::AuthClient;
//! use posql_client::transport::ReqwestTransport;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ReqwestTransport::new();
//! let auth = AuthClient::new(&transport, "https://proxy.api.makeinfinite.dev/auth/apikey")
//!     .with_timeout(Duration::from_secs(10));
//! let token = auth.fetch_access_token(Some("my-api-key"), None).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{Result, SdkError, WorkflowStep};
use crate::transport::{dispatch, CancellationSignal, HttpRequest, HttpTransport};
use crate::types::AccessToken;
use serde::Deserialize;
use std::time::Duration;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "apikey";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    access_token: String,
}

/// Client for the auth gateway
pub struct AuthClient<'a> {
    transport: &'a dyn HttpTransport,
    auth_url: &'a str,
    timeout: Duration,
}

impl<'a> AuthClient<'a> {
    /// Create a client for the gateway at `auth_url`
    pub fn new(transport: &'a dyn HttpTransport, auth_url: &'a str) -> Self {
        Self {
            transport,
            auth_url,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Exchange `api_key` for an access token
    ///
    /// # Arguments
    /// * `api_key` - API key; `None`, empty and blank keys are rejected
    /// * `cancel` - Optional signal that aborts the request
    ///
    /// # Returns
    /// `Ok(AccessToken)` on a 2xx response carrying `accessToken`;
    /// `Err(SdkError::MissingCredential)` before any request when the key is
    /// missing; `Err(SdkError::AuthRejected)` on any other status.
    pub async fn fetch_access_token(
        &self,
        api_key: Option<&str>,
        cancel: Option<&CancellationSignal>,
    ) -> Result<AccessToken> {
        let api_key = match api_key.map(str::trim) {
            Some(key) if !key.is_empty() => key,
            _ => return Err(SdkError::MissingCredential),
        };

        log::debug!("requesting access token from {}", self.auth_url);
        let request = HttpRequest::post_empty(self.auth_url).header(API_KEY_HEADER, api_key);
        let response = dispatch(self.transport, request, self.timeout, cancel)
            .await
            .map_err(|e| SdkError::transport(WorkflowStep::Authenticating, e))?;

        if !response.is_success() {
            log::warn!(
                "auth gateway rejected API key: {} {}",
                response.status,
                response.reason
            );
            return Err(SdkError::AuthRejected {
                status: response.status,
                reason: response.reason,
            });
        }

        let parsed: AuthResponse =
            serde_json::from_value(response.body).map_err(|e| SdkError::MalformedResponse {
                step: WorkflowStep::Authenticating,
                message: format!("expected {{\"accessToken\": string}}: {e}"),
            })?;
        Ok(AccessToken::new(parsed.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    const AUTH_URL: &str = "http://auth.test/token";

    #[tokio::test]
    async fn test_fetch_access_token_success() {
        let transport = MockTransport::new();
        transport.respond(AUTH_URL, 200, json!({"accessToken": "tok1", "refreshToken": "r"}));

        let token = AuthClient::new(&transport, AUTH_URL)
            .fetch_access_token(Some("key-1"), None)
            .await
            .unwrap();

        assert_eq!(token.as_str(), "tok1");
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header_value(API_KEY_HEADER), Some("key-1"));
    }

    #[tokio::test]
    async fn test_missing_api_key_makes_no_call() {
        let transport = MockTransport::new();
        let client = AuthClient::new(&transport, AUTH_URL);

        for key in [None, Some(""), Some("   ")] {
            let err = client.fetch_access_token(key, None).await.unwrap_err();
            assert!(matches!(err, SdkError::MissingCredential));
        }
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_key_carries_status() {
        let transport = MockTransport::new();
        transport.respond(AUTH_URL, 401, json!({"message": "invalid key"}));

        let err = AuthClient::new(&transport, AUTH_URL)
            .fetch_access_token(Some("bad"), None)
            .await
            .unwrap_err();

        match err {
            SdkError::AuthRejected { status, reason } => {
                assert_eq!(status, 401);
                assert_eq!(reason, "Unauthorized");
            }
            other => panic!("unexpected error: {other}"),
        }
        // No automatic retry
        assert_eq!(transport.calls_to(AUTH_URL), 1);
    }

    #[tokio::test]
    async fn test_success_without_token_is_malformed() {
        let transport = MockTransport::new();
        transport.respond(AUTH_URL, 200, json!({"token": "tok1"}));

        let err = AuthClient::new(&transport, AUTH_URL)
            .fetch_access_token(Some("key"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SdkError::MalformedResponse {
                step: WorkflowStep::Authenticating,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_network_failure_is_transport_error() {
        let transport = MockTransport::new();
        transport.fail(AUTH_URL, TransportError::Network("dns failure".into()));

        let err = AuthClient::new(&transport, AUTH_URL)
            .fetch_access_token(Some("key"), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.step(), Some(WorkflowStep::Authenticating));
    }
}
