//! Minimal JSON-RPC 2.0 client for the chain node

use crate::error::{Result, SdkError, WorkflowStep};
use crate::transport::{dispatch, CancellationSignal, HttpRequest, HttpTransport};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC caller bound to one node endpoint
pub struct RpcClient<'a> {
    transport: &'a dyn HttpTransport,
    url: &'a str,
    timeout: Duration,
    next_id: AtomicU64,
}

impl<'a> RpcClient<'a> {
    /// Create a client for the node at `url`
    pub fn new(transport: &'a dyn HttpTransport, url: &'a str, timeout: Duration) -> Self {
        Self {
            transport,
            url,
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Call `method` and decode its `result`
    ///
    /// A JSON `null` result decodes as `None` when `T` is an `Option`.
    /// Error objects become [`SdkError::Rpc`]; non-2xx statuses become
    /// [`SdkError::Transport`] tagged with `step`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        step: WorkflowStep,
        method: &str,
        params: Value,
        cancel: Option<&CancellationSignal>,
    ) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        log::debug!("rpc {} -> {}", method, self.url);
        let response = dispatch(
            self.transport,
            HttpRequest::post(self.url, body),
            self.timeout,
            cancel,
        )
        .await
        .map_err(|e| SdkError::transport(step, e))?;

        if !response.is_success() {
            return Err(SdkError::Transport {
                step,
                status: Some(response.status),
                message: format!("{method}: {} {}", response.status, response.reason),
            });
        }

        let envelope: RpcEnvelope =
            serde_json::from_value(response.body).map_err(|e| SdkError::MalformedResponse {
                step,
                message: format!("{method}: not a JSON-RPC response: {e}"),
            })?;

        if let Some(error) = envelope.error {
            log::warn!("rpc {} failed: {} {}", method, error.code, error.message);
            return Err(SdkError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(envelope.result.unwrap_or(Value::Null)).map_err(|e| {
            SdkError::MalformedResponse {
                step,
                message: format!("{method}: unexpected result: {e}"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    const NODE: &str = "http://node.test";

    #[tokio::test]
    async fn test_call_decodes_result() {
        let transport = MockTransport::new();
        transport.rpc(NODE, "state_getStorage", |params| {
            assert_eq!(params, &json!(["0x01"]));
            json!("0xab12")
        });

        let rpc = RpcClient::new(&transport, NODE, Duration::from_secs(1));
        let value: Option<String> = rpc
            .call(
                WorkflowStep::ResolvingCommitment,
                "state_getStorage",
                json!(["0x01"]),
                None,
            )
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("0xab12"));

        let request = &transport.requests()[0];
        let body = request.body.as_ref().unwrap();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "state_getStorage");
    }

    #[tokio::test]
    async fn test_call_null_result_is_none() {
        let transport = MockTransport::new();
        transport.rpc(NODE, "state_getStorage", |_| Value::Null);

        let rpc = RpcClient::new(&transport, NODE, Duration::from_secs(1));
        let value: Option<String> = rpc
            .call(
                WorkflowStep::ResolvingCommitment,
                "state_getStorage",
                json!(["0x01"]),
                None,
            )
            .await
            .unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_call_error_object_is_rpc_error() {
        let transport = MockTransport::new();
        transport.respond(
            NODE,
            200,
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "Method not found"}}),
        );

        let rpc = RpcClient::new(&transport, NODE, Duration::from_secs(1));
        let err = rpc
            .call::<Value>(
                WorkflowStep::ResolvingAttestation,
                "attestation_v1_bestRecentAttestations",
                json!([]),
                None,
            )
            .await
            .unwrap_err();
        match err {
            SdkError::Rpc { method, code, .. } => {
                assert_eq!(method, "attestation_v1_bestRecentAttestations");
                assert_eq!(code, -32601);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_call_http_error_keeps_status() {
        let transport = MockTransport::new();
        transport.respond(NODE, 503, Value::Null);

        let rpc = RpcClient::new(&transport, NODE, Duration::from_secs(1));
        let err = rpc
            .call::<Value>(WorkflowStep::ResolvingCommitment, "state_getStorage", json!([]), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SdkError::Transport {
                step: WorkflowStep::ResolvingCommitment,
                status: Some(503),
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let transport = MockTransport::new();
        transport.rpc(NODE, "system_health", |_| json!({}));
        let rpc = RpcClient::new(&transport, NODE, Duration::from_secs(1));
        for _ in 0..2 {
            let _: Value = rpc
                .call(WorkflowStep::ResolvingCommitment, "system_health", json!([]), None)
                .await
                .unwrap();
        }
        let ids: Vec<Value> = transport
            .requests()
            .iter()
            .map(|r| r.body.as_ref().unwrap()["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2)]);
    }
}
