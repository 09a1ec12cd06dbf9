//! Recording transport for tests
//!
//! Routes are matched on the exact URL. Each route holds a queue of
//! responses; the last one repeats once the queue is drained. Every request
//! is recorded so tests can assert on call counts and bodies.

use super::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Canned {
    delay: Option<Duration>,
    outcome: Result<HttpResponse, TransportError>,
}

/// JSON-RPC handler: `(method, params) -> result`
type RpcHandler = Box<dyn Fn(&str, &Value) -> Value + Send + Sync>;

#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<Canned>>>,
    rpc: Mutex<HashMap<String, RpcHandler>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&self, url: &str, canned: Canned) {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(canned);
    }

    /// Queue a response for `url`
    pub(crate) fn respond(&self, url: &str, status: u16, body: Value) {
        self.push(
            url,
            Canned {
                delay: None,
                outcome: Ok(response(status, body)),
            },
        );
    }

    /// Queue a response that arrives after `delay`
    pub(crate) fn respond_after(&self, url: &str, delay: Duration, status: u16, body: Value) {
        self.push(
            url,
            Canned {
                delay: Some(delay),
                outcome: Ok(response(status, body)),
            },
        );
    }

    /// Queue a transport failure for `url`
    pub(crate) fn fail(&self, url: &str, error: TransportError) {
        self.push(
            url,
            Canned {
                delay: None,
                outcome: Err(error),
            },
        );
    }

    /// Serve JSON-RPC `method` on `url` with a computed result
    pub(crate) fn rpc<F>(&self, url: &str, method: &str, handler: F)
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.rpc.lock().unwrap().insert(
            format!("{url}#{method}"),
            Box::new(move |_, params| handler(params)),
        );
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    /// Number of JSON-RPC calls to `method`
    pub(crate) fn rpc_calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| rpc_method(r).as_deref() == Some(method))
            .count()
    }

    fn next(&self, url: &str) -> Option<Canned> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn response(status: u16, body: Value) -> HttpResponse {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    };
    HttpResponse {
        status,
        reason: reason.to_string(),
        body,
    }
}

fn rpc_method(request: &HttpRequest) -> Option<String> {
    if request.method != Method::Post {
        return None;
    }
    request
        .body
        .as_ref()?
        .get("method")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(method) = rpc_method(&request) {
            let key = format!("{}#{}", request.url, method);
            let reply = {
                let handlers = self.rpc.lock().unwrap();
                handlers.get(&key).map(|handler| {
                    let params = request
                        .body
                        .as_ref()
                        .and_then(|b| b.get("params"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    let id = request
                        .body
                        .as_ref()
                        .and_then(|b| b.get("id"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": handler(&method, &params),
                    })
                })
            };
            if let Some(body) = reply {
                return Ok(response(200, body));
            }
        }

        let canned = self.next(&request.url).ok_or_else(|| {
            TransportError::Network(format!("no mock route for {}", request.url))
        })?;
        if let Some(delay) = canned.delay {
            tokio::time::sleep(delay).await;
        }
        canned.outcome
    }
}
