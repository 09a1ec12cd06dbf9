//! Client configuration
//!
//! [`ClientConfig`] names the services a workflow talks to and how it talks
//! to them. The defaults point at the public Space and Time endpoints; the
//! CLI overrides them from flags and environment variables.
//!
//! # Example
//!
//! ```rust
//! use posql_client::config::{ClientConfig, ProtocolMode};
//!
//! let config = ClientConfig::default()
//!     .with_api_key("my-api-key")
//!     .with_mode(ProtocolMode::asynchronous("https://api.makeinfinite.dev"));
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Result, SdkError};
use crate::orchestrator::PollingPolicy;
use crate::types::{BlockHash, CommitmentScheme, SxtNetwork};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default auth gateway endpoint
pub const DEFAULT_AUTH_ROOT_URL: &str = "https://proxy.api.makeinfinite.dev/auth/apikey";

/// Default synchronous prover endpoint
pub const DEFAULT_PROVER_ROOT_URL: &str = "https://api.makeinfinite.dev/v1/prove";

/// Default zk query service root
pub const DEFAULT_ZK_QUERY_ROOT_URL: &str = "https://api.makeinfinite.dev";

/// Default chain node JSON-RPC endpoint
pub const DEFAULT_SUBSTRATE_NODE_URL: &str = "https://rpc.testnet.sxt.network";

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How the proof is obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ProtocolMode {
    /// Post the prover request and receive the proof in the response
    #[serde(rename_all = "camelCase")]
    Synchronous {
        /// Prover endpoint
        prover_url: String,
    },

    /// Submit a background job, poll its status, then fetch its result
    #[serde(rename_all = "camelCase")]
    Asynchronous {
        /// Root URL of the zk query service
        zk_query_url: String,

        /// Data source the job should read
        #[serde(default)]
        source_network: SxtNetwork,

        /// Attested block to query at; best recent when absent
        #[serde(default)]
        block_hash: Option<BlockHash>,

        /// Server-side job timeout forwarded in the submission
        #[serde(default)]
        job_timeout: Option<i64>,

        /// Status polling budget
        #[serde(default)]
        polling: PollingPolicy,
    },
}

impl ProtocolMode {
    /// Synchronous mode against `prover_url`
    pub fn synchronous(prover_url: impl Into<String>) -> Self {
        ProtocolMode::Synchronous {
            prover_url: prover_url.into(),
        }
    }

    /// Asynchronous mode against `zk_query_url` with default polling
    pub fn asynchronous(zk_query_url: impl Into<String>) -> Self {
        ProtocolMode::Asynchronous {
            zk_query_url: zk_query_url.into(),
            source_network: SxtNetwork::default(),
            block_hash: None,
            job_timeout: None,
            polling: PollingPolicy::default(),
        }
    }

    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolMode::Synchronous { .. } => "synchronous",
            ProtocolMode::Asynchronous { .. } => "asynchronous",
        }
    }
}

impl Default for ProtocolMode {
    fn default() -> Self {
        Self::synchronous(DEFAULT_PROVER_ROOT_URL)
    }
}

/// Configuration shared by every workflow run by one orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Auth gateway endpoint
    pub auth_url: String,

    /// Chain node JSON-RPC endpoint
    pub node_url: String,

    /// API key exchanged for access tokens
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Commitment scheme the proofs are built over
    pub commitment_scheme: CommitmentScheme,

    /// Deadline applied to every outbound request
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,

    /// Synchronous or asynchronous proof retrieval
    pub mode: ProtocolMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_ROOT_URL.to_string(),
            node_url: DEFAULT_SUBSTRATE_NODE_URL.to_string(),
            api_key: None,
            commitment_scheme: CommitmentScheme::HyperKzg,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            mode: ProtocolMode::default(),
        }
    }
}

impl ClientConfig {
    /// Set the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the auth gateway endpoint
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Set the chain node endpoint
    pub fn with_node_url(mut self, url: impl Into<String>) -> Self {
        self.node_url = url.into();
        self
    }

    /// Set the commitment scheme
    pub fn with_commitment_scheme(mut self, scheme: CommitmentScheme) -> Self {
        self.commitment_scheme = scheme;
        self
    }

    /// Set the per-request deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the protocol mode
    pub fn with_mode(mut self, mode: ProtocolMode) -> Self {
        self.mode = mode;
        self
    }

    /// Check that every endpoint is an http(s) URL and the budgets are usable
    ///
    /// A missing API key is not a configuration error: it is reported as
    /// [`SdkError::MissingCredential`] when a workflow starts.
    pub fn validate(&self) -> Result<()> {
        check_url("auth url", &self.auth_url)?;
        check_url("node url", &self.node_url)?;
        match &self.mode {
            ProtocolMode::Synchronous { prover_url } => check_url("prover url", prover_url)?,
            ProtocolMode::Asynchronous {
                zk_query_url,
                polling,
                ..
            } => {
                check_url("zk query url", zk_query_url)?;
                if polling.max_attempts == 0 {
                    return Err(SdkError::Configuration(
                        "polling max_attempts must be at least 1".to_string(),
                    ));
                }
            }
        }
        if self.request_timeout.is_zero() {
            return Err(SdkError::Configuration(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_url(what: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(SdkError::Configuration(format!(
            "{what} must start with http:// or https://, got {url:?}"
        )))
    }
}

/// Join a root URL and a path without doubling the slash
pub fn join_url(root: &str, path: &str) -> String {
    format!(
        "{}/{}",
        root.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
