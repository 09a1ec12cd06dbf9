//! Error types
//!
//! Every failure in a query workflow surfaces as an [`SdkError`]. Variants
//! that originate from a network exchange carry the [`WorkflowStep`] that
//! failed and, where a server answered, its HTTP status.
//!
//! # Example
//!
//! ```rust
//! use posql_client::error::{SdkError, WorkflowStep};
//!
//! let err = SdkError::TransportTimeout {
//!     step: WorkflowStep::Submitting,
//! };
//! assert!(err.is_retryable());
//! assert!(!SdkError::VerificationFailed("bad proof".into()).is_retryable());
//! ```

use std::fmt;
use thiserror::Error;

/// The step of a query workflow
///
/// Used both for log lines on state transitions and as error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStep {
    /// Exchanging the API key for an access token
    Authenticating,
    /// Reading table commitments from chain storage
    ResolvingCommitment,
    /// Reading attestations and the attested commitments
    ResolvingAttestation,
    /// Building the prover request and proof plan
    Planning,
    /// Sending the prover request or job submission
    Submitting,
    /// Waiting for an asynchronous job to reach a terminal status
    Polling,
    /// Downloading the result of a finished job
    FetchingResult,
    /// Checking the proof against plan and commitments
    Verifying,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkflowStep::Authenticating => "authenticating",
            WorkflowStep::ResolvingCommitment => "resolving commitment",
            WorkflowStep::ResolvingAttestation => "resolving attestation",
            WorkflowStep::Planning => "planning",
            WorkflowStep::Submitting => "submitting",
            WorkflowStep::Polling => "polling",
            WorkflowStep::FetchingResult => "fetching result",
            WorkflowStep::Verifying => "verifying",
        })
    }
}

/// Failures raised by an [`HttpTransport`](crate::transport::HttpTransport)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request deadline elapsed before a response arrived
    #[error("request timed out")]
    Timeout,

    /// The caller's cancellation signal fired while the request was in flight
    #[error("request canceled")]
    Canceled,

    /// Connection, TLS or protocol failure
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be read as JSON
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Failure reported by a [`PlanVerifyAdapter`](crate::adapter::PlanVerifyAdapter)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct AdapterError(pub String);

impl AdapterError {
    /// Create an adapter error from any displayable diagnostic
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors returned by the query-and-verify workflow
#[derive(Error, Debug)]
pub enum SdkError {
    /// No API key was configured
    #[error("missing credential: no API key configured")]
    MissingCredential,

    /// The auth gateway refused the API key
    #[error("auth gateway rejected the API key: {status} {reason}")]
    AuthRejected { status: u16, reason: String },

    /// Chain storage holds no commitment for the table
    #[error("no commitment found for table {table}")]
    CommitmentNotFound { table: String },

    /// The node returned no attestations
    #[error("no attestations available for {}", .block.as_deref().unwrap_or("the best recent block"))]
    AttestationUnavailable { block: Option<String> },

    /// Attestations for one block disagree with each other or with the block
    #[error("inconsistent attestations for block {block}: {reason}")]
    AttestationInconsistent { block: String, reason: String },

    /// An attestation signature does not recover to its proposed key
    #[error("invalid attestation signature for block {block}: {reason}")]
    AttestationSignatureInvalid { block: String, reason: String },

    /// The adapter's commitment set differs from the fetched one
    #[error("commitment set returned by the planner does not match the fetched commitments: {0}")]
    CommitmentMismatch(String),

    /// The adapter could not plan the query
    #[error("planning failed: {0}")]
    Planning(String),

    /// The zk query service refused the job submission
    #[error("job submission rejected: {status} {reason}")]
    SubmissionRejected { status: u16, reason: String },

    /// The prover refused the request
    #[error("prover rejected the request: {status} {reason}")]
    ProverRejected { status: u16, reason: String },

    /// The job did not reach a terminal status within the attempt budget
    #[error("proof job {query_id} still pending after {attempts} status checks")]
    PollingTimedOut { query_id: String, attempts: u32 },

    /// The zk query service returned a query id that is not a single path segment
    #[error("invalid query id {0:?}")]
    InvalidQueryId(String),

    /// The job ended with status `failed`
    #[error("proof job {query_id} failed")]
    ProofJobFailed { query_id: String },

    /// The job ended with status `canceled`
    #[error("proof job {query_id} was canceled")]
    ProofJobCanceled { query_id: String },

    /// The proof did not verify against the plan and commitments
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// A request deadline elapsed or the request was aborted by the caller
    #[error("request timed out while {step}")]
    TransportTimeout { step: WorkflowStep },

    /// Network failure or unexpected non-2xx status
    #[error("transport error while {step}: {message}")]
    Transport {
        step: WorkflowStep,
        status: Option<u16>,
        message: String,
    },

    /// A JSON-RPC call returned an error object
    #[error("rpc method {method} failed with code {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    /// A 2xx response did not have the expected shape
    #[error("malformed response while {step}: {message}")]
    MalformedResponse { step: WorkflowStep, message: String },

    /// The workflow was canceled between network calls
    #[error("workflow canceled while {step}")]
    Canceled { step: WorkflowStep },

    /// A table reference could not be parsed
    #[error("invalid table reference {0:?}")]
    InvalidTableRef(String),

    /// A query parameter could not be parsed
    #[error("invalid query parameter: {0}")]
    InvalidParam(String),

    /// A hex string could not be decoded
    #[error("invalid hex value: {0}")]
    InvalidHex(String),

    /// The client configuration is unusable
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SdkError {
    /// Map a transport failure during `step` into a workflow error
    ///
    /// Deadline expiry and caller cancellation both surface as
    /// [`SdkError::TransportTimeout`].
    pub fn transport(step: WorkflowStep, error: TransportError) -> Self {
        match error {
            TransportError::Timeout | TransportError::Canceled => {
                SdkError::TransportTimeout { step }
            }
            TransportError::Network(message) | TransportError::Decode(message) => {
                SdkError::Transport {
                    step,
                    status: None,
                    message,
                }
            }
        }
    }

    /// Whether repeating the whole workflow may succeed
    ///
    /// Only transport failures and server-side (5xx) rejections are
    /// retryable. Trust failures never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            SdkError::TransportTimeout { .. } | SdkError::PollingTimedOut { .. } => true,
            SdkError::Transport { status, .. } => status.map_or(true, |s| s >= 500),
            SdkError::AuthRejected { status, .. }
            | SdkError::SubmissionRejected { status, .. }
            | SdkError::ProverRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The workflow step recorded in the error, if any
    pub fn step(&self) -> Option<WorkflowStep> {
        match self {
            SdkError::MissingCredential | SdkError::AuthRejected { .. } => {
                Some(WorkflowStep::Authenticating)
            }
            SdkError::CommitmentNotFound { .. } => Some(WorkflowStep::ResolvingCommitment),
            SdkError::AttestationUnavailable { .. }
            | SdkError::AttestationInconsistent { .. }
            | SdkError::AttestationSignatureInvalid { .. } => {
                Some(WorkflowStep::ResolvingAttestation)
            }
            SdkError::CommitmentMismatch(_) | SdkError::Planning(_) => Some(WorkflowStep::Planning),
            SdkError::SubmissionRejected { .. }
            | SdkError::ProverRejected { .. }
            | SdkError::InvalidQueryId(_) => Some(WorkflowStep::Submitting),
            SdkError::PollingTimedOut { .. }
            | SdkError::ProofJobFailed { .. }
            | SdkError::ProofJobCanceled { .. } => Some(WorkflowStep::Polling),
            SdkError::VerificationFailed(_) => Some(WorkflowStep::Verifying),
            SdkError::TransportTimeout { step }
            | SdkError::Transport { step, .. }
            | SdkError::MalformedResponse { step, .. }
            | SdkError::Canceled { step } => Some(*step),
            SdkError::Rpc { .. }
            | SdkError::InvalidTableRef(_)
            | SdkError::InvalidParam(_)
            | SdkError::InvalidHex(_)
            | SdkError::Configuration(_) => None,
        }
    }
}

impl From<crate::adapter::ParamError> for SdkError {
    fn from(e: crate::adapter::ParamError) -> Self {
        SdkError::InvalidParam(e.to_string())
    }
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;
