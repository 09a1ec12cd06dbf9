//! posql_client: verifiable SQL queries against a remote prover
//!
//! This library runs a SQL query on a remote proving service and accepts the
//! answer only once it has been verified against table commitments read from
//! the chain. A workflow is:
//!
//! 1. Exchange an API key for an access token (`auth`)
//! 2. Read table commitments, directly or at an attested block (`commitment`)
//! 3. Plan the query against those commitments (`adapter`)
//! 4. Obtain the proof, synchronously or through a polled job (`orchestrator`)
//! 5. Verify the proof against the same plan and commitments (`adapter`)
//!
//! # Example
//!
//! ```no_run
//! use posql_client::{
//!     ClientConfig, PlanVerifyAdapter, ProtocolMode, QueryOrchestrator, QueryParam, QueryRequest,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(verifier: Arc<dyn PlanVerifyAdapter>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default()
//!     .with_api_key("my-api-key")
//!     .with_mode(ProtocolMode::synchronous("https://api.makeinfinite.dev/v1/prove"));
//! // The verifier is the proof system's plan/verify implementation.
//! let orchestrator = QueryOrchestrator::from_config(config, verifier)?;
//!
//! let request = QueryRequest::new(
//!     "SELECT COUNT(*) FROM ethereum.transactions WHERE block_number > $1",
//! )
//! .with_params(vec!["17000000".parse::<QueryParam>()?]);
//! let verified = orchestrator.query_and_verify(&request).await?;
//! println!("verified result: {}", verified.result.0);
//! # Ok(())
//! # }
//! ```

pub use adapter::{ParamError, PlanVerifyAdapter, PlannedQuery, QueryParam};
pub use config::{ClientConfig, ProtocolMode};
pub use error::{AdapterError, Result, SdkError, TransportError, WorkflowStep};
pub use orchestrator::{PollingPolicy, QueryOrchestrator, QueryRequest, VerifiedQuery};
pub use transport::{CancellationHandle, CancellationSignal, HttpTransport};
pub use types::{
    AccessToken, BlockHash, CommitmentScheme, JobStatus, ProofPlan, ProverJob, ProverRequest,
    ProverResponse, QueryResult, SxtNetwork, TableCommitment, TableRef,
};

/// posql_client version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod adapter;
pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod commitment;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod transport;
pub mod types;
pub mod utils;
