//! Plan/verify adapter boundary
//!
//! The workflow never looks inside prover payloads. Everything that depends
//! on the proof system goes through [`PlanVerifyAdapter`]:
//! - `plan`: turn SQL and commitments into a prover request and a proof plan
//! - `verify`: check a prover response against that plan and commitments
//!
//! Both operations are synchronous and side-effect free. The crate ships
//! no cryptographic verifier; callers supply one for the proof system their
//! prover runs. `transcript::TranscriptAdapter` (feature
//! `transcript-adapter`) is a test double only.
//!
//! # Example
//!
//! ```rust
//! use posql_client::adapter::{PlanVerifyAdapter, PlannedQuery, QueryParam};
//! use posql_client::error::AdapterError;
//! use posql_client::types::{ProofPlan, ProverResponse, QueryResult, TableCommitment};
//!
//! struct ProofSystem;
//!
//! impl PlanVerifyAdapter for ProofSystem {
//!     fn plan(
//!         &self,
//!         query: &str,
//!         params: &[QueryParam],
//!         commitments: &[TableCommitment],
//!     ) -> Result<PlannedQuery, AdapterError> {
//!         Err(AdapterError::new(format!("cannot plan {query}")))
//!     }
//!
//!     fn verify(
//!         &self,
//!         response: &ProverResponse,
//!         plan: &ProofPlan,
//!         params: &[QueryParam],
//!         commitments: &[TableCommitment],
//!     ) -> Result<QueryResult, AdapterError> {
//!         Err(AdapterError::new("no proof checked"))
//!     }
//! }
//!
//! assert!(ProofSystem.plan("SELECT 1", &[], &[]).is_err());
//! ```

pub mod param;
pub mod sql;
#[cfg(any(test, feature = "transcript-adapter"))]
pub mod transcript;

pub use param::{ParamError, QueryParam};
pub use sql::QueryParser;
#[cfg(any(test, feature = "transcript-adapter"))]
pub use transcript::TranscriptAdapter;

use crate::error::AdapterError;
use crate::types::{ProofPlan, ProverRequest, ProverResponse, QueryResult, TableCommitment};

/// Output of [`PlanVerifyAdapter::plan`]
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    /// Body sent to the prover
    pub request: ProverRequest,

    /// Plan needed to verify the prover's answer
    pub plan: ProofPlan,

    /// Commitments the plan was built against
    ///
    /// Must hold the same entries that were passed in; only the order may
    /// differ.
    pub commitments: Vec<TableCommitment>,
}

/// Proof-system specific planning and verification
pub trait PlanVerifyAdapter: Send + Sync {
    /// Build the prover request and proof plan for `query`
    ///
    /// # Arguments
    /// * `query` - SQL text
    /// * `params` - Values for the query's placeholders, in order
    /// * `commitments` - Commitments for every table the query reads
    fn plan(
        &self,
        query: &str,
        params: &[QueryParam],
        commitments: &[TableCommitment],
    ) -> Result<PlannedQuery, AdapterError>;

    /// Check `response` against the plan and commitments it was produced for
    ///
    /// # Returns
    /// The verified result; any error means the response must not be trusted
    fn verify(
        &self,
        response: &ProverResponse,
        plan: &ProofPlan,
        params: &[QueryParam],
        commitments: &[TableCommitment],
    ) -> Result<QueryResult, AdapterError>;
}
