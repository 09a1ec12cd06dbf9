//! Query-and-verify orchestration
//!
//! [`QueryOrchestrator`] runs one workflow per call:
//!
//! ```text
//! synchronous:   authenticate -> resolve commitments -> plan -> prove -> verify
//! asynchronous:  authenticate -> resolve attestation -> plan -> submit
//!                -> poll status -> fetch result -> verify
//! ```
//!
//! Each call fetches a fresh access token and fresh commitments; nothing is
//! cached between calls, so one orchestrator can serve concurrent workflows.
//! Any failure ends the workflow and names the step it happened in. A result
//! is only returned once the adapter has verified it.
//!
//! # Example
//!
//! ```rust,no_run
//! use posql_client::adapter::PlanVerifyAdapter;
//! use posql_client::config::{ClientConfig, ProtocolMode};
//! use posql_client::orchestrator::{QueryOrchestrator, QueryRequest};
//! use std::sync::Arc;
//!
//! # async fn example(verifier: Arc<dyn PlanVerifyAdapter>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default()
//!     .with_api_key("my-api-key")
//!     .with_mode(ProtocolMode::asynchronous("https://api.makeinfinite.dev"));
//! let orchestrator = QueryOrchestrator::from_config(config, verifier)?;
//!
//! let verified = orchestrator
//!     .query_and_verify(&QueryRequest::new("SELECT COUNT(*) FROM ethereum.transactions"))
//!     .await?;
//! println!("{}", verified.result.0);
//! # Ok(())
//! # }
//! ```

mod async_flow;
pub mod polling;
mod sync_flow;

pub use polling::{PollingPolicy, TERMINAL_STATUSES};

use crate::adapter::{PlanVerifyAdapter, PlannedQuery, QueryParam, QueryParser};
use crate::auth::AuthClient;
use crate::commitment::{AttestedBlock, CommitmentClient, CommitmentSource, ResolvedCommitments};
use crate::config::{ClientConfig, ProtocolMode};
use crate::error::{Result, SdkError, WorkflowStep};
use crate::transport::{CancellationSignal, HttpTransport};
use crate::types::{BlockHash, ProverResponse, QueryResult, TableCommitment, TableRef};
use std::sync::Arc;

/// One query to prove and verify
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// SQL text
    pub sql: String,

    /// Tables to resolve commitments for; read from `sql` when empty
    pub tables: Vec<TableRef>,

    /// Values bound to `$1`, `$2`, ... in `sql`
    pub params: Vec<QueryParam>,

    /// Caller-owned cancellation signal
    pub cancel: Option<CancellationSignal>,
}

impl QueryRequest {
    /// A request for `sql` with tables read from the query
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            tables: Vec::new(),
            params: Vec::new(),
            cancel: None,
        }
    }

    /// Name the tables explicitly
    pub fn with_tables(mut self, tables: Vec<TableRef>) -> Self {
        self.tables = tables;
        self
    }

    /// Bind query parameters, in placeholder order
    pub fn with_params(mut self, params: Vec<QueryParam>) -> Self {
        self.params = params;
        self
    }

    /// Attach a cancellation signal
    pub fn with_cancel(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// A verified answer
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedQuery {
    /// Result accepted by the adapter
    pub result: QueryResult,

    /// Commitments the result was verified against
    pub commitments: Vec<TableCommitment>,

    /// Attested block the commitments were read at (asynchronous mode)
    pub attested: Option<AttestedBlock>,

    /// Job id assigned by the zk query service (asynchronous mode)
    pub query_id: Option<String>,
}

/// Runs query-and-verify workflows
///
/// Holds no per-workflow state; share it behind an `Arc` freely.
pub struct QueryOrchestrator {
    transport: Arc<dyn HttpTransport>,
    adapter: Arc<dyn PlanVerifyAdapter>,
    config: ClientConfig,
}

impl QueryOrchestrator {
    /// Create an orchestrator
    ///
    /// # Arguments
    /// * `transport` - Transport for every outbound request
    /// * `adapter` - Planner and verifier for the proof system in use
    /// * `config` - Endpoints, credentials and protocol mode
    ///
    /// # Returns
    /// `Err(SdkError::Configuration)` when `config` does not validate
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        adapter: Arc<dyn PlanVerifyAdapter>,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            adapter,
            config,
        })
    }

    /// Create an orchestrator over the reqwest transport
    ///
    /// The caller supplies the verifier; results are only as trustworthy as
    /// `adapter`'s `verify`.
    #[cfg(feature = "http")]
    pub fn from_config(config: ClientConfig, adapter: Arc<dyn PlanVerifyAdapter>) -> Result<Self> {
        Self::new(
            Arc::new(crate::transport::ReqwestTransport::new()),
            adapter,
            config,
        )
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one workflow for `request`
    ///
    /// # Returns
    /// The verified result, or the error of the first step that failed
    pub async fn query_and_verify(&self, request: &QueryRequest) -> Result<VerifiedQuery> {
        let flow = self.flow(request);
        log::info!("starting {} workflow", self.config.mode.name());

        let outcome = match &self.config.mode {
            ProtocolMode::Synchronous { prover_url } => {
                sync_flow::run(&flow, &request.tables, prover_url).await
            }
            ProtocolMode::Asynchronous {
                zk_query_url,
                source_network,
                block_hash,
                job_timeout,
                polling,
            } => {
                let target = async_flow::JobTarget {
                    zk_query_url,
                    source_network: *source_network,
                    block_hash: *block_hash,
                    job_timeout: *job_timeout,
                    polling,
                };
                async_flow::run(&flow, &request.tables, &target).await
            }
        };

        match &outcome {
            Ok(_) => log::info!("workflow finished: result verified"),
            Err(e) => log::warn!("workflow aborted: {e}"),
        }
        outcome
    }

    /// Plan `request` without contacting the prover
    ///
    /// Reads commitments at `block_hash`, or at the node's best block when
    /// `None`, and hands them to the adapter. No access token is fetched.
    ///
    /// # Returns
    /// The plan and the commitments it was built over
    pub async fn produce_plan(
        &self,
        request: &QueryRequest,
        block_hash: Option<BlockHash>,
    ) -> Result<PlannedQuery> {
        let flow = self.flow(request);
        let tables = flow.tables(&request.tables)?;
        flow.enter(WorkflowStep::ResolvingCommitment);
        let source = match block_hash {
            Some(block_hash) => CommitmentSource::AtBlock { block_hash },
            None => CommitmentSource::Direct,
        };
        let resolved = flow.resolve(&source, &tables).await?;
        flow.plan(&resolved.commitments)
    }

    fn flow<'a>(&'a self, request: &'a QueryRequest) -> Flow<'a> {
        Flow {
            transport: self.transport.as_ref(),
            adapter: self.adapter.as_ref(),
            config: &self.config,
            sql: &request.sql,
            params: &request.params,
            cancel: request.cancel.as_ref(),
        }
    }
}

/// Borrowed context shared by the steps of one workflow
pub(crate) struct Flow<'a> {
    pub(crate) transport: &'a dyn HttpTransport,
    pub(crate) adapter: &'a dyn PlanVerifyAdapter,
    pub(crate) config: &'a ClientConfig,
    pub(crate) sql: &'a str,
    pub(crate) params: &'a [QueryParam],
    pub(crate) cancel: Option<&'a CancellationSignal>,
}

impl Flow<'_> {
    pub(crate) fn enter(&self, step: WorkflowStep) {
        log::info!("step: {step}");
    }

    pub(crate) async fn authenticate(&self) -> Result<crate::types::AccessToken> {
        self.enter(WorkflowStep::Authenticating);
        AuthClient::new(self.transport, &self.config.auth_url)
            .with_timeout(self.config.request_timeout)
            .fetch_access_token(self.config.api_key.as_deref(), self.cancel)
            .await
    }

    /// Tables to resolve: the caller's list, else those the query reads
    pub(crate) fn tables(&self, requested: &[TableRef]) -> Result<Vec<TableRef>> {
        if !requested.is_empty() {
            return Ok(requested.to_vec());
        }
        let tables = QueryParser::new()
            .referenced_tables(self.sql)
            .map_err(|e| SdkError::Planning(e.0))?;
        if tables.is_empty() {
            return Err(SdkError::Planning("query reads no tables".to_string()));
        }
        Ok(tables)
    }

    pub(crate) async fn resolve(
        &self,
        source: &CommitmentSource,
        tables: &[TableRef],
    ) -> Result<ResolvedCommitments> {
        CommitmentClient::new(
            self.transport,
            &self.config.node_url,
            self.config.commitment_scheme,
            self.config.request_timeout,
        )
        .resolve(source, tables, self.cancel)
        .await
    }

    /// Plan the query and check the adapter kept the fetched commitments
    pub(crate) fn plan(&self, fetched: &[TableCommitment]) -> Result<PlannedQuery> {
        self.enter(WorkflowStep::Planning);
        let planned = self
            .adapter
            .plan(self.sql, self.params, fetched)
            .map_err(|e| SdkError::Planning(e.0))?;
        ensure_same_commitments(fetched, &planned.commitments)?;
        Ok(planned)
    }

    pub(crate) fn verify(
        &self,
        response: &ProverResponse,
        planned: &PlannedQuery,
    ) -> Result<QueryResult> {
        self.enter(WorkflowStep::Verifying);
        self.adapter
            .verify(response, &planned.plan, self.params, &planned.commitments)
            .map_err(|e| SdkError::VerificationFailed(e.0))
    }
}

/// Fail unless `planned` holds exactly the entries of `fetched`, in any order
fn ensure_same_commitments(fetched: &[TableCommitment], planned: &[TableCommitment]) -> Result<()> {
    let mut expected: Vec<&TableCommitment> = fetched.iter().collect();
    let mut actual: Vec<&TableCommitment> = planned.iter().collect();
    expected.sort();
    actual.sort();
    if expected == actual {
        return Ok(());
    }

    let missing = expected.iter().find(|c| !actual.contains(c));
    let extra = actual.iter().find(|c| !expected.contains(c));
    let detail = match (missing, extra) {
        (Some(c), _) => format!("fetched commitment for {} was dropped or altered", c.table),
        (None, Some(c)) => format!("unexpected commitment for {}", c.table),
        (None, None) => format!(
            "{} commitments fetched, {} returned",
            expected.len(),
            actual.len()
        ),
    };
    Err(SdkError::CommitmentMismatch(detail))
}
