//! Command-line interface
//!
//! Argument definitions and command execution for the `posql_client` binary.
//! Commands that plan or verify a query need a verifier; the binary decides
//! which one, and without one `query` and `plan` refuse to run.

use crate::adapter::{PlanVerifyAdapter, QueryParam};
use crate::commitment::{commitment_storage_key, CommitmentClient};
use crate::config::{
    ClientConfig, ProtocolMode, DEFAULT_AUTH_ROOT_URL, DEFAULT_PROVER_ROOT_URL,
    DEFAULT_SUBSTRATE_NODE_URL, DEFAULT_ZK_QUERY_ROOT_URL,
};
use crate::orchestrator::{PollingPolicy, QueryOrchestrator, QueryRequest};
use crate::transport::{CancellationSignal, HttpTransport};
use crate::types::{encode_hex, BlockHash, CommitmentScheme, SxtNetwork, TableRef};
use crate::utils::Helpers;
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Builds the plan/verify adapter for a commitment scheme
pub type VerifierFactory = fn(CommitmentScheme) -> Arc<dyn PlanVerifyAdapter>;

#[derive(Parser)]
#[command(name = "posql_client")]
#[command(about = "Run SQL queries against a remote prover and verify the answers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query and print its verified result
    Query(QueryArgs),

    /// Print the plan and prover request for a query without proving it
    Plan(PlanArgs),

    /// Print the chain storage key holding a table's commitment
    StorageKey {
        /// Table as NAMESPACE.NAME
        table: TableRef,

        /// Commitment scheme
        #[arg(long, default_value = "hyperKzg")]
        scheme: CommitmentScheme,
    },

    /// Fetch and check attestations for a block (best recent when omitted)
    Attestations {
        /// Block hash, 0x-prefixed
        #[arg(long)]
        block_hash: Option<BlockHash>,

        /// Chain node JSON-RPC endpoint
        #[arg(long, env = "SUBSTRATE_NODE_URL", default_value = DEFAULT_SUBSTRATE_NODE_URL)]
        node_url: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Mode {
    /// Post to the prover and wait for the proof
    Sync,
    /// Submit a job and poll it
    Async,
}

#[derive(Args)]
pub struct QueryArgs {
    /// SQL text
    pub sql: String,

    /// Value for the next `$n` placeholder, e.g. `'ETH'`, `42_i32`, `1.50`, `true`
    #[arg(long = "param", value_name = "LITERAL")]
    pub params: Vec<QueryParam>,

    /// API key exchanged for an access token
    #[arg(long, env = "SXT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Proof retrieval mode
    #[arg(long, value_enum, default_value_t = Mode::Sync)]
    pub mode: Mode,

    /// Tables to resolve (read from the query when omitted)
    #[arg(long = "table", value_name = "NAMESPACE.NAME")]
    pub tables: Vec<TableRef>,

    /// Commitment scheme
    #[arg(long, env = "COMMITMENT_SCHEME", default_value = "hyperKzg")]
    pub scheme: CommitmentScheme,

    /// Auth gateway endpoint
    #[arg(long, env = "AUTH_ROOT_URL", default_value = DEFAULT_AUTH_ROOT_URL)]
    pub auth_url: String,

    /// Chain node JSON-RPC endpoint
    #[arg(long, env = "SUBSTRATE_NODE_URL", default_value = DEFAULT_SUBSTRATE_NODE_URL)]
    pub node_url: String,

    /// Prover endpoint (sync mode)
    #[arg(long, env = "PROVER_ROOT_URL", default_value = DEFAULT_PROVER_ROOT_URL)]
    pub prover_url: String,

    /// zk query service root (async mode)
    #[arg(long, env = "ZK_QUERY_ROOT_URL", default_value = DEFAULT_ZK_QUERY_ROOT_URL)]
    pub zk_query_url: String,

    /// Data source network (async mode)
    #[arg(long, env = "SXT_NETWORK", default_value = "mainnet")]
    pub network: SxtNetwork,

    /// Attested block to query at (async mode)
    #[arg(long)]
    pub block_hash: Option<BlockHash>,

    /// Server-side job timeout forwarded with the submission (async mode)
    #[arg(long)]
    pub job_timeout: Option<i64>,

    /// Maximum status checks (async mode)
    #[arg(long, default_value_t = 60)]
    pub max_attempts: u32,

    /// Milliseconds between status checks (async mode)
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl QueryArgs {
    fn to_config(&self) -> ClientConfig {
        let mode = match self.mode {
            Mode::Sync => ProtocolMode::synchronous(&self.prover_url),
            Mode::Async => ProtocolMode::Asynchronous {
                zk_query_url: self.zk_query_url.clone(),
                source_network: self.network,
                block_hash: self.block_hash,
                job_timeout: self.job_timeout,
                polling: PollingPolicy {
                    max_attempts: self.max_attempts,
                    interval: Duration::from_millis(self.poll_interval_ms),
                },
            },
        };

        let mut config = ClientConfig::default()
            .with_auth_url(&self.auth_url)
            .with_node_url(&self.node_url)
            .with_commitment_scheme(self.scheme)
            .with_request_timeout(Duration::from_secs(self.timeout_secs))
            .with_mode(mode);
        config.api_key = self.api_key.clone();
        config
    }
}

#[derive(Args)]
pub struct PlanArgs {
    /// SQL text
    pub sql: String,

    /// Value for the next `$n` placeholder, e.g. `'ETH'`, `42_i32`, `1.50`, `true`
    #[arg(long = "param", value_name = "LITERAL")]
    pub params: Vec<QueryParam>,

    /// Tables to resolve (read from the query when omitted)
    #[arg(long = "table", value_name = "NAMESPACE.NAME")]
    pub tables: Vec<TableRef>,

    /// Block to read commitments at (best block when omitted)
    #[arg(long)]
    pub block_hash: Option<BlockHash>,

    /// Commitment scheme
    #[arg(long, env = "COMMITMENT_SCHEME", default_value = "hyperKzg")]
    pub scheme: CommitmentScheme,

    /// Chain node JSON-RPC endpoint
    #[arg(long, env = "SUBSTRATE_NODE_URL", default_value = DEFAULT_SUBSTRATE_NODE_URL)]
    pub node_url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

/// What commands run against
pub struct Environment {
    /// Transport for every outbound request
    pub transport: Arc<dyn HttpTransport>,

    /// Verifier to plan and check queries with; `query` and `plan` fail without one
    pub verifier: Option<VerifierFactory>,

    /// Cancellation for long-running commands
    pub cancel: Option<CancellationSignal>,
}

impl Environment {
    fn verifier(&self, scheme: CommitmentScheme) -> Result<Arc<dyn PlanVerifyAdapter>> {
        let factory = self.verifier.ok_or_else(|| {
            anyhow!("no proof verifier is available for {scheme}; this build cannot check results")
        })?;
        Ok(factory(scheme))
    }
}

/// Run `command`, writing its output to `out`
pub async fn execute<W: Write>(command: Commands, env: &Environment, out: &mut W) -> Result<()> {
    match command {
        Commands::Query(args) => run_query(args, env, out).await,
        Commands::Plan(args) => run_plan(args, env, out).await,
        Commands::StorageKey { table, scheme } => {
            writeln!(out, "{}", encode_hex(&commitment_storage_key(&table, scheme)))?;
            Ok(())
        }
        Commands::Attestations {
            block_hash,
            node_url,
        } => show_attestations(block_hash, &node_url, env, out).await,
    }
}

async fn run_query<W: Write>(args: QueryArgs, env: &Environment, out: &mut W) -> Result<()> {
    let config = args.to_config();
    let verifier = env.verifier(config.commitment_scheme)?;
    let orchestrator = QueryOrchestrator::new(env.transport.clone(), verifier, config)
        .context("invalid client configuration")?;

    let mut request = QueryRequest::new(&args.sql)
        .with_tables(args.tables)
        .with_params(args.params);
    if let Some(signal) = &env.cancel {
        request = request.with_cancel(signal.clone());
    }

    let started = Instant::now();
    let verified = orchestrator
        .query_and_verify(&request)
        .await
        .context("query was not verified")?;

    log::info!("verified in {}", Helpers::format_duration(started.elapsed()));
    for commitment in &verified.commitments {
        log::info!(
            "{}: {}",
            commitment.table,
            Helpers::short_hex(&commitment.commitment, 16)
        );
    }
    if let Some(attested) = &verified.attested {
        log::info!(
            "attested block {} #{}",
            attested.block_hash,
            attested.block_number
        );
    }

    writeln!(out, "{}", serde_json::to_string_pretty(&verified.result)?)?;
    Ok(())
}

async fn run_plan<W: Write>(args: PlanArgs, env: &Environment, out: &mut W) -> Result<()> {
    let config = ClientConfig::default()
        .with_node_url(&args.node_url)
        .with_commitment_scheme(args.scheme)
        .with_request_timeout(Duration::from_secs(args.timeout_secs));
    let verifier = env.verifier(args.scheme)?;
    let orchestrator = QueryOrchestrator::new(env.transport.clone(), verifier, config)
        .context("invalid client configuration")?;

    let request = QueryRequest::new(&args.sql)
        .with_tables(args.tables)
        .with_params(args.params);
    let planned = orchestrator
        .produce_plan(&request, args.block_hash)
        .await
        .context("query could not be planned")?;

    let commitments: serde_json::Map<String, serde_json::Value> = planned
        .commitments
        .iter()
        .map(|c| (c.table.to_string(), json!(c.to_wire_hex())))
        .collect();
    let output = json!({
        "plan": planned.plan,
        "request": planned.request,
        "commitments": commitments,
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

async fn show_attestations<W: Write>(
    block_hash: Option<BlockHash>,
    node_url: &str,
    env: &Environment,
    out: &mut W,
) -> Result<()> {
    let client = CommitmentClient::new(
        env.transport.as_ref(),
        node_url,
        CommitmentScheme::HyperKzg,
        Duration::from_secs(30),
    );
    let response = client
        .fetch_attestation(block_hash.as_ref(), env.cancel.as_ref())
        .await
        .context("could not read attestations")?;

    writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
    Ok(())
}
