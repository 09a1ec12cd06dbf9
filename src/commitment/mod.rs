//! Commitment source client
//!
//! This module resolves the commitments a proof must be checked against:
//! - `storage_key`: derivation of the chain storage key for a table
//! - `rpc`: JSON-RPC calls to the chain node
//! - `attestation`: attestation models, consistency and signature checks
//!
//! Commitments are read either directly at the node's best block or, via an
//! attestation, at a block validators have signed off on. Both paths return
//! [`TableCommitment`] records with the wire `0x` prefix stripped.
//!
//! # Example
//!
//! ```rust,no_run
//! use posql_client::commitment::{CommitmentClient, CommitmentSource};
//! use posql_client::transport::ReqwestTransport;
//! use posql_client::types::{CommitmentScheme, TableRef};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ReqwestTransport::new();
//! let client = CommitmentClient::new(
//!     &transport,
//!     "https://rpc.testnet.sxt.network",
//!     CommitmentScheme::DynamicDory,
//!     Duration::from_secs(30),
//! );
//! let tables: Vec<TableRef> = vec!["ethereum.blocks".parse()?];
//! let resolved = client
//!     .resolve(&CommitmentSource::Attested { block_hash: None }, &tables, None)
//!     .await?;
//! println!("{} commitments", resolved.commitments.len());
//! # Ok(())
//! # }
//! ```

pub mod attestation;
pub mod rpc;
pub mod storage_key;

pub use attestation::{attestation_message, Attestation, AttestationsResponse, EthereumSignature};
pub use rpc::RpcClient;
pub use storage_key::{commitment_storage_key, encode_table_id};

use crate::error::{Result, SdkError, WorkflowStep};
use crate::transport::{CancellationSignal, HttpTransport};
use crate::types::{encode_hex, BlockHash, CommitmentScheme, TableCommitment, TableRef};
use crate::utils::Helpers;
use serde_json::json;
use std::time::Duration;

/// JSON-RPC method reading a storage value
pub const STATE_GET_STORAGE: &str = "state_getStorage";

/// JSON-RPC method returning the best recently attested block
pub const BEST_RECENT_ATTESTATIONS: &str = "attestation_v1_bestRecentAttestations";

/// JSON-RPC method returning the attestations for one block
pub const ATTESTATIONS_FOR_BLOCK: &str = "attestation_v1_attestationsForBlock";

/// Where commitments are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitmentSource {
    /// Read at the node's best block
    Direct,

    /// Read at a given block, without attestations
    AtBlock {
        /// Block to read at
        block_hash: BlockHash,
    },

    /// Read at an attested block
    Attested {
        /// Block to use; the best recently attested block when `None`
        block_hash: Option<BlockHash>,
    },
}

/// The attested block commitments were read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedBlock {
    /// Block hash
    pub block_hash: BlockHash,

    /// Block number
    pub block_number: u32,

    /// State root every attestation agreed on
    pub state_root: Vec<u8>,
}

/// Commitments for a set of tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommitments {
    /// One commitment per requested table, in request order
    pub commitments: Vec<TableCommitment>,

    /// Set when the commitments were read at an attested block
    pub attested: Option<AttestedBlock>,
}

/// Client for commitments held in chain storage
pub struct CommitmentClient<'a> {
    rpc: RpcClient<'a>,
    scheme: CommitmentScheme,
}

impl<'a> CommitmentClient<'a> {
    /// Create a client for the node at `node_url`
    ///
    /// # Arguments
    /// * `transport` - Transport used for every RPC call
    /// * `node_url` - Chain node JSON-RPC endpoint
    /// * `scheme` - Commitment scheme to read
    /// * `timeout` - Per-request deadline
    pub fn new(
        transport: &'a dyn HttpTransport,
        node_url: &'a str,
        scheme: CommitmentScheme,
        timeout: Duration,
    ) -> Self {
        Self {
            rpc: RpcClient::new(transport, node_url, timeout),
            scheme,
        }
    }

    /// Resolve commitments for `tables` from `source`
    pub async fn resolve(
        &self,
        source: &CommitmentSource,
        tables: &[TableRef],
        cancel: Option<&CancellationSignal>,
    ) -> Result<ResolvedCommitments> {
        match source {
            CommitmentSource::Direct => Ok(ResolvedCommitments {
                commitments: self.fetch_commitments(tables, cancel).await?,
                attested: None,
            }),
            CommitmentSource::AtBlock { block_hash } => Ok(ResolvedCommitments {
                commitments: self.fetch_commitments_at(tables, block_hash, cancel).await?,
                attested: None,
            }),
            CommitmentSource::Attested { block_hash } => {
                self.fetch_attested_commitments(tables, block_hash.as_ref(), cancel)
                    .await
            }
        }
    }

    /// Read each table's commitment at the node's best block
    ///
    /// # Returns
    /// One commitment per distinct table, in request order;
    /// `Err(SdkError::CommitmentNotFound)` for the first table with no
    /// stored commitment.
    pub async fn fetch_commitments(
        &self,
        tables: &[TableRef],
        cancel: Option<&CancellationSignal>,
    ) -> Result<Vec<TableCommitment>> {
        self.read_commitments(tables, None, WorkflowStep::ResolvingCommitment, cancel)
            .await
    }

    /// Read each table's commitment at `block_hash`
    pub async fn fetch_commitments_at(
        &self,
        tables: &[TableRef],
        block_hash: &BlockHash,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Vec<TableCommitment>> {
        self.read_commitments(
            tables,
            Some(block_hash),
            WorkflowStep::ResolvingCommitment,
            cancel,
        )
        .await
    }

    /// Fetch and check the attestations for `block_hash`, or the best recent ones
    pub async fn fetch_attestation(
        &self,
        block_hash: Option<&BlockHash>,
        cancel: Option<&CancellationSignal>,
    ) -> Result<AttestationsResponse> {
        let step = WorkflowStep::ResolvingAttestation;
        let response: Option<AttestationsResponse> = match block_hash {
            Some(hash) => {
                self.rpc
                    .call(step, ATTESTATIONS_FOR_BLOCK, json!([hash.to_wire_hex()]), cancel)
                    .await?
            }
            None => {
                self.rpc
                    .call(step, BEST_RECENT_ATTESTATIONS, json!([]), cancel)
                    .await?
            }
        };

        let response = response.ok_or_else(|| SdkError::AttestationUnavailable {
            block: block_hash.map(ToString::to_string),
        })?;
        response.verify(block_hash)?;

        log::info!(
            "using attested block {} #{} ({} attestations)",
            response.attestations_for,
            response.attestations_for_block_number,
            response.attestations.len()
        );
        Ok(response)
    }

    /// Read each table's commitment at an attested block
    ///
    /// # Arguments
    /// * `tables` - Tables to read
    /// * `block_hash` - Block to use; the best recently attested block when `None`
    /// * `cancel` - Optional signal that aborts in-flight requests
    pub async fn fetch_attested_commitments(
        &self,
        tables: &[TableRef],
        block_hash: Option<&BlockHash>,
        cancel: Option<&CancellationSignal>,
    ) -> Result<ResolvedCommitments> {
        let response = self.fetch_attestation(block_hash, cancel).await?;
        let state_root = response
            .attestations
            .first()
            .map(|a| a.state_root().to_vec())
            .unwrap_or_default();

        let commitments = self
            .read_commitments(
                tables,
                Some(&response.attestations_for),
                WorkflowStep::ResolvingAttestation,
                cancel,
            )
            .await?;

        Ok(ResolvedCommitments {
            commitments,
            attested: Some(AttestedBlock {
                block_hash: response.attestations_for,
                block_number: response.attestations_for_block_number,
                state_root,
            }),
        })
    }

    async fn read_commitments(
        &self,
        tables: &[TableRef],
        at: Option<&BlockHash>,
        step: WorkflowStep,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Vec<TableCommitment>> {
        let mut commitments: Vec<TableCommitment> = Vec::with_capacity(tables.len());

        for table in tables {
            if commitments.iter().any(|c| &c.table == table) {
                continue;
            }

            let key = encode_hex(&commitment_storage_key(table, self.scheme));
            let params = match at {
                Some(hash) => json!([key, hash.to_wire_hex()]),
                None => json!([key]),
            };

            log::debug!("reading {} commitment for {}", self.scheme, table);
            let value: Option<String> = self.rpc.call(step, STATE_GET_STORAGE, params, cancel).await?;
            let value = value.ok_or_else(|| SdkError::CommitmentNotFound {
                table: table.to_string(),
            })?;
            let commitment = TableCommitment::from_wire_hex(table.clone(), &value)?;
            log::debug!(
                "{} commitment: {}",
                table,
                Helpers::short_hex(&commitment.commitment, 8)
            );
            commitments.push(commitment);
        }

        Ok(commitments)
    }
}
