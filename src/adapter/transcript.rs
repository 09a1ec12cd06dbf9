//! SHA-256 transcript adapter (test double)
//!
//! Binds a query plan, its parameters, the table commitments it was planned
//! against and the returned result into one SHA-256 digest. A prover that
//! emits `{"result": .., "transcript": "<hex>"}` passes when the digest
//! recomputed locally matches.
//!
//! **This is not a proof system.** Every input to the digest travels to the
//! prover in the request, so any prover can compute a matching transcript for
//! any result it likes. Use it only against local mock provers and in tests;
//! it is compiled only with the `transcript-adapter` feature.
//!
//! # Example
//!
//! ```rust
//! use posql_client::adapter::{transcript, PlanVerifyAdapter, TranscriptAdapter};
//! use posql_client::types::{CommitmentScheme, ProverResponse, TableCommitment};
//! use serde_json::json;
//!
//! let adapter = TranscriptAdapter::new(CommitmentScheme::HyperKzg);
//! let commitments = vec![TableCommitment::from_wire_hex(
//!     "ethereum.transactions".parse().unwrap(),
//!     "0xab12",
//! ).unwrap()];
//! let planned = adapter
//!     .plan("SELECT COUNT(*) FROM ethereum.transactions", &[], &commitments)
//!     .unwrap();
//!
//! let result = json!({"count": 42});
//! let digest = transcript::transcript(&planned.plan, &planned.commitments, &result);
//! let response = ProverResponse(json!({"result": result, "transcript": digest}));
//!
//! let verified = adapter
//!     .verify(&response, &planned.plan, &[], &planned.commitments)
//!     .unwrap();
//! assert_eq!(verified.0, json!({"count": 42}));
//! ```

use super::param::QueryParam;
use super::sql::QueryParser;
use super::{PlanVerifyAdapter, PlannedQuery};
use crate::error::AdapterError;
use crate::types::{
    strip_hex_prefix, CommitmentScheme, ProofPlan, ProverRequest, ProverResponse, QueryResult,
    TableCommitment,
};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

const DOMAIN: &[u8] = b"posql-transcript-v1";

/// Adapter that checks results against a SHA-256 transcript; not a verifier
#[derive(Debug)]
pub struct TranscriptAdapter {
    parser: QueryParser,
    scheme: CommitmentScheme,
}

impl TranscriptAdapter {
    /// Create an adapter for commitments under `scheme`
    pub fn new(scheme: CommitmentScheme) -> Self {
        Self {
            parser: QueryParser::new(),
            scheme,
        }
    }
}

impl PlanVerifyAdapter for TranscriptAdapter {
    fn plan(
        &self,
        query: &str,
        params: &[QueryParam],
        commitments: &[TableCommitment],
    ) -> Result<PlannedQuery, AdapterError> {
        let sql = self.parser.normalize(query)?;
        let tables = self.parser.referenced_tables(query)?;

        for table in &tables {
            if !commitments.iter().any(|c| &c.table == table) {
                return Err(AdapterError::new(format!("no commitment for table {table}")));
            }
        }

        let mut ordered = commitments.to_vec();
        ordered.sort();

        let plan = ProofPlan(json!({
            "sql": sql,
            "tables": tables.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "params": params,
            "commitmentScheme": self.scheme,
        }));

        let context: Map<String, Value> = ordered
            .iter()
            .map(|c| (c.table.to_string(), Value::String(c.to_wire_hex())))
            .collect();

        let request = ProverRequest(json!({
            "proofPlan": plan.0,
            "queryContext": context,
            "commitmentScheme": self.scheme,
        }));

        Ok(PlannedQuery {
            request,
            plan,
            commitments: ordered,
        })
    }

    fn verify(
        &self,
        response: &ProverResponse,
        plan: &ProofPlan,
        params: &[QueryParam],
        commitments: &[TableCommitment],
    ) -> Result<QueryResult, AdapterError> {
        let result = response
            .0
            .get("result")
            .ok_or_else(|| AdapterError::new("prover response has no result"))?;
        let claimed = response
            .0
            .get("transcript")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::new("prover response has no transcript"))?;

        let planned_tables = plan
            .0
            .get("tables")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::new("proof plan lists no tables"))?;
        for table in planned_tables {
            let table = table.as_str().unwrap_or_default();
            if !commitments.iter().any(|c| c.table.to_string() == table) {
                return Err(AdapterError::new(format!("no commitment for table {table}")));
            }
        }

        let planned_params = plan.0.get("params").cloned().unwrap_or(Value::Array(Vec::new()));
        if planned_params != json!(params) {
            return Err(AdapterError::new("parameters differ from the planned ones"));
        }

        let expected = transcript(plan, commitments, result);
        if !strip_hex_prefix(claimed).eq_ignore_ascii_case(&expected) {
            return Err(AdapterError::new(
                "transcript does not match plan, commitments and result",
            ));
        }

        Ok(QueryResult(result.clone()))
    }
}

/// Hex SHA-256 transcript over a plan, its commitments and a result
///
/// Commitment order does not matter.
pub fn transcript(plan: &ProofPlan, commitments: &[TableCommitment], result: &Value) -> String {
    let mut sorted: Vec<&TableCommitment> = commitments.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(DOMAIN);
    absorb(&mut hasher, plan.0.to_string().as_bytes());
    hasher.update((sorted.len() as u64).to_be_bytes());
    for commitment in sorted {
        absorb(&mut hasher, commitment.table.to_string().as_bytes());
        absorb(&mut hasher, &commitment.commitment);
    }
    absorb(&mut hasher, result.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn absorb(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
