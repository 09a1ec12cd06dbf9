//! Core types for the query-and-verify workflow
//!
//! This module defines the data threaded between workflow steps:
//! - Table references and their commitments
//! - Opaque prover payloads (request, plan, response, result)
//! - Asynchronous job handles and statuses
//! - Commitment schemes, networks, block hashes and access tokens

use crate::error::{Result, SdkError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schema assumed for table references written without a namespace
pub const DEFAULT_SCHEMA: &str = "PUBLIC";

/// Strip a leading `0x`/`0X` from a hex string
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Decode a wire hex string (with or without `0x`) into bytes
pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    hex::decode(strip_hex_prefix(value)).map_err(|e| SdkError::InvalidHex(format!("{value}: {e}")))
}

/// Encode bytes as a wire hex string with a `0x` prefix
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Fully qualified table reference (`NAMESPACE.NAME`)
///
/// Identifiers are stored upper-cased, matching how tables are keyed in chain
/// storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema / namespace
    pub namespace: String,

    /// Table name
    pub name: String,
}

impl TableRef {
    /// Create a table reference from its parts
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_uppercase(),
            name: name.to_uppercase(),
        }
    }
}

impl FromStr for TableRef {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        let valid = |part: &str| !part.is_empty() && !part.contains(char::is_whitespace);
        match parts.as_slice() {
            [name] if valid(name) => Ok(Self::new(DEFAULT_SCHEMA, name)),
            [namespace, name] if valid(namespace) && valid(name) => {
                Ok(Self::new(namespace, name))
            }
            _ => Err(SdkError::InvalidTableRef(s.to_string())),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Commitment to a table's current state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableCommitment {
    /// The committed table
    pub table: TableRef,

    /// Commitment bytes, hex-decoded with the wire prefix stripped
    pub commitment: Vec<u8>,
}

impl TableCommitment {
    /// Create a commitment record
    pub fn new(table: TableRef, commitment: Vec<u8>) -> Self {
        Self { table, commitment }
    }

    /// Build a commitment record from a wire hex value such as `"0xAB12"`
    pub fn from_wire_hex(table: TableRef, value: &str) -> Result<Self> {
        Ok(Self::new(table, decode_hex(value)?))
    }

    /// Commitment bytes as wire hex (`0x`-prefixed)
    pub fn to_wire_hex(&self) -> String {
        encode_hex(&self.commitment)
    }
}

/// Short-lived bearer credential
///
/// Never printed: the `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value for the `Authorization` header
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Request body sent to the proof-producing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProverRequest(pub serde_json::Value);

/// Logical plan the verifier needs to interpret a proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofPlan(pub serde_json::Value);

/// Proof artifact returned by the prover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProverResponse(pub serde_json::Value);

/// A verified query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryResult(pub serde_json::Value);

/// Commitment schemes understood by the prover and the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommitmentScheme {
    /// HyperKZG commitments
    #[serde(alias = "HYPER_KZG")]
    HyperKzg,
    /// Dynamic Dory commitments
    #[serde(alias = "DYNAMIC_DORY")]
    DynamicDory,
}

impl CommitmentScheme {
    /// Name used by the zk query service
    pub fn job_wire_name(&self) -> &'static str {
        match self {
            CommitmentScheme::HyperKzg => "HYPER_KZG",
            CommitmentScheme::DynamicDory => "DYNAMIC_DORY",
        }
    }

    /// Discriminant used when the scheme is part of a storage key
    pub fn storage_index(&self) -> u8 {
        match self {
            CommitmentScheme::HyperKzg => 0,
            CommitmentScheme::DynamicDory => 1,
        }
    }
}

impl fmt::Display for CommitmentScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommitmentScheme::HyperKzg => "hyperKzg",
            CommitmentScheme::DynamicDory => "dynamicDory",
        })
    }
}

impl FromStr for CommitmentScheme {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "hyperkzg" => Ok(CommitmentScheme::HyperKzg),
            "dynamicdory" | "dory" => Ok(CommitmentScheme::DynamicDory),
            _ => Err(SdkError::Configuration(format!(
                "unknown commitment scheme {s:?}"
            ))),
        }
    }
}

/// Network the queried data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SxtNetwork {
    /// Main network
    #[default]
    Mainnet,
    /// Test network
    Testnet,
}

impl fmt::Display for SxtNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SxtNetwork::Mainnet => "mainnet",
            SxtNetwork::Testnet => "testnet",
        })
    }
}

impl FromStr for SxtNetwork {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(SxtNetwork::Mainnet),
            "testnet" => Ok(SxtNetwork::Testnet),
            _ => Err(SdkError::Configuration(format!("unknown network {s:?}"))),
        }
    }
}

/// 32-byte chain block hash
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// Wire form, `0x`-prefixed
    pub fn to_wire_hex(&self) -> String {
        encode_hex(&self.0)
    }
}

impl FromStr for BlockHash {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_hex(s)?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SdkError::InvalidHex(format!("{s}: block hash must be 32 bytes")))?;
        Ok(Self(hash))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self.to_wire_hex())
    }
}

impl Serialize for BlockHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Status of an asynchronous proof job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    /// Accepted, not yet running
    Pending,
    /// Waiting in the job queue
    Queued,
    /// Being proven
    Running,
    /// Finished successfully; results are available
    Done,
    /// Finished unsuccessfully
    Failed,
    /// Canceled by the service
    Canceled,
    /// Any status string this client does not know
    #[serde(other)]
    Unknown,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::Unknown => "unknown",
        })
    }
}

/// Handle to an in-flight asynchronous proof computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProverJob {
    /// Identifier assigned by the zk query service
    pub query_id: String,

    /// Last observed status
    pub status: JobStatus,
}

impl ProverJob {
    /// A freshly submitted job
    pub fn submitted(query_id: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            status: JobStatus::Pending,
        }
    }
}

/// Serde helpers for `0x`-prefixed hex byte fields
pub(crate) mod hex_bytes {
    use super::{decode_hex, encode_hex};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_table_ref_parse_qualified() {
        let table: TableRef = "ethereum.transactions".parse().unwrap();
        assert_eq!(table.namespace, "ETHEREUM");
        assert_eq!(table.name, "TRANSACTIONS");
        assert_eq!(table.to_string(), "ETHEREUM.TRANSACTIONS");
    }

    #[test]
    fn test_table_ref_parse_default_schema() {
        let table: TableRef = "blocks".parse().unwrap();
        assert_eq!(table.namespace, DEFAULT_SCHEMA);
        assert_eq!(table.name, "BLOCKS");
    }

    #[test]
    fn test_table_ref_parse_rejects_malformed() {
        assert!("".parse::<TableRef>().is_err());
        assert!("a.b.c".parse::<TableRef>().is_err());
        assert!(".blocks".parse::<TableRef>().is_err());
        assert!("eth. blocks".parse::<TableRef>().is_err());
    }

    #[test]
    fn test_commitment_from_wire_hex_strips_prefix() {
        let table: TableRef = "ethereum.transactions".parse().unwrap();
        let commitment = TableCommitment::from_wire_hex(table, "0xAB12").unwrap();
        assert_eq!(commitment.commitment, vec![0xAB, 0x12]);
        assert_eq!(commitment.to_wire_hex(), "0xab12");
    }

    #[test]
    fn test_decode_hex_rejects_garbage() {
        assert!(matches!(decode_hex("0xZZ"), Err(SdkError::InvalidHex(_))));
        assert!(matches!(decode_hex("0xABC"), Err(SdkError::InvalidHex(_))));
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("tok1");
        assert_eq!(token.as_str(), "tok1");
        assert!(!format!("{:?}", token).contains("tok1"));
    }

    #[test]
    fn test_block_hash_round_trips_through_json() {
        let hex = format!("0x{}", "ab".repeat(32));
        let hash: BlockHash = hex.parse().unwrap();
        let json = serde_json::to_value(hash).unwrap();
        assert_eq!(json, serde_json::json!(hex));
        assert!("0xabcd".parse::<BlockHash>().is_err());
    }

    #[test]
    fn test_job_status_wire_names() {
        let status: JobStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(status, JobStatus::Canceled);
        let status: JobStatus = serde_json::from_str("\"somethingNew\"").unwrap();
        assert_eq!(status, JobStatus::Unknown);
    }

    #[test]
    fn test_commitment_scheme_parse_and_wire_name() {
        assert_eq!(
            "hyper-kzg".parse::<CommitmentScheme>().unwrap(),
            CommitmentScheme::HyperKzg
        );
        assert_eq!(
            "DynamicDory".parse::<CommitmentScheme>().unwrap(),
            CommitmentScheme::DynamicDory
        );
        assert_eq!(
            serde_json::to_value(CommitmentScheme::HyperKzg).unwrap(),
            serde_json::json!("hyperKzg")
        );
        assert_eq!(CommitmentScheme::DynamicDory.job_wire_name(), "DYNAMIC_DORY");
        assert_eq!(
            serde_json::from_value::<CommitmentScheme>(serde_json::json!("HYPER_KZG")).unwrap(),
            CommitmentScheme::HyperKzg
        );
    }

    proptest! {
        #[test]
        fn prop_wire_hex_normalization(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let wire = encode_hex(&bytes);
            prop_assert!(wire.starts_with("0x"));
            prop_assert_eq!(decode_hex(&wire).unwrap(), bytes.clone());
            prop_assert_eq!(decode_hex(strip_hex_prefix(&wire)).unwrap(), bytes);
        }
    }
}
