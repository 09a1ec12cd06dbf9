//! Chain storage keys for table commitments
//!
//! Commitments live in a double map keyed by table identifier and commitment
//! scheme. A full key is laid out as:
//!
//! ```text
//! twox128("Commitments") ++ twox128("CommitmentStorageMap")
//!     ++ blake2_128(id) ++ id
//!     ++ blake2_128(scheme) ++ scheme
//! ```
//!
//! where `id` is the SCALE encoding of the table name followed by its
//! namespace, and `scheme` is the one-byte scheme discriminant. Both map keys
//! are appended verbatim after their hash, so distinct tables always yield
//! distinct keys.
//!
//! # Example
//!
//! ```rust
//! use posql_client::commitment::commitment_storage_key;
//! use posql_client::types::{CommitmentScheme, TableRef};
//!
//! let table: TableRef = "ethereum.blocks".parse().unwrap();
//! let key = commitment_storage_key(&table, CommitmentScheme::DynamicDory);
//! assert_eq!(key.len(), 32 + 16 + 16 + 16 + 1);
//! ```

use crate::types::{CommitmentScheme, TableRef};
use blake2::digest::consts::U16;
use blake2::{Blake2b, Digest};

type Blake2b128 = Blake2b<U16>;

/// `twox128("Commitments")`
const PALLET_PREFIX: [u8; 16] = [
    0xca, 0x40, 0x72, 0x06, 0xec, 0x1a, 0xb7, 0x26, 0xb2, 0x63, 0x6c, 0x4b, 0x14, 0x5a, 0xc2, 0x87,
];

/// `twox128("CommitmentStorageMap")`
const STORAGE_PREFIX: [u8; 16] = [
    0x49, 0x50, 0x5e, 0x27, 0x35, 0x36, 0xfa, 0xe3, 0x53, 0x30, 0xb9, 0x66, 0xda, 0xc6, 0x9e, 0x86,
];

/// Derive the storage key holding `table`'s commitment under `scheme`
///
/// # Arguments
/// * `table` - Fully qualified table reference (already upper-cased)
/// * `scheme` - Commitment scheme of the stored commitment
///
/// # Returns
/// Raw key bytes; hex-encode with a `0x` prefix before sending
pub fn commitment_storage_key(table: &TableRef, scheme: CommitmentScheme) -> Vec<u8> {
    let id = encode_table_id(table);
    let scheme = [scheme.storage_index()];

    let mut key = Vec::with_capacity(32 + 16 + id.len() + 16 + 1);
    key.extend_from_slice(&PALLET_PREFIX);
    key.extend_from_slice(&STORAGE_PREFIX);
    key.extend_from_slice(&blake2_128(&id));
    key.extend_from_slice(&id);
    key.extend_from_slice(&blake2_128(&scheme));
    key.extend_from_slice(&scheme);
    key
}

/// SCALE encoding of a table identifier: name, then namespace
pub fn encode_table_id(table: &TableRef) -> Vec<u8> {
    let mut out = Vec::with_capacity(table.name.len() + table.namespace.len() + 2);
    encode_str(&mut out, &table.name);
    encode_str(&mut out, &table.namespace);
    out
}

fn encode_str(out: &mut Vec<u8>, value: &str) {
    encode_compact(out, value.len() as u64);
    out.extend_from_slice(value.as_bytes());
}

/// SCALE compact integer encoding
fn encode_compact(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0x3f => out.push((value as u8) << 2),
        0x40..=0x3fff => out.extend_from_slice(&(((value as u16) << 2) | 0b01).to_le_bytes()),
        0x4000..=0x3fff_ffff => {
            out.extend_from_slice(&(((value as u32) << 2) | 0b10).to_le_bytes())
        }
        _ => {
            let bytes = value.to_le_bytes();
            let len = 8 - (value.leading_zeros() / 8) as usize;
            out.push((((len - 4) as u8) << 2) | 0b11);
            out.extend_from_slice(&bytes[..len]);
        }
    }
}

fn blake2_128(data: &[u8]) -> [u8; 16] {
    let mut hasher = Blake2b128::new();
    hasher.update(data);
    hasher.finalize().into()
}
