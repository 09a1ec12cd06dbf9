//! Attestation models returned by the chain node
//!
//! An attestation is a validator's signed statement of the state root at a
//! block. A response is accepted only when every attestation references the
//! same block and state root, and every signature recovers to the public key
//! the attestation names.
//!
//! Signatures are Ethereum personal-message signatures (secp256k1, keccak256
//! with the `\x19Ethereum Signed Message` prefix) over the state root followed
//! by the big-endian block number.

use crate::error::{Result, SdkError};
use crate::types::{encode_hex, hex_bytes, BlockHash};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Ethereum-style ECDSA signature split into its components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthereumSignature {
    /// `r` scalar
    pub r: [u8; 32],
    /// `s` scalar
    pub s: [u8; 32],
    /// Recovery id; 0-3, or 27-30 in Ethereum's legacy encoding
    pub v: u8,
}

impl EthereumSignature {
    /// Check that this signature over `message` was made by `public_key`
    ///
    /// # Arguments
    /// * `message` - Signed bytes, before the Ethereum message prefix
    /// * `public_key` - SEC1 encoded secp256k1 key, compressed or not
    ///
    /// # Returns
    /// `Err` with a reason when the signature is malformed, no key can be
    /// recovered, or the recovered key differs from `public_key`
    pub fn verify(&self, message: &[u8], public_key: &[u8]) -> std::result::Result<(), String> {
        let signature = Signature::from_scalars(self.r, self.s)
            .map_err(|_| "signature scalars are out of range".to_string())?;
        let v = if self.v >= 27 { self.v - 27 } else { self.v };
        let recovery_id =
            RecoveryId::from_byte(v).ok_or_else(|| format!("invalid recovery id {}", self.v))?;

        let recovered =
            VerifyingKey::recover_from_digest(eth_message_digest(message), &signature, recovery_id)
                .map_err(|_| "no public key recovers from the signature".to_string())?;
        let expected = VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|_| format!("invalid public key {}", encode_hex(public_key)))?;

        if recovered != expected {
            return Err(format!("signature was not made by {}", encode_hex(public_key)));
        }
        Ok(())
    }
}

/// Bytes a validator signs: the state root followed by the big-endian block number
pub fn attestation_message(state_root: &[u8], block_number: u64) -> Vec<u8> {
    let mut message = Vec::with_capacity(state_root.len() + 8);
    message.extend_from_slice(state_root);
    message.extend_from_slice(&block_number.to_be_bytes());
    message
}

/// Keccak256 state over an Ethereum personal message
pub(crate) fn eth_message_digest(message: &[u8]) -> Keccak256 {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher
}

/// A single attestation stored on chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attestation {
    /// Attestation signed with an Ethereum key
    #[serde(rename_all = "camelCase")]
    EthereumAttestation {
        /// Signature over the state root and block number
        signature: EthereumSignature,
        /// Signer's public key
        #[serde(with = "hex_bytes")]
        proposed_pub_key: Vec<u8>,
        /// Signer's Ethereum address
        #[serde(with = "hex_bytes")]
        address20: Vec<u8>,
        /// Attested state root
        #[serde(with = "hex_bytes")]
        state_root: Vec<u8>,
        /// Attested block number
        block_number: u64,
        /// Attested block hash
        block_hash: BlockHash,
    },
}

impl Attestation {
    /// Attested state root
    pub fn state_root(&self) -> &[u8] {
        match self {
            Attestation::EthereumAttestation { state_root, .. } => state_root,
        }
    }

    /// Attested block hash
    pub fn block_hash(&self) -> &BlockHash {
        match self {
            Attestation::EthereumAttestation { block_hash, .. } => block_hash,
        }
    }

    /// Attested block number
    pub fn block_number(&self) -> u64 {
        match self {
            Attestation::EthereumAttestation { block_number, .. } => *block_number,
        }
    }

    /// Check the signature over this attestation's state root and block number
    pub fn verify_signature(&self) -> std::result::Result<(), String> {
        match self {
            Attestation::EthereumAttestation {
                signature,
                proposed_pub_key,
                state_root,
                block_number,
                ..
            } => signature.verify(
                &attestation_message(state_root, *block_number),
                proposed_pub_key,
            ),
        }
    }
}

/// Result of the attestation RPCs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationsResponse {
    /// Attestations for `attestations_for`
    pub attestations: Vec<Attestation>,
    /// Hash of the attested block
    pub attestations_for: BlockHash,
    /// Number of the attested block
    pub attestations_for_block_number: u32,
    /// Block used to read the attestations
    pub at: BlockHash,
}

impl AttestationsResponse {
    /// Check that the response attests a single, agreed-upon, signed state
    ///
    /// Runs [`check_consistency`](Self::check_consistency), then
    /// [`verify_signatures`](Self::verify_signatures).
    pub fn verify(&self, requested: Option<&BlockHash>) -> Result<()> {
        self.check_consistency(requested)?;
        self.verify_signatures()
    }

    /// Check every attestation's signature
    ///
    /// # Returns
    /// `Err(SdkError::AttestationSignatureInvalid)` for the first attestation
    /// whose signature does not recover to its proposed public key
    pub fn verify_signatures(&self) -> Result<()> {
        for (index, attestation) in self.attestations.iter().enumerate() {
            attestation.verify_signature().map_err(|reason| {
                SdkError::AttestationSignatureInvalid {
                    block: self.attestations_for.to_string(),
                    reason: format!("attestation {index}: {reason}"),
                }
            })?;
        }
        Ok(())
    }

    /// Check that the response attests a single, agreed-upon state
    ///
    /// # Arguments
    /// * `requested` - Block the caller asked for, if any
    ///
    /// # Returns
    /// `Err(SdkError::AttestationUnavailable)` when there are no attestations;
    /// `Err(SdkError::AttestationInconsistent)` when the response is for a
    /// different block than requested, or when attestations disagree on the
    /// state root or on which block they attest.
    pub fn check_consistency(&self, requested: Option<&BlockHash>) -> Result<()> {
        let block = self.attestations_for.to_string();
        let inconsistent = |reason: String| SdkError::AttestationInconsistent {
            block: block.clone(),
            reason,
        };

        if let Some(requested) = requested {
            if requested != &self.attestations_for {
                return Err(inconsistent(format!(
                    "requested block {requested}, node answered for {}",
                    self.attestations_for
                )));
            }
        }

        let first = self
            .attestations
            .first()
            .ok_or_else(|| SdkError::AttestationUnavailable {
                block: Some(block.clone()),
            })?;

        for attestation in &self.attestations {
            if attestation.block_hash() != &self.attestations_for
                || attestation.block_number() != u64::from(self.attestations_for_block_number)
            {
                return Err(inconsistent(format!(
                    "attestation references block {} #{}",
                    attestation.block_hash(),
                    attestation.block_number()
                )));
            }
            if attestation.state_root() != first.state_root() {
                return Err(inconsistent(format!(
                    "state roots differ: {} vs {}",
                    encode_hex(first.state_root()),
                    encode_hex(attestation.state_root())
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::decode_hex;
    use k256::ecdsa::SigningKey;
    use serde_json::{json, Value};

    pub(crate) fn hash(byte: u8) -> String {
        format!("0x{}", hex::encode([byte; 32]))
    }

    fn validator(seed: u8) -> SigningKey {
        SigningKey::from_slice(&[seed; 32]).unwrap()
    }

    fn sign(key: &SigningKey, message: &[u8]) -> EthereumSignature {
        let (signature, recovery_id) = key
            .sign_digest_recoverable(eth_message_digest(message))
            .unwrap();
        let bytes = signature.to_bytes();
        EthereumSignature {
            r: bytes[..32].try_into().unwrap(),
            s: bytes[32..].try_into().unwrap(),
            v: recovery_id.to_byte(),
        }
    }

    fn public_key(key: &SigningKey) -> String {
        encode_hex(key.verifying_key().to_encoded_point(true).as_bytes())
    }

    /// Attestation for `root` at block `number`, signed by a test validator
    pub(crate) fn attestation_json(block: u8, number: u64, root: &str) -> Value {
        let key = validator(7);
        let signature = sign(&key, &attestation_message(&decode_hex(root).unwrap(), number));
        json!({
            "signature": signature,
            "proposedPubKey": public_key(&key),
            "address20": "0x0102030405060708090a0b0c0d0e0f1011121314",
            "stateRoot": root,
            "blockNumber": number,
            "blockHash": hash(block),
        })
    }

    pub(crate) fn response_json(block: u8, number: u32, attestations: Vec<Value>) -> Value {
        json!({
            "attestations": attestations,
            "attestationsFor": hash(block),
            "attestationsForBlockNumber": number,
            "at": hash(0xee),
        })
    }

    fn parse(value: Value) -> AttestationsResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_response_deserializes() {
        let response = parse(response_json(7, 100, vec![attestation_json(7, 100, "0xbeef")]));
        assert_eq!(response.attestations_for_block_number, 100);
        assert_eq!(response.attestations[0].state_root(), &[0xbe_u8, 0xef][..]);
        assert_eq!(response.attestations[0].block_hash().to_string(), hash(7));
    }

    #[test]
    fn test_consistent_attestations_pass() {
        let response = parse(response_json(
            7,
            100,
            vec![
                attestation_json(7, 100, "0xbeef"),
                attestation_json(7, 100, "0xbeef"),
            ],
        ));
        let requested: BlockHash = hash(7).parse().unwrap();
        assert!(response.check_consistency(None).is_ok());
        assert!(response.check_consistency(Some(&requested)).is_ok());
    }

    #[test]
    fn test_empty_attestations_are_unavailable() {
        let response = parse(response_json(7, 100, vec![]));
        assert!(matches!(
            response.check_consistency(None),
            Err(SdkError::AttestationUnavailable { block: Some(_) })
        ));
    }

    #[test]
    fn test_differing_state_roots_are_inconsistent() {
        let response = parse(response_json(
            7,
            100,
            vec![
                attestation_json(7, 100, "0xbeef"),
                attestation_json(7, 100, "0xdead"),
            ],
        ));
        assert!(matches!(
            response.check_consistency(None),
            Err(SdkError::AttestationInconsistent { .. })
        ));
    }

    #[test]
    fn test_signed_attestations_verify() {
        let response = parse(response_json(
            7,
            100,
            vec![
                attestation_json(7, 100, "0xbeef"),
                attestation_json(7, 100, "0xbeef"),
            ],
        ));
        assert!(response.verify(None).is_ok());
    }

    #[test]
    fn test_attestation_message_layout() {
        assert_eq!(
            attestation_message(&[0xbe, 0xef], 258),
            vec![0xbe, 0xef, 0, 0, 0, 0, 0, 0, 1, 2]
        );
    }

    #[test]
    fn test_legacy_recovery_id_is_accepted() {
        let key = validator(3);
        let message = attestation_message(&[1, 2, 3], 9);
        let mut signature = sign(&key, &message);
        signature.v += 27;
        let public = decode_hex(&public_key(&key)).unwrap();
        assert!(signature.verify(&message, &public).is_ok());
    }

    #[test]
    fn test_signature_from_other_key_is_rejected() {
        let mut attestation = attestation_json(7, 100, "0xbeef");
        attestation["proposedPubKey"] = json!(public_key(&validator(8)));
        let response = parse(response_json(7, 100, vec![attestation]));

        assert!(response.check_consistency(None).is_ok());
        match response.verify(None) {
            Err(SdkError::AttestationSignatureInvalid { block, reason }) => {
                assert_eq!(block, hash(7));
                assert!(reason.contains("attestation 0"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_tampered_attestation_is_rejected() {
        // signed for block 100, presented as block 101
        let mut attestation = attestation_json(7, 100, "0xbeef");
        attestation["blockNumber"] = json!(101);
        let response = parse(response_json(7, 101, vec![attestation]));
        assert!(matches!(
            response.verify(None),
            Err(SdkError::AttestationSignatureInvalid { .. })
        ));

        let mut attestation = attestation_json(7, 100, "0xbeef");
        let first = attestation["signature"]["s"][0].as_u64().unwrap();
        attestation["signature"]["s"][0] = json!(first ^ 1);
        let response = parse(response_json(7, 100, vec![attestation]));
        assert!(response.verify_signatures().is_err());
    }

    #[test]
    fn test_attestation_for_other_block_is_inconsistent() {
        let response = parse(response_json(7, 100, vec![attestation_json(8, 101, "0xbeef")]));
        assert!(response.check_consistency(None).is_err());

        let response = parse(response_json(7, 100, vec![attestation_json(7, 100, "0xbeef")]));
        let other: BlockHash = hash(9).parse().unwrap();
        match response.check_consistency(Some(&other)) {
            Err(SdkError::AttestationInconsistent { reason, .. }) => {
                assert!(reason.contains(&hash(9)));
                assert!(reason.contains(&hash(7)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
