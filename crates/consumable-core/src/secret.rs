//! Secret tokens
//!
//! A secret is the portable form of one voucher: the ephemeral private key,
//! its Merkle proof and the call metadata, serialized to a canonical JSON
//! document and wrapped in URL-safe base64 so the token survives query
//! strings, clipboards and chat messages unscathed.
//!
//! Secrets are derived from a dump but carry no back-reference to it; each
//! one is an independent copy safe to hand to a redeemer. Single use is
//! enforced by the contract's per-consumer counter, not by the token.

use alloy_primitives::{Address, B256};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::{CommitmentTree, TreeError};
use crate::wallet::Wallet;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Malformed secret: {0}")]
    MalformedSecret(String),

    #[error("Invalid method signature: {0}")]
    InvalidMethodSignature(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// One declared argument of the redemption method.
///
/// Carried in the token for forward compatibility; the call encoding itself
/// is fixed to `(bytes32[], address)` (see [`crate::redeem`]).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodArg {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Everything a redeemer needs to claim one voucher.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RedemptionPayload {
    pub private_key: B256,
    pub contract_address: Address,
    pub merkle_proof: Vec<B256>,
    pub method_name: String,
    pub method_args: Vec<MethodArg>,
    pub chain_id: u64,
}

/// Encode a payload into an opaque ASCII token.
pub fn encode(payload: &RedemptionPayload) -> String {
    let json = serde_json::to_vec(payload).expect("payload serializes");
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a token back into its payload. Exact inverse of [`encode`]:
/// `decode(&encode(&p)) == p` field-for-field.
pub fn decode(token: &str) -> Result<RedemptionPayload, SecretError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| SecretError::MalformedSecret(format!("bad base64: {e}")))?;
    serde_json::from_slice(&raw)
        .map_err(|e| SecretError::MalformedSecret(format!("bad payload: {e}")))
}

/// Issue one secret per wallet, embedding that wallet's inclusion proof.
///
/// Wallets must be the batch the tree was built from; an address missing
/// from the tree fails the whole issuance.
pub fn issue_secrets(
    tree: &CommitmentTree,
    wallets: &[Wallet],
    contract_address: Address,
    method_name: &str,
    method_args: &[MethodArg],
    chain_id: u64,
) -> Result<Vec<String>, SecretError> {
    wallets
        .iter()
        .map(|wallet| {
            let merkle_proof = tree.proof(wallet.address())?;
            Ok(encode(&RedemptionPayload {
                private_key: wallet.secret(),
                contract_address,
                merkle_proof,
                method_name: method_name.to_owned(),
                method_args: method_args.to_vec(),
                chain_id,
            }))
        })
        .collect()
}

/// Parse a Solidity-style method signature such as
/// `consumeSecret(bytes32[] proof, address receiver)` into the method name
/// and its argument descriptors.
pub fn parse_method_signature(signature: &str) -> Result<(String, Vec<MethodArg>), SecretError> {
    let signature = signature.trim();
    let open = signature
        .find('(')
        .ok_or_else(|| SecretError::InvalidMethodSignature("missing '('".into()))?;
    if !signature.ends_with(')') {
        return Err(SecretError::InvalidMethodSignature("missing ')'".into()));
    }

    let name = signature[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SecretError::InvalidMethodSignature(format!(
            "bad method name '{name}'"
        )));
    }

    let inner = &signature[open + 1..signature.len() - 1];
    let mut args = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let mut words = part.split_whitespace();
        let kind = words.next().expect("split of non-empty part").to_owned();
        let name = words.next().unwrap_or("").to_owned();
        if words.next().is_some() {
            return Err(SecretError::InvalidMethodSignature(format!(
                "bad argument '{part}'"
            )));
        }
        args.push(MethodArg { name, kind });
    }

    Ok((name.to_owned(), args))
}
