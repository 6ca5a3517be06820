//! EIP-1559 transaction encoding and signing
//!
//! Typed-transaction RLP is small enough to encode by hand. Both shapes this
//! system sends go through here: the redemption contract call and the plain
//! value transfers of the funding batch.

use alloy_primitives::{Address, B256, U256};
use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// Gas limit for a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Gas limit for the redemption call. Generous fixed bound; the proof loop
/// dominates actual usage and stays well under it.
pub const REDEEM_GAS_LIMIT: u64 = 340_000;

/// EIP-1559 fee parameters quoted for a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl FeeEstimate {
    /// Headroom rule: double the base fee and the priority hint.
    ///
    /// Secrets may be redeemed long after the quote under unknown
    /// congestion; doubling keeps a single quote valid long enough to land
    /// without re-quoting. The doubled tip is folded into the fee cap so the
    /// envelope stays internally consistent.
    pub fn with_headroom(base_fee: u128, priority_hint: u128) -> Self {
        let max_priority_fee_per_gas = priority_hint.saturating_mul(2);
        Self {
            max_fee_per_gas: base_fee
                .saturating_mul(2)
                .saturating_add(max_priority_fee_per_gas),
            max_priority_fee_per_gas,
        }
    }
}

/// Unsigned EIP-1559 transaction.
#[derive(Clone, Debug)]
pub struct Eip1559Tx {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

impl Eip1559Tx {
    /// Zero-value contract call (redemption).
    pub fn contract_call(
        chain_id: u64,
        nonce: u64,
        to: Address,
        data: Vec<u8>,
        fees: FeeEstimate,
    ) -> Self {
        Self {
            chain_id,
            nonce,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            gas_limit: REDEEM_GAS_LIMIT,
            to,
            value: U256::ZERO,
            data,
        }
    }

    /// Plain value transfer (funding).
    pub fn transfer(
        chain_id: u64,
        nonce: u64,
        to: Address,
        value: U256,
        fees: FeeEstimate,
    ) -> Self {
        Self {
            chain_id,
            nonce,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            gas_limit: TRANSFER_GAS_LIMIT,
            to,
            value,
            data: Vec::new(),
        }
    }

    /// Type-2 envelope: `0x02 || rlp([fields..])`, optionally with the
    /// signature items appended.
    fn envelope(&self, signature: Option<&Signature>) -> Vec<u8> {
        let mut list = RlpList::new();
        list.uint(self.chain_id as u128);
        list.uint(self.nonce as u128);
        list.uint(self.max_priority_fee_per_gas);
        list.uint(self.max_fee_per_gas);
        list.uint(self.gas_limit as u128);
        list.bytes(self.to.as_slice());
        list.uint_wide(self.value);
        list.bytes(&self.data);
        // access list, always empty here
        list.raw(&[0xc0]);
        if let Some(sig) = signature {
            list.uint(sig.y_parity as u128);
            list.uint_be(&sig.r);
            list.uint_be(&sig.s);
        }

        let mut out = vec![0x02];
        list.finish_into(&mut out);
        out
    }

    /// Keccak of the unsigned envelope, the digest the key signs.
    pub fn signing_hash(&self) -> B256 {
        let digest: [u8; 32] = Keccak256::digest(self.envelope(None)).into();
        B256::from(digest)
    }

    /// Sign with `private_key` and produce the raw bytes for
    /// `eth_sendRawTransaction`.
    pub fn sign(&self, private_key: &B256) -> Result<SignedTx, TxError> {
        let key = SigningKey::from_slice(private_key.as_slice())
            .map_err(|_| TxError::InvalidPrivateKey)?;

        let (signature, recovery_id) = key
            .sign_prehash_recoverable(self.signing_hash().as_slice())
            .map_err(|e| TxError::SigningFailed(e.to_string()))?;

        let sig = Signature {
            y_parity: recovery_id.to_byte(),
            r: signature.r().to_bytes().into(),
            s: signature.s().to_bytes().into(),
        };

        let raw = self.envelope(Some(&sig));
        let digest: [u8; 32] = Keccak256::digest(&raw).into();
        let hash = B256::from(digest);
        Ok(SignedTx {
            raw,
            hash,
            nonce: self.nonce,
        })
    }
}

struct Signature {
    y_parity: u8,
    r: [u8; 32],
    s: [u8; 32],
}

/// A signed transaction ready for broadcast.
#[derive(Clone, Debug)]
pub struct SignedTx {
    /// Full type-2 envelope including the signature.
    pub raw: Vec<u8>,
    /// `keccak256(raw)`, the hash the network will report.
    pub hash: B256,
    /// Nonce the transaction was built with, kept for batch accounting.
    pub nonce: u64,
}

/// Minimal RLP list builder. Byte strings and unsigned integers are all a
/// typed transaction needs.
struct RlpList {
    content: Vec<u8>,
}

impl RlpList {
    fn new() -> Self {
        Self {
            content: Vec::new(),
        }
    }

    /// Append an integer item: big-endian, leading zeros stripped, zero is
    /// the empty string.
    fn uint(&mut self, value: u128) {
        let be = value.to_be_bytes();
        let start = be.iter().position(|b| *b != 0).unwrap_or(be.len());
        self.bytes(&be[start..]);
    }

    fn uint_wide(&mut self, value: U256) {
        let be: [u8; 32] = value.to_be_bytes();
        let start = be.iter().position(|b| *b != 0).unwrap_or(32);
        self.bytes(&be[start..]);
    }

    /// 32-byte big-endian integer (signature r/s), trimmed like `uint`.
    fn uint_be(&mut self, value: &[u8; 32]) {
        let start = value.iter().position(|b| *b != 0).unwrap_or(32);
        self.bytes(&value[start..]);
    }

    /// Append a byte-string item.
    fn bytes(&mut self, data: &[u8]) {
        if data.len() == 1 && data[0] < 0x80 {
            self.content.push(data[0]);
        } else if data.len() < 56 {
            self.content.push(0x80 + data.len() as u8);
            self.content.extend_from_slice(data);
        } else {
            push_long_length(&mut self.content, 0xb7, data.len());
            self.content.extend_from_slice(data);
        }
    }

    /// Append pre-encoded RLP verbatim.
    fn raw(&mut self, encoded: &[u8]) {
        self.content.extend_from_slice(encoded);
    }

    /// Wrap the accumulated items in a list header.
    fn finish_into(self, out: &mut Vec<u8>) {
        if self.content.len() < 56 {
            out.push(0xc0 + self.content.len() as u8);
        } else {
            push_long_length(out, 0xf7, self.content.len());
        }
        out.extend_from_slice(&self.content);
    }
}

fn push_long_length(out: &mut Vec<u8>, base: u8, len: usize) {
    let be = len.to_be_bytes();
    let start = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
    out.push(base + (be.len() - start) as u8);
    out.extend_from_slice(&be[start..]);
}
