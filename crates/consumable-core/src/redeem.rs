//! Redemption of decoded secrets
//!
//! Builds and submits the `method(bytes32[],address)` call from the
//! payload's embedded ephemeral key and classifies the receipt. A revert is
//! final, since the proof state that caused it will not change, so nothing
//! here retries, and no local "used" state is kept.

use alloy_primitives::{Address, B256, U256};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::chains::ChainNetwork;
use crate::rpc::{ChainTransport, HttpProvider, RpcError};
use crate::secret::RedemptionPayload;
use crate::tx::{Eip1559Tx, TxError};
use crate::wallet::{Wallet, WalletError};

#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("Unsupported chain id {0}")]
    UnsupportedChain(u64),

    #[error("Payload carries an unusable private key")]
    InvalidPayload(#[from] WalletError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Tx(#[from] TxError),

    #[error("Redemption transaction {tx_hash} failed: {reason}")]
    RedemptionFailed { tx_hash: B256, reason: String },
}

/// A confirmed, successful redemption.
#[derive(Clone, Debug)]
pub struct Redemption {
    pub tx_hash: B256,
    pub block_number: u64,
}

/// Submits redemption calls over a [`ChainTransport`].
#[derive(Debug)]
pub struct RedemptionClient<T: ChainTransport> {
    transport: T,
}

impl RedemptionClient<HttpProvider> {
    /// Resolve the endpoint for the payload's chain from the registry.
    pub fn for_payload(payload: &RedemptionPayload) -> Result<Self, RedeemError> {
        let network = ChainNetwork::for_chain_id(payload.chain_id)
            .ok_or(RedeemError::UnsupportedChain(payload.chain_id))?;
        Ok(Self {
            transport: HttpProvider::new(network.rpc_url()),
        })
    }
}

impl<T: ChainTransport> RedemptionClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    /// Submit the redemption and block until the network reports inclusion.
    ///
    /// Success and failure are read from the receipt status alone; an
    /// already-consumed secret, an exhausted counter and an invalid proof
    /// all surface uniformly as [`RedeemError::RedemptionFailed`].
    pub async fn consume(
        &self,
        payload: &RedemptionPayload,
        recipient: Address,
    ) -> Result<Redemption, RedeemError> {
        let wallet = Wallet::from_secret(payload.private_key)?;
        let data = consume_calldata(&payload.method_name, &payload.merkle_proof, recipient);

        let fees = self.transport.estimate_fees().await?;
        let nonce = self.transport.transaction_count(wallet.address()).await?;
        let tx = Eip1559Tx::contract_call(
            payload.chain_id,
            nonce,
            payload.contract_address,
            data,
            fees,
        );
        let signed = tx.sign(&payload.private_key)?;

        tracing::info!(
            consumer = %wallet.address(),
            contract = %payload.contract_address,
            tx_hash = %signed.hash,
            "submitting redemption"
        );
        let tx_hash = self.transport.send_transaction(&signed).await?;
        let receipt = self.transport.wait_for_receipt(tx_hash).await?;

        if receipt.success {
            Ok(Redemption {
                tx_hash,
                block_number: receipt.block_number,
            })
        } else {
            Err(RedeemError::RedemptionFailed {
                tx_hash,
                reason: receipt
                    .reason
                    .unwrap_or_else(|| "execution reverted".into()),
            })
        }
    }
}

/// 4-byte selector for `name(bytes32[],address)`.
fn selector(method_name: &str) -> [u8; 4] {
    let digest = Keccak256::digest(format!("{method_name}(bytes32[],address)"));
    [digest[0], digest[1], digest[2], digest[3]]
}

/// ABI-encode the call as `(proof, receiver)`, positionally.
///
/// The payload's `methodArgs` descriptor is deliberately not consulted: the
/// verifying contract takes exactly these two parameters in this order, and
/// no other shape is in use.
pub(crate) fn consume_calldata(
    method_name: &str,
    proof: &[B256],
    receiver: Address,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * (3 + proof.len()));
    data.extend_from_slice(&selector(method_name));
    // head: offset of the dynamic proof array, then the receiver word
    data.extend_from_slice(&U256::from(0x40).to_be_bytes::<32>());
    let mut receiver_word = [0u8; 32];
    receiver_word[12..].copy_from_slice(receiver.as_slice());
    data.extend_from_slice(&receiver_word);
    // tail: array length, then the proof words
    data.extend_from_slice(&U256::from(proof.len()).to_be_bytes::<32>());
    for step in proof {
        data.extend_from_slice(step.as_slice());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_name_sensitive() {
        let a = selector("consumeSecret");
        let b = selector("consumeSecret");
        let c = selector("claim");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_calldata_layout() {
        let proof = vec![B256::repeat_byte(0x01), B256::repeat_byte(0x02)];
        let receiver = Address::repeat_byte(0x99);
        let data = consume_calldata("consumeSecret", &proof, receiver);

        assert_eq!(data.len(), 4 + 32 * 5);
        assert_eq!(&data[..4], &selector("consumeSecret"));
        // head word 0: offset 0x40 to the array tail
        assert_eq!(data[4 + 31], 0x40);
        assert!(data[4..4 + 31].iter().all(|b| *b == 0));
        // head word 1: receiver, left-padded
        assert!(data[36..48].iter().all(|b| *b == 0));
        assert_eq!(&data[48..68], receiver.as_slice());
        // tail: length then the two proof words
        assert_eq!(data[68 + 31], 2);
        assert_eq!(&data[100..132], B256::repeat_byte(0x01).as_slice());
        assert_eq!(&data[132..164], B256::repeat_byte(0x02).as_slice());
    }

    #[test]
    fn test_empty_proof_calldata() {
        let data = consume_calldata("consumeSecret", &[], Address::repeat_byte(0x01));
        assert_eq!(data.len(), 4 + 32 * 3);
        assert_eq!(data[4 + 64 + 31], 0);
    }
}
