//! Ephemeral voucher wallets
//!
//! Every voucher is bound to a throwaway secp256k1 key pair generated here.
//! The key exists to sign exactly one redemption transaction; it is never
//! reused and carries no funds beyond the gas it receives for that call.

use alloy_primitives::{Address, B256};
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid private key")]
    InvalidKey,
}

/// An ephemeral key pair plus its derived Ethereum address.
///
/// The address is computed once at construction and is immutable; it is the
/// unit of Merkle-tree membership.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    address: Address,
}

impl Wallet {
    /// Generate a wallet from OS randomness.
    ///
    /// Each call draws an independent scalar. Collisions across batches are
    /// cryptographically negligible, so no uniqueness bookkeeping is done.
    /// Panics only if the OS randomness source itself is unavailable.
    pub fn random() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let address = address_of(&signing_key);
        Self {
            signing_key,
            address,
        }
    }

    /// Restore a wallet from its 32-byte secret scalar, as stored in dumps
    /// and secrets.
    pub fn from_secret(secret: B256) -> Result<Self, WalletError> {
        let signing_key =
            SigningKey::from_slice(secret.as_slice()).map_err(|_| WalletError::InvalidKey)?;
        let address = address_of(&signing_key);
        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The raw secret scalar.
    pub fn secret(&self) -> B256 {
        B256::from_slice(&self.signing_key.to_bytes())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the key
        f.debug_struct("Wallet").field("address", &self.address).finish_non_exhaustive()
    }
}

/// Generate `count` fresh wallets in order.
pub fn generate_wallets(count: usize) -> Vec<Wallet> {
    (0..count).map(|_| Wallet::random()).collect()
}

/// Standard Ethereum address derivation:
/// `keccak256(uncompressed_pubkey[1..])[12..32]`.
fn address_of(key: &SigningKey) -> Address {
    let encoded = key.verifying_key().to_encoded_point(false);
    let hash = Keccak256::digest(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..32])
}
