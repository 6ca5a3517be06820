//! Durable batch record
//!
//! The dump is the operator-held source of truth for one generated batch:
//! the serialized tree plus every private key, in build order. Secrets are
//! derived from it and funding reads it; it is never handed to redeemers.

use std::fs;
use std::path::Path;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::{CommitmentTree, TreeDump, TreeError};
use crate::wallet::Wallet;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid dump: {0}")]
    Malformed(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Invalid private key at index {0}")]
    Key(usize),
}

/// On-disk batch record: `{"tree": {...}, "pks": ["0x...", ...]}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchDump {
    pub tree: TreeDump,
    pub pks: Vec<B256>,
}

impl BatchDump {
    /// Capture a freshly built batch. Key order is the tree's leaf order
    /// and must stay that way; the root depends on it.
    pub fn capture(tree: &CommitmentTree, wallets: &[Wallet]) -> Self {
        Self {
            tree: tree.dump(),
            pks: wallets.iter().map(|w| w.secret()).collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), DumpError> {
        let json = serde_json::to_string(self).map_err(|e| DumpError::Malformed(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, DumpError> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| DumpError::Malformed(e.to_string()))
    }

    /// Rebuild the tree and wallets without recomputing any hashes.
    ///
    /// Fails if the key count disagrees with the leaf count or a restored
    /// wallet's address is missing from the tree; either means the dump
    /// was edited or mixed between batches.
    pub fn restore(&self) -> Result<(CommitmentTree, Vec<Wallet>), DumpError> {
        let tree = CommitmentTree::restore(self.tree.clone())?;
        if self.pks.len() != tree.leaf_count() {
            return Err(DumpError::Malformed(format!(
                "{} keys for {} leaves",
                self.pks.len(),
                tree.leaf_count()
            )));
        }

        let mut wallets = Vec::with_capacity(self.pks.len());
        for (index, pk) in self.pks.iter().enumerate() {
            let wallet = Wallet::from_secret(*pk).map_err(|_| DumpError::Key(index))?;
            if tree.proof(wallet.address()).is_err() {
                return Err(DumpError::Malformed(format!(
                    "wallet {index} is not a leaf of the tree"
                )));
            }
            wallets.push(wallet);
        }

        Ok((tree, wallets))
    }
}
