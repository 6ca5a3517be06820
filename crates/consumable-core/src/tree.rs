//! Commitment tree over wallet addresses
//!
//! The tree commits a batch of wallet addresses to a single 32-byte root
//! that the verifying contract stores. Hashing must match the on-chain
//! verifier exactly:
//!
//! - leaf = `keccak256(keccak256(abi.encode(address)))`: the double-hashed
//!   single-field leaf of OpenZeppelin's standard tree, so a leaf preimage
//!   can never collide with an interior node
//! - interior = `keccak256(sorted(left, right))`: sorted-pair hashing, so a
//!   proof needs no left/right flags and verification is order-independent
//!   per pair
//!
//! Leaves keep the wallet order given at build time; an unpaired node is
//! promoted to the next level unchanged. The built tree is immutable.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Serialization format tag for [`TreeDump`]. Bump on any layout change.
const DUMP_FORMAT: u32 = 1;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Cannot build a tree with no leaves")]
    Empty,

    #[error("Address is not a leaf of this tree")]
    UnknownLeaf,

    #[error("Invalid dump: {0}")]
    InvalidDump(String),
}

/// Double-hashed single-field leaf for an address.
pub fn leaf_hash(address: Address) -> B256 {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    let inner: [u8; 32] = Keccak256::digest(word).into();
    let outer: [u8; 32] = Keccak256::digest(inner).into();
    B256::from(outer)
}

/// `keccak256(min(a,b) || max(a,b))`, matching the contract's proof step.
fn hash_pair(a: B256, b: B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let digest: [u8; 32] = Keccak256::new()
        .chain_update(lo)
        .chain_update(hi)
        .finalize()
        .into();
    B256::from(digest)
}

/// Merkle tree over a batch of wallet addresses.
pub struct CommitmentTree {
    /// `levels[0]` holds the leaves in build order; the last level holds
    /// exactly the root.
    levels: Vec<Vec<B256>>,
}

impl CommitmentTree {
    /// Build the tree for `addresses`, preserving their order.
    ///
    /// The root is deterministic for a fixed order; reordering the input
    /// changes the root, so the build order must travel with the dump.
    pub fn build(addresses: &[Address]) -> Result<Self, TreeError> {
        if addresses.is_empty() {
            return Err(TreeError::Empty);
        }

        let leaves: Vec<B256> = addresses.iter().map(|a| leaf_hash(*a)).collect();
        let mut levels = vec![leaves];

        while levels.last().expect("at least one level").len() > 1 {
            let prev = levels.last().expect("at least one level");
            let mut next = Vec::with_capacity(prev.len().div_ceil(2));
            for chunk in prev.chunks(2) {
                match chunk {
                    [left, right] => next.push(hash_pair(*left, *right)),
                    // unpaired node is promoted unchanged
                    [odd] => next.push(*odd),
                    _ => unreachable!("chunks(2) yields 1 or 2 nodes"),
                }
            }
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// The 32-byte commitment published to the verifying contract.
    pub fn root(&self) -> B256 {
        self.levels.last().expect("at least one level")[0]
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Sibling hashes from the address's leaf up to the root.
    ///
    /// The proof is sufficient for a sorted-pair verifier to recompute
    /// [`root`](Self::root); levels where the node was promoted contribute
    /// no step.
    pub fn proof(&self, address: Address) -> Result<Vec<B256>, TreeError> {
        let leaf = leaf_hash(address);
        let mut index = self.levels[0]
            .iter()
            .position(|l| *l == leaf)
            .ok_or(TreeError::UnknownLeaf)?;

        let mut path = Vec::new();
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = index ^ 1;
            if sibling < level.len() {
                path.push(level[sibling]);
            }
            index /= 2;
        }
        Ok(path)
    }

    /// Sorted-pair verification, mirroring the contract's check.
    pub fn verify(root: B256, address: Address, proof: &[B256]) -> bool {
        let mut acc = leaf_hash(address);
        for step in proof {
            acc = hash_pair(acc, *step);
        }
        acc == root
    }

    /// Serialize the full node layout. Restoring from the result reproduces
    /// the root and every proof byte-identically, without recomputation.
    pub fn dump(&self) -> TreeDump {
        TreeDump {
            format: DUMP_FORMAT,
            root: self.root(),
            levels: self.levels.clone(),
        }
    }

    /// Rebuild a tree from a [`TreeDump`], checking structural consistency.
    ///
    /// Hashes are taken as-is, since the dump is trusted operator data, but the
    /// shape is not: level sizes, the top level and the recorded root must
    /// all agree, otherwise this fails with [`TreeError::InvalidDump`].
    pub fn restore(dump: TreeDump) -> Result<Self, TreeError> {
        if dump.format != DUMP_FORMAT {
            return Err(TreeError::InvalidDump(format!(
                "unknown format {}",
                dump.format
            )));
        }
        if dump.levels.is_empty() || dump.levels[0].is_empty() {
            return Err(TreeError::InvalidDump("no leaves".into()));
        }
        for (depth, pair) in dump.levels.windows(2).enumerate() {
            let expected = pair[0].len().div_ceil(2);
            if pair[1].len() != expected {
                return Err(TreeError::InvalidDump(format!(
                    "level {} has {} nodes, expected {}",
                    depth + 1,
                    pair[1].len(),
                    expected
                )));
            }
        }
        let top = dump.levels.last().expect("levels is non-empty");
        if top.len() != 1 {
            return Err(TreeError::InvalidDump(format!(
                "top level holds {} nodes instead of the root",
                top.len()
            )));
        }
        if top[0] != dump.root {
            return Err(TreeError::InvalidDump(
                "recorded root does not match top level".into(),
            ));
        }
        Ok(Self {
            levels: dump.levels,
        })
    }
}

/// Owned, versioned serialization of a [`CommitmentTree`].
///
/// This layout is the stable wire format of the dump file; it deliberately
/// does not depend on any third-party tree library's internal form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeDump {
    pub format: u32,
    pub root: B256,
    pub levels: Vec<Vec<B256>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::generate_wallets;

    fn addresses(count: usize) -> Vec<Address> {
        generate_wallets(count).iter().map(|w| w.address()).collect()
    }

    #[test]
    fn test_build_is_deterministic() {
        let addrs = addresses(5);
        let a = CommitmentTree::build(&addrs).unwrap();
        let b = CommitmentTree::build(&addrs).unwrap();
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_order_changes_root() {
        let addrs = addresses(4);
        let mut reversed = addrs.clone();
        reversed.reverse();
        let a = CommitmentTree::build(&addrs).unwrap();
        let b = CommitmentTree::build(&reversed).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(matches!(
            CommitmentTree::build(&[]),
            Err(TreeError::Empty)
        ));
    }

    #[test]
    fn test_four_leaves_proof_shape() {
        let addrs = addresses(4);
        let tree = CommitmentTree::build(&addrs).unwrap();
        assert_ne!(tree.root(), B256::ZERO);
        let proof = tree.proof(addrs[2]).unwrap();
        assert_eq!(proof.len(), 2);
    }

    #[test]
    fn test_all_proofs_verify() {
        for count in [1usize, 2, 3, 4, 5, 8, 13] {
            let addrs = addresses(count);
            let tree = CommitmentTree::build(&addrs).unwrap();
            for addr in &addrs {
                let proof = tree.proof(*addr).unwrap();
                assert!(
                    CommitmentTree::verify(tree.root(), *addr, &proof),
                    "proof failed for batch of {count}"
                );
            }
        }
    }

    #[test]
    fn test_non_member_has_no_proof() {
        let addrs = addresses(4);
        let tree = CommitmentTree::build(&addrs).unwrap();

        let outsider = addresses(1)[0];
        assert!(matches!(tree.proof(outsider), Err(TreeError::UnknownLeaf)));

        // A member's proof does not verify for someone else's address
        let proof = tree.proof(addrs[0]).unwrap();
        assert!(!CommitmentTree::verify(tree.root(), outsider, &proof));
    }

    #[test]
    fn test_dump_round_trip() {
        let addrs = addresses(7);
        let tree = CommitmentTree::build(&addrs).unwrap();
        let restored = CommitmentTree::restore(tree.dump()).unwrap();

        assert_eq!(restored.root(), tree.root());
        assert_eq!(restored.leaf_count(), tree.leaf_count());
        for addr in &addrs {
            assert_eq!(restored.proof(*addr).unwrap(), tree.proof(*addr).unwrap());
        }
    }

    #[test]
    fn test_restore_rejects_bad_format() {
        let tree = CommitmentTree::build(&addresses(2)).unwrap();
        let mut dump = tree.dump();
        dump.format = 99;
        assert!(matches!(
            CommitmentTree::restore(dump),
            Err(TreeError::InvalidDump(_))
        ));
    }

    #[test]
    fn test_restore_rejects_inconsistent_levels() {
        let tree = CommitmentTree::build(&addresses(4)).unwrap();
        let mut dump = tree.dump();
        dump.levels[1].pop();
        assert!(matches!(
            CommitmentTree::restore(dump),
            Err(TreeError::InvalidDump(_))
        ));
    }

    #[test]
    fn test_restore_rejects_mismatched_root() {
        let tree = CommitmentTree::build(&addresses(4)).unwrap();
        let mut dump = tree.dump();
        dump.root = B256::repeat_byte(0xab);
        assert!(matches!(
            CommitmentTree::restore(dump),
            Err(TreeError::InvalidDump(_))
        ));
    }

    #[test]
    fn test_single_leaf_tree() {
        let addrs = addresses(1);
        let tree = CommitmentTree::build(&addrs).unwrap();
        assert_eq!(tree.root(), leaf_hash(addrs[0]));
        let proof = tree.proof(addrs[0]).unwrap();
        assert!(proof.is_empty());
        assert!(CommitmentTree::verify(tree.root(), addrs[0], &proof));
    }
}
