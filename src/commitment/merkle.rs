use serde::{Deserialize, Serialize};

use crate::core::{
    types::Hash32,
    utils::{compute_sha256, compute_sha256_pair},
};

/// Balanced binary SHA256 tree over tile hashes.
///
/// Pairing rule: at every level an odd trailing node is paired with a copy of
/// itself, so `parent = SHA256(last || last)`. This rule is part of the
/// commitment contract; any implementation that reproduces it derives the
/// same root for the same leaves.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] are the leaves, levels.last() is the single root
    levels: Vec<Vec<Hash32>>,
}

/// Sibling path from one leaf up to the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    /// Index of the leaf this path authenticates
    pub leaf_index: u32,
    /// Sibling hash at each level, leaf level first
    pub siblings: Vec<Hash32>,
}

impl MerkleTree {
    /// Build a tree from leaf hashes. Empty input yields a single all-zero root.
    pub fn from_leaves(leaves: Vec<Hash32>) -> Self {
        if leaves.is_empty() {
            return Self {
                levels: vec![vec![[0u8; 32]]],
            };
        }

        let mut levels = vec![leaves];
        while levels.last().map(Vec::len).unwrap_or(0) > 1 {
            let current = levels.last().cloned().unwrap_or_default();
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let right = if pair.len() == 2 { &pair[1] } else { &pair[0] };
                next.push(compute_sha256_pair(&pair[0], right));
            }
            levels.push(next);
        }
        Self { levels }
    }

    /// Hash each tile buffer and build the tree
    pub fn from_tiles(tiles: &[Vec<u8>]) -> Self {
        let leaves: Vec<Hash32> = tiles.iter().map(|t| compute_sha256(t)).collect();
        Self::from_leaves(leaves)
    }

    pub fn root(&self) -> Hash32 {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or([0u8; 32])
    }

    /// Number of hashing levels above the leaves
    pub fn depth(&self) -> u32 {
        (self.levels.len() - 1) as u32
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn leaves(&self) -> &[Hash32] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sibling path for one leaf, or None if the index is out of range
    pub fn path(&self, leaf_index: u32) -> Option<MerklePath> {
        let mut index = leaf_index as usize;
        if index >= self.leaf_count() {
            return None;
        }

        let mut siblings = Vec::with_capacity(self.depth() as usize);
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = index ^ 1;
            // Odd trailing node: its sibling is itself
            let sibling = if sibling_index < level.len() {
                level[sibling_index]
            } else {
                level[index]
            };
            siblings.push(sibling);
            index /= 2;
        }
        Some(MerklePath {
            leaf_index,
            siblings,
        })
    }
}

impl MerklePath {
    /// Recompute the root from a leaf hash and compare against the expected root
    pub fn verify(&self, expected_root: &Hash32, leaf_hash: &Hash32) -> bool {
        let mut hash = *leaf_hash;
        let mut index = self.leaf_index as usize;
        for sibling in &self.siblings {
            hash = if index % 2 == 0 {
                compute_sha256_pair(&hash, sibling)
            } else {
                compute_sha256_pair(sibling, &hash)
            };
            index /= 2;
        }
        hash == *expected_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: u8) -> Vec<Hash32> {
        (0..n).map(|i| compute_sha256(&[i])).collect()
    }

    #[test]
    fn test_single_leaf_is_root() {
        let l = leaves(1);
        let tree = MerkleTree::from_leaves(l.clone());
        assert_eq!(tree.root(), l[0]);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_two_leaves() {
        let l = leaves(2);
        let tree = MerkleTree::from_leaves(l.clone());
        assert_eq!(tree.root(), compute_sha256_pair(&l[0], &l[1]));
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_odd_leaf_duplicates_last() {
        let l = leaves(3);
        let tree = MerkleTree::from_leaves(l.clone());
        let left = compute_sha256_pair(&l[0], &l[1]);
        let right = compute_sha256_pair(&l[2], &l[2]);
        assert_eq!(tree.root(), compute_sha256_pair(&left, &right));
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_power_of_two_depth() {
        let tree = MerkleTree::from_leaves(leaves(16));
        assert_eq!(tree.depth(), 4);
        assert_eq!(tree.leaf_count(), 16);
    }

    #[test]
    fn test_paths_verify_for_every_leaf() {
        for count in [1u8, 2, 3, 5, 8, 13] {
            let l = leaves(count);
            let tree = MerkleTree::from_leaves(l.clone());
            let root = tree.root();
            for (i, leaf) in l.iter().enumerate() {
                let path = tree.path(i as u32).unwrap();
                assert!(path.verify(&root, leaf), "leaf {} of {}", i, count);
            }
        }
    }

    #[test]
    fn test_wrong_leaf_fails_path() {
        let l = leaves(5);
        let tree = MerkleTree::from_leaves(l.clone());
        let path = tree.path(2).unwrap();
        let wrong = compute_sha256(b"tampered");
        assert!(!path.verify(&tree.root(), &wrong));
    }

    #[test]
    fn test_path_out_of_range() {
        let tree = MerkleTree::from_leaves(leaves(4));
        assert!(tree.path(4).is_none());
    }
}
