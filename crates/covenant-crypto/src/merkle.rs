//! Merkle tree construction and inclusion proofs for periodic audit-chain
//! anchoring (§4.5). Internal nodes combine two children by sorting their
//! byte representations before concatenating, so a proof needs no
//! left/right side annotation: `combine(a, b) == combine(b, a)`. An odd
//! trailing leaf at any level is duplicated to complete the pairing.

use crate::hash::sha256_bytes;

fn combine(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 64];
    if a <= b {
        buf[..32].copy_from_slice(a);
        buf[32..].copy_from_slice(b);
    } else {
        buf[..32].copy_from_slice(b);
        buf[32..].copy_from_slice(a);
    }
    sha256_bytes(&buf)
}

fn leaf_hash(data: &[u8]) -> [u8; 32] {
    sha256_bytes(data)
}

/// A Merkle tree built bottom-up over a fixed set of already-hashed
/// leaves (receipt hashes).
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Builds a tree whose leaves are the receipt hashes themselves
    /// (already SHA-256 digests) rather than re-hashed raw bytes, per
    /// §4.5: the Merkle root anchors receipt hashes directly.
    pub fn build_from_hashes(leaves: &[[u8; 32]]) -> Self {
        assert!(!leaves.is_empty(), "cannot build a Merkle tree over zero leaves");
        let mut levels = vec![leaves.to_vec()];
        while levels.last().unwrap().len() > 1 {
            let current = levels.last().unwrap();
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                let hash = if pair.len() == 2 {
                    combine(&pair[0], &pair[1])
                } else {
                    combine(&pair[0], &pair[0])
                };
                next.push(hash);
            }
            levels.push(next);
        }
        Self { levels }
    }

    pub fn build(leaves: &[Vec<u8>]) -> Self {
        let hashed: Vec<[u8; 32]> = leaves.iter().map(|l| leaf_hash(l)).collect();
        Self::build_from_hashes(&hashed)
    }

    pub fn root(&self) -> [u8; 32] {
        self.levels.last().unwrap()[0]
    }

    pub fn root_hex(&self) -> String {
        hex::encode(self.root())
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// The sibling hash at each level from `leaf_index` up to the root.
    pub fn proof(&self, leaf_index: usize) -> Option<Vec<[u8; 32]>> {
        if leaf_index >= self.leaf_count() {
            return None;
        }
        let mut path = Vec::new();
        let mut index = leaf_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
            let sibling = if sibling_index < level.len() {
                level[sibling_index]
            } else {
                level[index]
            };
            path.push(sibling);
            index /= 2;
        }
        Some(path)
    }
}

/// Recomputes the root from a leaf hash and its sibling path, returning
/// whether it matches `expected_root`. The leaf passed in is already a
/// hash (a receipt hash), matching [`MerkleTree::build_from_hashes`].
pub fn verify_inclusion(leaf_hash: &[u8; 32], proof: &[[u8; 32]], expected_root: &[u8; 32]) -> bool {
    let mut current = *leaf_hash;
    for sibling in proof {
        current = combine(&current, sibling);
    }
    &current == expected_root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_leaf_root_is_its_own_hash() {
        let leaf = leaf_hash(b"only");
        let tree = MerkleTree::build_from_hashes(&[leaf]);
        assert_eq!(tree.root(), leaf);
    }

    #[test]
    fn proof_verifies_for_every_leaf_with_odd_count() {
        let leaves: Vec<[u8; 32]> = (0..5).map(|i| leaf_hash(format!("receipt-{i}").as_bytes())).collect();
        let tree = MerkleTree::build_from_hashes(&leaves);
        let root = tree.root();
        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(verify_inclusion(leaf, &proof, &root));
        }
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let leaves: Vec<[u8; 32]> = (0..4).map(|i| leaf_hash(format!("receipt-{i}").as_bytes())).collect();
        let tree = MerkleTree::build_from_hashes(&leaves);
        let root = tree.root();
        let proof = tree.proof(0).unwrap();
        let tampered = leaf_hash(b"tampered");
        assert!(!verify_inclusion(&tampered, &proof, &root));
    }

    #[test]
    fn combine_is_order_independent() {
        let a = leaf_hash(b"a");
        let b = leaf_hash(b"b");
        assert_eq!(combine(&a, &b), combine(&b, &a));
    }
}
