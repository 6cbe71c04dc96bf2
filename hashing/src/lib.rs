//! SHA-256 digests of chain objects.
//!
//! Objects are hashed over their `bincode` encoding. The encoding is only used for hashing and
//! size accounting, so its stability across `bincode` versions matters only within a single
//! build of the application.

use ethereum_types::H256;
use serde::Serialize;
use sha2::{Digest as _, Sha256};

#[inline]
#[must_use]
pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> H256 {
    H256(Sha256::digest(bytes).into())
}

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    H256(hasher.finalize().into())
}

/// Hashes the `bincode` encoding of `value` without buffering it.
#[must_use]
pub fn hash_serialized(value: &impl Serialize) -> H256 {
    let mut hasher = Sha256::new();

    // `Sha256` never fails to write and none of the hashed types contain unsized sequences.
    bincode::serialize_into(&mut hasher, value).expect("chain objects are always serializable");

    H256(hasher.finalize().into())
}

#[must_use]
pub fn serialized_size(value: &impl Serialize) -> u64 {
    bincode::serialized_size(value).expect("chain objects are always serializable")
}

/// Binary Merkle root where an odd node at any level is paired with itself.
///
/// The root of an empty list is [`H256::zero`].
#[must_use]
pub fn merkle_root(leaves: impl IntoIterator<Item = H256>) -> H256 {
    let mut level = leaves.into_iter().collect::<Vec<_>>();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(level[level.len() - 1]);
        }

        level = level
            .chunks_exact(2)
            .map(|pair| hash_256_256(pair[0], pair[1]))
            .collect();
    }

    level.pop().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use test_case::test_case;

    use super::*;

    #[test]
    fn hash_bytes_matches_known_digest() {
        assert_eq!(
            hash_bytes(b"abc"),
            H256(hex!(
                "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
            )),
        );
    }

    #[test]
    fn hash_256_256_of_zeros_matches_known_digest() {
        assert_eq!(
            hash_256_256(H256::zero(), H256::zero()),
            H256(hex!(
                "f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"
            )),
        );
    }

    #[test]
    fn hash_serialized_is_deterministic_and_content_sensitive() {
        assert_eq!(hash_serialized(&(1_u32, "a")), hash_serialized(&(1_u32, "a")));
        assert_ne!(hash_serialized(&(1_u32, "a")), hash_serialized(&(2_u32, "a")));
    }

    #[test]
    fn merkle_root_of_nothing_is_zero() {
        assert_eq!(merkle_root([]), H256::zero());
    }

    #[test]
    fn merkle_root_of_single_leaf_is_the_leaf() {
        let leaf = H256::repeat_byte(7);
        assert_eq!(merkle_root([leaf]), leaf);
    }

    #[test_case(2)]
    #[test_case(3)]
    #[test_case(5)]
    fn merkle_root_pairs_odd_nodes_with_themselves(leaf_count: u8) {
        let leaves = (1..=leaf_count).map(H256::repeat_byte).collect::<Vec<_>>();

        let mut padded = leaves.clone();
        if padded.len() % 2 == 1 {
            padded.push(padded[padded.len() - 1]);
        }

        let first_level = padded
            .chunks_exact(2)
            .map(|pair| hash_256_256(pair[0], pair[1]))
            .collect::<Vec<_>>();

        assert_eq!(merkle_root(leaves), merkle_root(first_level));
    }
}
