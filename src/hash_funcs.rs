//! Reference hash and equality functions to plug into [`HashTable::new`].
//!
//! The string and integer hashes are the xor variant of djb2: starting from
//! 5381, each byte is folded in with `h = h * 33 ^ byte`. They are
//! deterministic across runs and platforms, which keeps bucket routing
//! reproducible in dumps and tests.
//!
//! [`HashTable::new`]: crate::HashTable::new

use core::hash::{BuildHasher, Hash};

const DJB_SEED: u32 = 5381;

#[inline]
fn djb2_xor(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(DJB_SEED, |h, &b| (h << 5).wrapping_add(h) ^ u32::from(b))
}

/// Hash of a 32-bit integer key, over its little-endian bytes.
pub fn hash_i32(key: &i32) -> u32 {
    djb2_xor(&key.to_le_bytes())
}

pub fn equal_i32(a: &i32, b: &i32) -> bool {
    a == b
}

/// Hash of a string key over its UTF-8 bytes.
pub fn hash_string<S: AsRef<str> + ?Sized>(key: &S) -> u32 {
    djb2_xor(key.as_ref().as_bytes())
}

/// Byte-wise string equality.
pub fn equal_string<S: AsRef<str> + ?Sized>(a: &S, b: &S) -> bool {
    a.as_ref().as_bytes() == b.as_ref().as_bytes()
}

/// Hash `key` with a standard [`BuildHasher`], folded to the 32 bits the
/// table routes on.
#[inline]
pub fn hash_with<S, K>(build: &S, key: &K) -> u32
where
    S: BuildHasher,
    K: Hash + ?Sized,
{
    let h = build.hash_one(key);
    (h ^ (h >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_hash_matches_hand_computed_values() {
        assert_eq!(hash_string(""), 5381);
        // 5381 * 33 ^ 'a'
        assert_eq!(hash_string("a"), (5381u32 * 33) ^ 97);
        let ab = ((5381u32 * 33) ^ 97).wrapping_mul(33) ^ 98;
        assert_eq!(hash_string("ab"), ab);
    }

    #[test]
    fn string_hash_is_the_same_for_owned_and_borrowed() {
        let owned = String::from("ghi");
        assert_eq!(hash_string(&owned), hash_string("ghi"));
        assert!(equal_string(&owned, &String::from("ghi")));
        assert!(!equal_string("ghi", "gh"));
    }

    #[test]
    fn int_hash_is_deterministic_and_spreads_small_keys() {
        assert_eq!(hash_i32(&42), hash_i32(&42));
        let hashes: std::collections::BTreeSet<u32> = (0..100).map(|i| hash_i32(&i)).collect();
        assert_eq!(hashes.len(), 100);
        assert!(equal_i32(&-1, &-1));
        assert!(!equal_i32(&1, &2));
    }

    #[test]
    fn hash_with_is_stable_for_one_builder() {
        let build = hashbrown::hash_map::DefaultHashBuilder::default();
        assert_eq!(hash_with(&build, "k"), hash_with(&build, "k"));
    }
}
