//! Canonical serialization for deterministic hashing.
//!
//! Graph and policy fingerprints are xxh64 hashes over canonical JSON.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: Struct fields serialize in declaration order
//! - Stable Vec order: Vectors serialize in index order
//! - No HashMap allowed: Use BTreeMap for maps in hashed data
//! - Floats: quantize before hashing where equality below 1e-6 matters

use std::io;

use serde::Serialize;
use xxhash_rust::xxh64::{xxh64, Xxh64};

/// Serialize a value to canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// `io::Write` sink feeding an xxh64 state, so hashing never buffers the
/// whole document.
struct HashWriter(Xxh64);

impl io::Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compute canonical hash of a serializable value.
///
/// Serialization only fails for maps with non-string keys. If it does,
/// the failure is logged and the hash covers the bytes written so far.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let mut writer = HashWriter(Xxh64::new(0));
    if let Err(e) = serde_json::to_writer(&mut writer, value) {
        tracing::error!(error = %e, "canonical serialization failed");
    }
    writer.0.digest()
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Hash raw bytes with the same seed as [`canonical_hash`].
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    xxh64(bytes, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct TestEdge {
        approver: String,
        author: String,
        count: u32,
    }

    #[test]
    fn test_determinism() {
        let e = TestEdge {
            approver: "R".to_string(),
            author: "A".to_string(),
            count: 5,
        };
        assert_eq!(canonical_hash(&e), canonical_hash(&e));
    }

    #[test]
    fn test_streaming_hash_matches_buffered() {
        let e = TestEdge {
            approver: "R".to_string(),
            author: "A".to_string(),
            count: 5,
        };
        let bytes = to_canonical_bytes(&e).unwrap();
        assert_eq!(canonical_hash(&e), hash_bytes(&bytes));
    }

    #[test]
    fn test_btreemap_order_is_stable() {
        let mut a = BTreeMap::new();
        a.insert("zed", 1);
        a.insert("amy", 2);
        let mut b = BTreeMap::new();
        b.insert("amy", 2);
        b.insert("zed", 1);
        assert_eq!(canonical_hash_hex(&a), canonical_hash_hex(&b));
        assert_eq!(canonical_hash_hex(&a).len(), 16);
    }

    #[test]
    fn test_non_string_keys_rejected() {
        let mut m = BTreeMap::new();
        m.insert((1, 2), "pair");
        assert!(to_canonical_bytes(&m).is_err());
    }
}
