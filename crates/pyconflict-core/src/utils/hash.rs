//! Blake3 hashing utilities.
//!
//! Cache entries are stored under the hash of their logical key, so keys of
//! any length or character set map to safe file names.

/// Compute Blake3 hash of data
pub fn blake3_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex().to_string()
}

/// File-name-safe digest of a logical cache key
pub fn cache_key(key: &str) -> String {
    blake3_hash(key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_hash() {
        let data = b"hello world";
        let hash = blake3_hash(data);

        assert_eq!(hash.len(), 64); // 32 bytes = 64 hex chars
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, blake3_hash(data));
    }

    #[test]
    fn test_cache_key_distinguishes_keys() {
        let a = cache_key("package:django:latest");
        let b = cache_key("package:django:3.2.0");
        assert_ne!(a, b);
        assert_eq!(a, cache_key("package:django:latest"));
        assert!(!a.contains(':'));
    }
}
