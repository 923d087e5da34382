/// Number of hex characters kept from the digest in output filenames
pub const HASH_LENGTH: usize = 20;

/// Short content hash used for `[hash]` in output names
pub fn content_hash(content: &[u8]) -> String {
    let hex = blake3::hash(content).to_hex();
    hex.as_str()[..HASH_LENGTH].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_length_and_charset() {
        let hash = content_hash(b"body { color: red; }");
        assert_eq!(hash.len(), HASH_LENGTH);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(content_hash(b"same"), content_hash(b"same"));
        assert_ne!(content_hash(b"same"), content_hash(b"other"));
    }
}
