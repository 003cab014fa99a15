//! Content hashing with xxh3.

use xxhash_rust::xxh3::xxh3_64;

/// Hash file content for the `files.content_hash` column.
pub fn hash_content(content: &[u8]) -> u64 {
    xxh3_64(content)
}

/// Hex form stored in the database.
pub fn hash_hex(content: &[u8]) -> String {
    format!("{:016x}", hash_content(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_and_distinct() {
        assert_eq!(hash_hex(b"abc"), hash_hex(b"abc"));
        assert_ne!(hash_hex(b"abc"), hash_hex(b"abd"));
        assert_eq!(hash_hex(b"abc").len(), 16);
    }
}
