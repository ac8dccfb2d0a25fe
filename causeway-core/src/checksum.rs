use sha2::{Digest, Sha256};

/// Calculate a SHA-256 hash of the given script content, as lowercase hex.
///
/// Line endings are normalized before hashing so the same logical script
/// hashes identically whether it was saved with LF or CRLF endings.
pub fn hash(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let content = "CREATE TABLE users (id SERIAL PRIMARY KEY);\n";
        assert_eq!(hash(content), hash(content));
    }

    #[test]
    fn test_hash_line_ending_normalization() {
        let unix = "line1\nline2\nline3";
        let windows = "line1\r\nline2\r\nline3";
        assert_eq!(hash(unix), hash(windows));
    }

    #[test]
    fn test_hash_different_content() {
        assert_ne!(hash("SELECT 1;"), hash("SELECT 2;"));
    }

    #[test]
    fn test_hash_is_fixed_length_hex() {
        let digest = hash("SELECT 1;");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_empty() {
        // SHA-256 of the empty string
        assert_eq!(
            hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
