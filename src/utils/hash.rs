//! Content hashing.

/// 64-bit content fingerprint (first 8 bytes of the blake3 digest).
pub fn compute(data: &[u8]) -> u64 {
    let digest = blake3::hash(data);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_is_stable_and_content_sensitive() {
        assert_eq!(compute(b"port = 1"), compute(b"port = 1"));
        assert_ne!(compute(b"port = 1"), compute(b"port = 2"));
    }
}
