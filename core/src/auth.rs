use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a token string.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a presented key against a stored digest.
///
/// Both sides are hashed to fixed-length hex first, then compared without
/// early exit so the comparison time does not depend on the first mismatch.
pub fn verify_api_key(presented: &str, expected_hash: &str) -> bool {
    let presented_hash = hash_token(presented);
    if presented_hash.len() != expected_hash.len() {
        return false;
    }
    presented_hash
        .bytes()
        .zip(expected_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Short digest prefix for logging which key was presented. Never reveals
/// any characters of the key itself.
pub fn key_fingerprint(key: &str) -> String {
    let mut digest = hash_token(key);
    digest.truncate(8);
    digest
}
