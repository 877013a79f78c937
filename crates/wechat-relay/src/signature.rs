use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Computes the signature WeChat attaches to every callback.
///
/// The token, timestamp and nonce are sorted lexicographically, concatenated,
/// and hashed with SHA-1. The result is lowercase hex.
pub fn sign(token: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [token, timestamp, nonce];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Verifies a callback signature using constant-time comparison.
///
/// Comparison is case-sensitive: an uppercase hex signature does not match.
pub fn verify(token: &str, signature: &str, timestamp: &str, nonce: &str) -> bool {
    let expected = sign(token, timestamp, nonce);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}
