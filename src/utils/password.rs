use crate::utils::ApiError;

/// Hash a plaintext password with bcrypt.
pub fn hash(plain: &str) -> Result<String, ApiError> {
    bcrypt::hash(plain, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal_error(format!("Password hashing failed: {}", e)))
}

/// Verify a plaintext password against a stored bcrypt digest.
/// A malformed digest counts as a mismatch.
pub fn verify(plain: &str, digest: &str) -> bool {
    bcrypt::verify(plain, digest).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let digest = hash("S3cret!pass").unwrap();
        assert!(verify("S3cret!pass", &digest));
        assert!(!verify("wrong-pass", &digest));
    }

    #[test]
    fn malformed_digest_is_a_mismatch() {
        assert!(!verify("anything", "not-a-bcrypt-digest"));
    }
}
