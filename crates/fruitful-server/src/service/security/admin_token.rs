use std::fmt;
use std::sync::Arc;

/// Shared secret guarding the administrative routes.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminToken(Arc<str>);

impl AdminToken {
    /// Wraps `token`. Blank tokens are rejected.
    pub fn new(token: impl AsRef<str>) -> Option<Self> {
        let token = token.as_ref().trim();
        (!token.is_empty()).then(|| Self(Arc::from(token)))
    }

    /// Compares `candidate` against the token in time independent of where
    /// the first mismatch occurs.
    pub fn verify(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();

        if expected.len() != candidate.len() {
            return false;
        }

        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }
}

impl fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminToken(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_exact_match() {
        let token = AdminToken::new("s3cret");
        assert!(token.as_ref().is_some_and(|t| t.verify("s3cret")));
        assert!(token.as_ref().is_some_and(|t| !t.verify("s3cre")));
        assert!(token.as_ref().is_some_and(|t| !t.verify("S3cret")));
    }

    #[test]
    fn blank_tokens_are_rejected() {
        assert!(AdminToken::new("").is_none());
        assert!(AdminToken::new("   ").is_none());
    }

    #[test]
    fn debug_hides_secret() {
        let token = AdminToken::new("s3cret");
        assert!(!format!("{token:?}").contains("s3cret"));
    }
}
