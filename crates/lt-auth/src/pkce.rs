use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// Characters allowed in a code verifier (RFC 7636 unreserved set)
const VERIFIER_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of the generated code verifier
const VERIFIER_LEN: usize = 128;

/// A PKCE verifier/challenge pair
///
/// Generated fresh for every authentication attempt and never persisted.
#[derive(Clone)]
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    /// Generate a new pair with a random 128-character verifier
    pub fn generate() -> Self {
        let mut bytes = [0u8; VERIFIER_LEN];
        getrandom::fill(&mut bytes).expect("operating system RNG");

        let verifier: String = bytes
            .iter()
            .map(|b| VERIFIER_ALPHABET[*b as usize % VERIFIER_ALPHABET.len()] as char)
            .collect();

        let challenge = Self::challenge_for(&verifier);
        Self { verifier, challenge }
    }

    /// S256 challenge: base64url(SHA-256(verifier)) without padding
    fn challenge_for(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"[REDACTED]")
            .field("challenge", &self.challenge)
            .finish()
    }
}
