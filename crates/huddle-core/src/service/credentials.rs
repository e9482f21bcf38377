//! Credentials trait for password hashing and bearer token minting.
//!
//! Defined in huddle-core so the account service can hash and verify without
//! coupling to a specific algorithm. The Argon2/SHA-256 adapter lives in
//! huddle-infra.

/// Abstraction over password hashing and token generation.
pub trait Credentials: Send + Sync {
    /// Hash a plaintext password into a self-describing string (PHC format).
    fn hash_password(&self, password: &str) -> Result<String, String>;

    /// Check a plaintext password against a stored hash.
    ///
    /// A malformed stored hash verifies as `false`.
    fn verify_password(&self, password: &str, stored_hash: &str) -> bool;

    /// Mint a fresh random bearer token (plaintext).
    fn generate_token(&self) -> String;

    /// Digest of a plaintext token, as stored by the token repository.
    fn token_digest(&self, token: &str) -> String;
}
