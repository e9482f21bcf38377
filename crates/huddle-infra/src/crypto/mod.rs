//! Cryptographic operations for Huddle.
//!
//! - `credentials`: Argon2id password hashing, random bearer tokens and
//!   their SHA-256 digests

pub mod credentials;
