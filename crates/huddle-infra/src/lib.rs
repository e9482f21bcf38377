//! Infrastructure layer for Huddle.
//!
//! Contains implementations of the traits defined in `huddle-core`:
//! SQLite repositories, the local-disk object store, Argon2 credentials,
//! and the `config.toml` loader.

pub mod config;
pub mod crypto;
pub mod sqlite;
pub mod storage;
