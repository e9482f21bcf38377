//! Business logic services (use cases).
//!
//! Services orchestrate repository calls, object storage and business rules.
//! They depend on traits (ports), never on concrete infrastructure
//! implementations.

pub mod account;
pub mod conversation;
pub mod credentials;
pub mod media;
