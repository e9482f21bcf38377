//! Media storage infrastructure.
//!
//! Implements the `ObjectStore` trait from `huddle-core` on the local
//! filesystem. Stored files are served back under `/media`.

pub mod local;
