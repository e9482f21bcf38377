//! Storage abstractions for Huddle media.
//!
//! Defines the object store trait and the staged-upload handle.
//! Implementations live in huddle-infra.

pub mod object_store;
pub mod staged;
