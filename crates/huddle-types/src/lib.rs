//! Shared domain types for Huddle.
//!
//! Users, direct and group chats, messages, live events, configuration and
//! the error types every layer speaks.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod media;
pub mod user;
