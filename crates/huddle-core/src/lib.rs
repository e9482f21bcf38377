//! Conversation logic and repository trait definitions for Huddle.
//!
//! This crate defines the "ports" (repository and storage traits) that the
//! infrastructure layer implements, plus the services built on them: the
//! conversation manager, accounts, and live delivery. It depends only on
//! `huddle-types`, never on `huddle-infra` or any database crate.

pub mod live;
pub mod repository;
pub mod service;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
