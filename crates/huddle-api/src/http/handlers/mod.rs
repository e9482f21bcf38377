//! HTTP request handlers for the REST API and the live channel.

pub mod auth;
pub mod chat;
pub mod group;
pub mod user;
pub mod ws;
