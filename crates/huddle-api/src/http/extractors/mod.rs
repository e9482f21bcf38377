//! Request extractors: bearer-token authentication, JSON-or-multipart bodies
//! and query strings.

pub mod auth;
pub mod payload;
pub mod query;
