//! Live delivery: who is connected, and who hears about what.
//!
//! `router` tracks live connections per user and pushes events into their
//! bounded queues. `fanout` decides, per chat mutation, which users receive
//! which event.

pub mod fanout;
pub mod router;
