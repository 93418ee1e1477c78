//! botgrid-state — domain types and persistent bot state.
//!
//! Defines the `BotRecord` and its status machine, the wire envelopes
//! carried on the per-bot queues, the naming module (every derived
//! topic/group/workload/storage-key name is a pure function of the bot
//! id), and the `BotStore` trait with a Redis-backed implementation and
//! an in-memory implementation for testing.

pub mod error;
pub mod naming;
pub mod store;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{BotStore, MemoryStore, RedisStore};
pub use types::*;
