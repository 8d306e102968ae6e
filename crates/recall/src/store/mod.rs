//! Store backends.
//!
//! Each backend provides a [`Connector`](recall_core::cache::Connector) and a
//! [`StoreConnection`](recall_core::cache::StoreConnection). The in-memory
//! backend is always compiled; Redis is behind the `redis` feature.

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_impl;

pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use redis_impl::{RedisConnection, RedisConnector};
