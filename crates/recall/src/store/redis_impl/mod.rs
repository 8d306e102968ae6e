//! Redis store backend.
//!
//! Uses the redis crate's `ConnectionManager`, which multiplexes concurrent
//! requests over a single connection.

mod connection;
mod error;

pub use connection::{RedisConnection, RedisConnector};
