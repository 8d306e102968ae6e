//! Remember/forget caching over a key-value store.
//!
//! - [`client::StoreClient`] owns the store connection, its startup and lazy
//!   reconnect, and bounds every primitive with a timeout
//! - [`remember::RememberCache`] is the compute-or-fetch cache with group
//!   invalidation (`forget_all`, `forget_search`)
//! - [`repository::RepositoryCache`] derives keys from arguments for the
//!   common "fetch by id columns" case
//!
//! Key construction lives in `recall_core::cache`.

pub mod client;
pub mod config;
mod forget;
pub mod remember;
pub mod repository;
pub mod store;

#[cfg(test)]
mod testing;

pub use client::{ConnectionState, StoreClient};
pub use config::Config;
pub use remember::RememberCache;
pub use repository::RepositoryCache;
