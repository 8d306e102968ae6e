//! In-memory store backend.
//!
//! Used by the test suite and by the CLI's `--memory` mode. Behaves like a
//! single Redis instance for the commands the cache issues.

mod store;

pub use store::MemoryStore;
