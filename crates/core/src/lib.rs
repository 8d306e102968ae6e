//! Pure building blocks for the recall cache.
//!
//! Nothing in this crate performs I/O. Key construction, argument records,
//! value serialization and the store contracts live here; the `recall` crate
//! wires them to a real store.

pub mod cache;
