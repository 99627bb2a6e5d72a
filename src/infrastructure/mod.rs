//! Adapters implementing the domain ports.

pub mod in_memory;
pub mod queue;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod sandbox;
pub mod signing;
