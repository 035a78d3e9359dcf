//! eoflow Store - Byte storage adapters
//!
//! This crate provides implementations of the `ByteStore` port for the local
//! filesystem and for in-memory use in tests.

pub mod local;
pub mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;
