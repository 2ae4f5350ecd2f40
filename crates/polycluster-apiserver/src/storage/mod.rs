//! Storage implementations.

mod memory;

pub use memory::{InMemoryResourceStorage, InMemoryStorageFactory};
