//! Polycluster testing utilities
//!
//! Inventory builders, sample objects and instrumented storage factories
//! for exercising the API server without a real backing store.

pub mod fixtures;
pub mod storage;

pub use fixtures::{InventoryBuilder, deployment, pod, request};
pub use storage::{FailingStorageFactory, RecordingStorageFactory};
