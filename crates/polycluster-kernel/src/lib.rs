//! `polycluster-kernel` — discovery types and capability contracts for the
//! multi-cluster aggregated API server.
//!
//! See [`apis`] for the module map.

// aggregated api contract
pub mod apis;
pub use apis::*;
