//! Error types for `polycluster-kernel`.
//!
//! [`ApiError`] covers failures of the wire-format capability (negotiation
//! and encoding).  [`StorageError`] is what a [`ResourceStorage`] reports
//! back to the request handler.
//!
//! [`ResourceStorage`]: super::capability::ResourceStorage

use thiserror::Error;

/// Serialization / negotiation failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// None of the media types in the `Accept` header can be produced.
    #[error("only the following media types are accepted: {supported}")]
    NotAcceptable { supported: String },

    /// The object could not be encoded.
    #[error("failed to encode object: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures reported by a storage capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    /// The requested object does not exist.
    #[error("{resource} \"{name}\" not found")]
    NotFound { resource: String, name: String },

    /// The storage backend does not implement this verb.
    #[error("verb '{0}' is not supported by this storage")]
    UnsupportedVerb(String),

    /// A label or field selector the storage cannot evaluate.
    #[error("unable to parse selector requirement '{0}'")]
    InvalidSelector(String),

    /// A storage instance could not be created for the resource.
    #[error("cannot create storage for {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn not_found(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            name: name.into(),
        }
    }
}
