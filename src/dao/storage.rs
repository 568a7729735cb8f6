use thiserror::Error;

/// Result alias for shared store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by shared store backends regardless of the replication layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The replica was shut down and no longer accepts reads or writes.
    #[error("shared store closed")]
    Closed,
    /// A path handed to the store is not addressable (empty segment, etc).
    #[error("invalid store path `{path}`")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },
    /// A value could not be encoded into a store record.
    #[error("failed to encode record for `{path}`")]
    Encode {
        /// Path the record was meant for.
        path: String,
        /// Underlying serializer error.
        #[source]
        source: serde_json::Error,
    },
}
