/// Raw store record definitions.
pub mod models;
/// Replicated key/value graph abstraction and its in-memory replica.
pub mod shared_store;
/// Storage error types.
pub mod storage;
