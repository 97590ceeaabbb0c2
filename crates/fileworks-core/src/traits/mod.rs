//! Core traits defined in `fileworks-core` and implemented by other crates.

pub mod storage;

pub use storage::StorageProvider;
