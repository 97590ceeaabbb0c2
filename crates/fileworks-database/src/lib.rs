//! # fileworks-database
//!
//! SQLite connection management, embedded migrations, and the concrete
//! repositories backing the job queue and the file record store.

pub mod connection;
pub mod error;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use error::JobStoreError;
