//! # fileworks-core
//!
//! Core crate for FileWorks. Contains configuration schemas, typed
//! identifiers, pagination types, the storage provider trait, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other FileWorks crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
