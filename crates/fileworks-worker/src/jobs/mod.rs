//! Built-in job handler implementations.

pub mod process_file;

pub use process_file::ProcessFileJobHandler;
