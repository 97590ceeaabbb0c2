//! # fileworks-entity
//!
//! Domain entity models for FileWorks: uploaded file records with their
//! processing status, and background jobs with their payloads, states,
//! leases, and retry policies. All entities derive `Debug`, `Clone`,
//! `Serialize`, and `Deserialize`.

pub mod file;
pub mod job;
