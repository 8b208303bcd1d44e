//! Core data models for the chunked object store.
//!
//! `ObjectRecord` maps cleanly to the metadata table of either backend via
//! `sqlx::FromRow` and serializes naturally as JSON via `serde`.

pub mod object_record;
pub mod progress;
