//! Storage models and schema helpers for codestore.
//!
//! This crate defines the canonical code-file record shared by the ingest
//! walk, the control plane, and the storage backend.

pub mod models;
pub mod schema;

pub use models::*;
