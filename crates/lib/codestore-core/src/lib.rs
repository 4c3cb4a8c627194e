//! Core types and services for codestore.
//!
//! This crate owns the repository ingestion walk, the source-host and
//! embedding clients, the `SurrealDB` backing store, and the control plane
//! that exposes the five codestore operations.

pub mod control;
pub mod embed;
pub mod ingest;
pub mod source;
pub mod store;
