//! Store interfaces and `SurrealDB` implementation.
//!
//! The store layer persists code files with their embeddings and answers
//! the filtered and similarity-ranked reads.

pub mod surreal;

pub use surreal::{StoreError, StoreResult, SurrealCodeStore};
