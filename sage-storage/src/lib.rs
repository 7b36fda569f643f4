//! ABOUTME: Vector Index Adapter: per-class collections over a persistent vector store
//! ABOUTME: Thin contract plus a concrete in-memory/snapshotted default backend

pub mod backends;
pub mod embedding;
pub mod traits;

pub use backends::InMemoryVectorIndex;
pub use embedding::{HashingEmbedder, QueryEmbedder};
pub use traits::{BatchInsertOutcome, IntegrityStatus, Result, VectorIndex, VectorIndexError};
