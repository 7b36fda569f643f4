//! ABOUTME: Concrete VectorIndex backends

pub mod memory;

pub use memory::InMemoryVectorIndex;
