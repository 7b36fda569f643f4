//! ABOUTME: The Model Adapter abstraction over a single quantized generative model handle

mod abstraction;
mod error;
mod local;
mod params;

pub use abstraction::{ModelAdapter, ModelCapabilities, TokenStream};
pub use error::{ModelError, Result};
pub use local::SimulatedModelAdapter;
pub use params::GenerationParams;
