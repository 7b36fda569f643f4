//! ABOUTME: Local (in-process) Model Adapter implementations

mod simulated;

pub use simulated::SimulatedModelAdapter;
