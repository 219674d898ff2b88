pub mod config;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{BoundaryCondition, EmitterConfig, EnvironmentConfig, GridConfig, LigandConfig, LigandId, OutputConfig, TimingConfig};
pub use snapshot::{FieldSnapshot, GridMetadata, RecordedRun};
pub use vecmath::Vec2;
