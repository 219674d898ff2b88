//! Ligand diffusion environment for agent-based simulations.
//!
//! Concentration fields live on a padded 2D grid ([`field`]), are advanced by an
//! explicit diffusion-reaction stencil ([`stepper`]) after the ghost cells are
//! filled ([`boundary`]), and are read and perturbed by agents through bilinear
//! interpolation ([`coupling`]). [`Environment`] ties the pieces together.

pub mod boundary;
pub mod coupling;
pub mod emitter;
pub mod environment;
pub mod error;
pub mod field;
pub mod recorder;
pub mod registry;
pub mod stability;
pub mod stepper;

pub use boundary::BoundaryEngine;
pub use coupling::InterpolationPlan;
pub use environment::{Environment, SharedEnvironment};
pub use error::{EnvironmentError, Result};
pub use field::{ChannelView, FieldTensor, GridGeometry, InteriorView, BORDER_WIDTH};
pub use recorder::{FieldRecorder, OutputFormat, SnapshotRecorder};
pub use registry::LigandRegistry;
pub use stability::stable_timestep;
pub use stepper::{DiffusionStepper, ForwardEuler, UpdateRule, LAPLACIAN, STENCIL_RADIUS};

pub use diffusion_common::{BoundaryCondition, LigandConfig, LigandId, Vec2};
