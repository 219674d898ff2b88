//! The environment facade: registry, padded field, boundary engine and stepper behind one owner.

use crate::boundary::BoundaryEngine;
use crate::coupling::{self, InterpolationPlan};
use crate::error::{EnvironmentError, Result};
use crate::field::{ChannelView, FieldTensor, GridGeometry, InteriorView};
use crate::registry::LigandRegistry;
use crate::stability;
use crate::stepper::{DiffusionStepper, UpdateRule};
use diffusion_common::{
    BoundaryCondition, EnvironmentConfig, FieldSnapshot, GridConfig, GridMetadata, LigandConfig, LigandId,
    RecordedRun, Vec2,
};
use log::{debug, info, trace};
use std::sync::{Arc, RwLock};

/// An environment shared by several agent populations.
///
/// Writers (`step`, `scatter_add`) take the write lock, so overlapping scatters
/// are serialized and every contribution is summed.
pub type SharedEnvironment = Arc<RwLock<Environment>>;

/// Ligand concentration fields on a padded 2D grid, advanced by explicit
/// diffusion-reaction steps and read or perturbed by agents in between.
#[derive(Debug)]
pub struct Environment {
    registry: LigandRegistry,
    field: FieldTensor,
    boundary: BoundaryEngine,
    stepper: DiffusionStepper,
    /// Physical size as configured, `[x, y]`.
    dimensions: [f64; 2],
    tick: u64,
    time: f64,
}

impl Environment {
    /// Builds the environment; each channel starts at its ligand's initial concentration.
    pub fn new(grid: &GridConfig, ligands: Vec<LigandConfig>) -> Result<Self> {
        for ligand in &ligands {
            if !(ligand.diffusion_coefficient >= 0.0) || !ligand.diffusion_coefficient.is_finite() {
                return Err(EnvironmentError::InvalidConfig(format!(
                    "ligand {} has invalid diffusion coefficient {}",
                    ligand.id, ligand.diffusion_coefficient
                )));
            }
            if !(ligand.degradation_rate >= 0.0) || !ligand.degradation_rate.is_finite() {
                return Err(EnvironmentError::InvalidConfig(format!(
                    "ligand {} has invalid degradation rate {}",
                    ligand.id, ligand.degradation_rate
                )));
            }
        }

        let registry = LigandRegistry::build(ligands)?;
        let geometry = GridGeometry::new(grid.dimensions, grid.resolution, registry.len())?;
        let initial: Vec<f64> = registry.ligands().iter().map(|l| l.initial_concentration).collect();
        let field = FieldTensor::new(geometry, &initial)?;
        let boundary = BoundaryEngine::new(grid.boundary, grid.resolution);
        let stepper = DiffusionStepper::new(registry.ligands(), grid.resolution);

        info!(
            "Environment grid {}x{} interior cells (+{} ghost border), resolution {}, {} ligand(s), boundary {:?}.",
            geometry.interior_rows(),
            geometry.interior_cols(),
            crate::field::BORDER_WIDTH,
            grid.resolution,
            registry.len(),
            grid.boundary
        );

        Ok(Self {
            registry,
            field,
            boundary,
            stepper,
            dimensions: grid.dimensions,
            tick: 0,
            time: 0.0,
        })
    }

    pub fn from_config(config: &EnvironmentConfig) -> Result<Self> {
        Self::new(&config.grid, config.ligands.clone())
    }

    /// Rebuilds an environment from a recorded run, restoring the latest
    /// snapshot of every ligand and the clock of the newest one.
    pub fn from_recorded(run: &RecordedRun) -> Result<Self> {
        let metadata = &run.metadata;
        let grid = GridConfig {
            dimensions: metadata.dimensions,
            resolution: metadata.resolution,
            boundary: metadata.boundary,
        };
        let mut env = Self::new(&grid, metadata.ligands.clone())?;
        for snapshot in run.latest() {
            env.restore_field(snapshot.ligand_id, &snapshot.values)?;
            if snapshot.tick >= env.tick {
                env.tick = snapshot.tick;
                env.time = snapshot.time;
            }
        }
        debug!("Restored environment at tick {} (t = {:.4}).", env.tick, env.time);
        Ok(env)
    }

    /// Replaces the arithmetic update applied after the rates are computed.
    pub fn with_update_rule(mut self, rule: Box<dyn UpdateRule>) -> Self {
        self.stepper.set_update_rule(rule);
        self
    }

    pub fn into_shared(self) -> SharedEnvironment {
        Arc::new(RwLock::new(self))
    }

    /// Advances every channel by `dt`.
    ///
    /// `dt` is not checked against [`Self::stable_timestep`]; exceeding it makes
    /// the field diverge without any error being raised.
    pub fn step(&mut self, dt: f64) {
        self.stepper.step(&mut self.field, &self.boundary, dt);
        self.tick += 1;
        self.time += dt;
        trace!("Tick {} done (t = {:.6}).", self.tick, self.time);
    }

    /// Refreshes the ghost cells from the current interior without stepping.
    pub fn apply_boundary(&mut self) {
        self.boundary.apply(&mut self.field);
    }

    pub fn lookup(&self, id: LigandId) -> Result<usize> {
        self.registry.lookup(id)
    }

    pub fn lookup_many(&self, ids: &[LigandId]) -> Result<Vec<usize>> {
        self.registry.lookup_many(ids)
    }

    pub fn registry(&self) -> &LigandRegistry {
        &self.registry
    }

    pub fn ligands(&self) -> &[LigandConfig] {
        self.registry.ligands()
    }

    pub fn interior_view(&self) -> InteriorView<'_> {
        self.field.interior_view()
    }

    /// Interior of the channel belonging to `id`.
    pub fn field_of(&self, id: LigandId) -> Result<ChannelView<'_>> {
        let index = self.registry.lookup(id)?;
        self.field
            .interior_view()
            .channel(index)
            .ok_or(EnvironmentError::LigandIndexOutOfRange { index, count: self.registry.len() })
    }

    /// Overwrites the interior of ligand `id` from row-major data, e.g. a checkpoint.
    pub fn restore_field(&mut self, id: LigandId, values: &[f64]) -> Result<()> {
        let index = self.registry.lookup(id)?;
        self.field.set_interior(index, values)
    }

    pub fn plan(&self, positions: &[Vec2]) -> Result<InterpolationPlan> {
        InterpolationPlan::new(self.field.geometry(), positions)
    }

    pub fn sample(&self, positions: &[Vec2], ligands: &[usize]) -> Result<Vec<f64>> {
        coupling::sample(&self.field, positions, ligands)
    }

    pub fn sample_with(&self, plan: &InterpolationPlan, ligands: &[usize]) -> Result<Vec<f64>> {
        coupling::sample_with(&self.field, plan, ligands)
    }

    pub fn sample_all(&self, plan: &InterpolationPlan, ligands: &[usize]) -> Result<Vec<Vec<f64>>> {
        coupling::sample_all(&self.field, plan, ligands)
    }

    pub fn scatter_add(&mut self, deltas: &[f64], positions: &[Vec2], ligands: &[usize]) -> Result<()> {
        coupling::scatter_add(&mut self.field, deltas, positions, ligands)
    }

    pub fn scatter_add_with(&mut self, plan: &InterpolationPlan, deltas: &[f64], ligands: &[usize]) -> Result<()> {
        coupling::scatter_add_with(&mut self.field, plan, deltas, ligands)
    }

    /// Largest step for which the explicit update stays bounded. Advisory only.
    pub fn stable_timestep(&self) -> f64 {
        stability::stable_timestep_for(self.field.geometry().resolution, self.registry.ligands())
    }

    /// Physical extent of the interior as `[x, y]`.
    pub fn size(&self) -> [f64; 2] {
        self.field.geometry().physical_size()
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.field.geometry()
    }

    pub fn boundary_condition(&self) -> &BoundaryCondition {
        self.boundary.condition()
    }

    pub fn field(&self) -> &FieldTensor {
        &self.field
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Setup description for the persistence collaborator.
    pub fn metadata(&self, dt: f64) -> GridMetadata {
        let geometry = self.field.geometry();
        GridMetadata {
            dt,
            resolution: geometry.resolution,
            boundary: *self.boundary.condition(),
            dimensions: self.dimensions,
            rows: geometry.interior_rows(),
            cols: geometry.interior_cols(),
            ligands: self.registry.ligands().to_vec(),
        }
    }

    /// One interior snapshot per ligand at the current time.
    pub fn snapshots(&self) -> Vec<FieldSnapshot> {
        let view = self.field.interior_view();
        let (rows, cols, _) = view.shape();
        self.registry
            .ligands()
            .iter()
            .enumerate()
            .filter_map(|(index, ligand)| {
                view.channel(index).map(|channel| FieldSnapshot {
                    time: self.time,
                    tick: self.tick,
                    ligand_id: ligand.id,
                    name: ligand.name.clone(),
                    rows,
                    cols,
                    values: channel.to_vec(),
                })
            })
            .collect()
    }
}
