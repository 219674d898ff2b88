use serde::{Deserialize, Serialize};
use anyhow::Result;
use std::path::Path;

/// External identifier of a ligand, as used by configuration and collaborators.
pub type LigandId = u32;

/// Boundary policy for the ghost cells surrounding the grid.
///
/// Edge parameters are named after the physical axes: `x` runs along the
/// columns, `y` along the rows.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BoundaryCondition {
    /// Border cells mirror the opposite interior edge (wrap-around).
    Periodic,
    /// Fixed outward flux per edge; border = adjacent interior - resolution * flux.
    Neumann {
        #[serde(default)]
        x_neg: f64,
        #[serde(default)]
        x_pos: f64,
        #[serde(default)]
        y_neg: f64,
        #[serde(default)]
        y_pos: f64,
    },
    /// Fixed boundary value per edge; border = 2 * value - adjacent interior.
    Dirichlet {
        #[serde(default)]
        x_neg: f64,
        #[serde(default)]
        x_pos: f64,
        #[serde(default)]
        y_neg: f64,
        #[serde(default)]
        y_pos: f64,
    },
}

impl Default for BoundaryCondition {
    fn default() -> Self {
        BoundaryCondition::Periodic
    }
}

// Configuration for the spatial domain
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    /// Physical size as `[x, y]`. The engine stores rows along y and columns along x.
    pub dimensions: [f64; 2],
    /// Physical edge length of one grid cell.
    pub resolution: f64,
    #[serde(default)]
    pub boundary: BoundaryCondition,
}

/// A diffusible chemical species. Immutable once registered with an environment.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LigandConfig {
    pub id: LigandId,
    pub name: String,
    pub initial_concentration: f64,
    pub diffusion_coefficient: f64,
    #[serde(default)]
    pub production_rate: f64,
    #[serde(default)]
    pub degradation_rate: f64,
}

impl LigandConfig {
    pub fn new(id: LigandId, name: impl Into<String>, initial_concentration: f64, diffusion_coefficient: f64) -> Self {
        Self {
            id,
            name: name.into(),
            initial_concentration,
            diffusion_coefficient,
            production_rate: 0.0,
            degradation_rate: 0.0,
        }
    }

    pub fn with_reaction(mut self, production_rate: f64, degradation_rate: f64) -> Self {
        self.production_rate = production_rate;
        self.degradation_rate = degradation_rate;
        self
    }
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    /// Explicit step size. When absent the driver uses the stable time step.
    #[serde(default)]
    pub dt: Option<f64>,
    pub total_time: f64,
    pub record_interval: f64,
}

/// Point source driven by the driver through the coupling layer.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EmitterConfig {
    pub ligand_id: LigandId,
    /// Amount added per unit time at each emitter position (negative consumes).
    pub rate: f64,
    /// Fixed position `[x, y]`. Ignored when `count` is set.
    #[serde(default)]
    pub position: Option<[f64; 2]>,
    /// Number of emitters placed uniformly at random.
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub seed: u64,
    /// Standard deviation of a Gaussian random walk applied every tick (0 = static).
    #[serde(default)]
    pub jitter: f64,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_stats: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    #[serde(default)]
    pub save_final_fields: bool,
}

// Main environment configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EnvironmentConfig {
    pub grid: GridConfig,
    pub ligands: Vec<LigandConfig>,
    pub timing: TimingConfig,
    #[serde(default)]
    pub emitters: Vec<EmitterConfig>,
    pub output: OutputConfig,
}

impl EnvironmentConfig {
    /// Loads the environment configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EnvironmentConfig = toml::from_str(text)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the constraints the engine relies on at construction.
    pub fn validate(&self) -> Result<()> {
        if !(self.grid.resolution > 0.0) || !self.grid.resolution.is_finite() {
            anyhow::bail!("resolution must be positive and finite.");
        }
        if self.grid.dimensions.iter().any(|d| !(*d > 0.0) || !d.is_finite()) {
            anyhow::bail!("grid dimensions must be positive and finite.");
        }
        if self.ligands.is_empty() {
            anyhow::bail!("at least one ligand must be configured.");
        }
        for ligand in &self.ligands {
            if ligand.diffusion_coefficient < 0.0 {
                anyhow::bail!("ligand '{}' has a negative diffusion coefficient.", ligand.name);
            }
            if ligand.degradation_rate < 0.0 {
                anyhow::bail!("ligand '{}' has a negative degradation rate.", ligand.name);
            }
        }
        if let Some(dt) = self.timing.dt {
            if !(dt > 0.0) {
                anyhow::bail!("dt must be positive.");
            }
        }
        if self.timing.total_time < 0.0 {
            anyhow::bail!("total_time must not be negative.");
        }
        for emitter in &self.emitters {
            if emitter.position.is_none() && emitter.count.is_none() {
                anyhow::bail!("emitter for ligand {} needs a position or a count.", emitter.ligand_id);
            }
            if emitter.jitter < 0.0 {
                anyhow::bail!("emitter jitter must not be negative.");
            }
        }
        Ok(())
    }
}
