use serde::{Serialize, Deserialize};
use crate::config::{BoundaryCondition, LigandConfig, LigandId};

/// Grid and ligand description handed to the persistence collaborator once at setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridMetadata {
    /// Step size the run was configured with.
    pub dt: f64,
    pub resolution: f64,
    pub boundary: BoundaryCondition,
    /// Physical size as `[x, y]`, as given in the configuration.
    pub dimensions: [f64; 2],
    /// Interior cells along y.
    pub rows: usize,
    /// Interior cells along x.
    pub cols: usize,
    pub ligands: Vec<LigandConfig>,
}

/// Interior values of one ligand channel at a specific time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSnapshot {
    /// Simulation time at which the snapshot was taken.
    pub time: f64,
    /// Number of completed diffusion ticks.
    pub tick: u64,
    pub ligand_id: LigandId,
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    /// Row-major interior values, `rows * cols` long.
    pub values: Vec<f64>,
}

/// Everything a run recorded: setup metadata plus the appended field snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedRun {
    pub metadata: GridMetadata,
    pub snapshots: Vec<FieldSnapshot>,
}

impl RecordedRun {
    /// Most recent snapshot of each ligand, in metadata ligand order.
    pub fn latest(&self) -> Vec<&FieldSnapshot> {
        self.metadata
            .ligands
            .iter()
            .filter_map(|ligand| {
                self.snapshots
                    .iter()
                    .filter(|s| s.ligand_id == ligand.id)
                    .max_by_key(|s| s.tick)
            })
            .collect()
    }
}
