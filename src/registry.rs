//! Dense indexing of ligand channels.

use crate::error::{EnvironmentError, Result};
use diffusion_common::{LigandConfig, LigandId};
use std::collections::HashMap;

/// Bijection from external ligand ids to channel indices in `[0, n)`.
///
/// Index `i` belongs to the `i`-th ligand of the list the registry was built from.
#[derive(Debug, Clone)]
pub struct LigandRegistry {
    ligands: Vec<LigandConfig>,
    index_of: HashMap<LigandId, usize>,
}

impl LigandRegistry {
    pub fn build(ligands: Vec<LigandConfig>) -> Result<Self> {
        let mut index_of = HashMap::with_capacity(ligands.len());
        for (index, ligand) in ligands.iter().enumerate() {
            if index_of.insert(ligand.id, index).is_some() {
                return Err(EnvironmentError::DuplicateLigandId { id: ligand.id });
            }
        }
        Ok(Self { ligands, index_of })
    }

    pub fn lookup(&self, id: LigandId) -> Result<usize> {
        self.index_of
            .get(&id)
            .copied()
            .ok_or(EnvironmentError::UnknownLigand { id })
    }

    /// Resolves several ids at once, failing on the first unknown one.
    pub fn lookup_many(&self, ids: &[LigandId]) -> Result<Vec<usize>> {
        ids.iter().map(|&id| self.lookup(id)).collect()
    }

    /// Ligand stored at channel `index`.
    pub fn ligand(&self, index: usize) -> Option<&LigandConfig> {
        self.ligands.get(index)
    }

    pub fn ligands(&self) -> &[LigandConfig] {
        &self.ligands
    }

    pub fn len(&self) -> usize {
        self.ligands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ligands.is_empty()
    }

    /// Validates a channel index supplied by a collaborator.
    pub(crate) fn check_index(&self, index: usize) -> Result<()> {
        if index < self.ligands.len() {
            Ok(())
        } else {
            Err(EnvironmentError::LigandIndexOutOfRange {
                index,
                count: self.ligands.len(),
            })
        }
    }
}
