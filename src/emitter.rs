//! Point sources that exercise the coupling layer from the driver.
//!
//! Each emitter group owns a set of positions and adds `rate * dt` of one
//! ligand at every position per tick. Groups with a jitter move by a Gaussian
//! random walk, wrapped into the domain.

use crate::environment::Environment;
use anyhow::{Context, Result};
use diffusion_common::{EmitterConfig, Vec2};
use log::debug;
use rand::distr::Uniform;
use rand::prelude::*;
use rand::seq::SliceRandom;
use rand_distr::Normal;

#[derive(Debug)]
pub struct EmitterGroup {
    ligand: usize,
    ligand_id: u32,
    rate: f64,
    positions: Vec<Vec2>,
    jitter: Option<Normal<f64>>,
    rng: StdRng,
}

impl EmitterGroup {
    pub fn new(config: &EmitterConfig, env: &Environment) -> Result<Self> {
        let ligand = env
            .lookup(config.ligand_id)
            .with_context(|| format!("emitter refers to ligand {}", config.ligand_id))?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let [width, height] = env.size();

        let positions = match (config.count, config.position) {
            (Some(count), _) => place_jittered(count as usize, width, height, &mut rng)?,
            (None, Some(position)) => vec![Vec2::from(position)],
            (None, None) => anyhow::bail!("emitter for ligand {} needs a position or a count", config.ligand_id),
        };
        if let Some(p) = positions.iter().find(|p| !(p.x >= 0.0 && p.x <= width && p.y >= 0.0 && p.y <= height)) {
            anyhow::bail!(
                "emitter position ({}, {}) lies outside the {}x{} domain",
                p.x,
                p.y,
                width,
                height
            );
        }

        let jitter = if config.jitter > 0.0 {
            Some(Normal::new(0.0, config.jitter).context("invalid emitter jitter")?)
        } else {
            None
        };

        debug!(
            "Emitter group for ligand {}: {} position(s), rate {}.",
            config.ligand_id,
            positions.len(),
            config.rate
        );
        Ok(Self {
            ligand,
            ligand_id: config.ligand_id,
            rate: config.rate,
            positions,
            jitter,
            rng,
        })
    }

    pub fn ligand_id(&self) -> u32 {
        self.ligand_id
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    /// Deposits one tick's worth of ligand, then moves the emitters.
    pub fn emit(&mut self, env: &mut Environment, dt: f64) -> Result<()> {
        let deltas = vec![self.rate * dt; self.positions.len()];
        let ligands = vec![self.ligand; self.positions.len()];
        env.scatter_add(&deltas, &self.positions, &ligands)?;

        if let Some(normal) = self.jitter {
            let [width, height] = env.size();
            let rng = &mut self.rng;
            for position in &mut self.positions {
                let step = Vec2::new(normal.sample(rng), normal.sample(rng));
                *position = position.add(step).wrap(width, height);
            }
        }
        Ok(())
    }

    /// Concentration currently seen at each emitter.
    pub fn probe(&self, env: &Environment) -> Result<Vec<f64>> {
        let ligands = vec![self.ligand; self.positions.len()];
        Ok(env.sample(&self.positions, &ligands)?)
    }
}

/// Grid-based jittered sampling: the domain is cut into roughly square bins,
/// `count` of them are picked at random and one point is drawn per bin.
fn place_jittered(count: usize, width: f64, height: f64, rng: &mut StdRng) -> Result<Vec<Vec2>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let cols = ((count as f64 * width / height).sqrt().ceil() as usize).max(1);
    let rows = count.div_ceil(cols).max(1);
    let mut bins: Vec<(usize, usize)> = (0..cols)
        .flat_map(|ix| (0..rows).map(move |iy| (ix, iy)))
        .collect();
    bins.shuffle(rng);
    bins.truncate(count);

    let bin_w = width / cols as f64;
    let bin_h = height / rows as f64;
    let mut positions = Vec::with_capacity(count);
    for (ix, iy) in bins {
        let x0 = ix as f64 * bin_w;
        let y0 = iy as f64 * bin_h;
        let dist_x = Uniform::new(x0, x0 + bin_w)?;
        let dist_y = Uniform::new(y0, y0 + bin_h)?;
        positions.push(Vec2::new(rng.sample(dist_x), rng.sample(dist_y)));
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffusion_common::{BoundaryCondition, GridConfig, LigandConfig};

    fn env() -> Environment {
        let grid = GridConfig {
            dimensions: [4.0, 2.0],
            resolution: 0.5,
            boundary: BoundaryCondition::Periodic,
        };
        Environment::new(&grid, vec![LigandConfig::new(9, "signal", 0.0, 0.1)]).unwrap()
    }

    fn emitter(count: Option<u32>, position: Option<[f64; 2]>, jitter: f64) -> EmitterConfig {
        EmitterConfig {
            ligand_id: 9,
            rate: 2.0,
            position,
            count,
            seed: 7,
            jitter,
        }
    }

    #[test]
    fn random_placement_is_seeded_and_inside() {
        let env = env();
        let a = EmitterGroup::new(&emitter(Some(10), None, 0.0), &env).unwrap();
        let b = EmitterGroup::new(&emitter(Some(10), None, 0.0), &env).unwrap();
        assert_eq!(a.positions().len(), 10);
        assert_eq!(a.positions(), b.positions());
        assert!(a.positions().iter().all(|p| p.x >= 0.0 && p.x <= 4.0 && p.y >= 0.0 && p.y <= 2.0));
    }

    #[test]
    fn emit_adds_rate_times_dt() {
        let mut env = env();
        let mut group = EmitterGroup::new(&emitter(Some(3), None, 0.3), &env).unwrap();
        group.emit(&mut env, 0.25).unwrap();
        // positions in the last cell of either axis put corners on ghost cells, so sum the whole tensor
        let total: f64 = env.field().as_slice().iter().sum();
        assert!((total - 3.0 * 2.0 * 0.25).abs() < 1e-12);
        assert_eq!(group.probe(&env).unwrap().len(), 3);
    }

    #[test]
    fn rejects_unknown_ligand_and_outside_position() {
        let env = env();
        let mut bad = emitter(None, Some([1.0, 1.0]), 0.0);
        bad.ligand_id = 1;
        assert!(EmitterGroup::new(&bad, &env).is_err());
        assert!(EmitterGroup::new(&emitter(None, Some([5.0, 1.0]), 0.0), &env).is_err());
    }
}
