//! Explicit diffusion-reaction update of the interior cells.
//!
//! One tick is three phases:
//!
//! 1. the [`BoundaryEngine`] rewrites every ghost cell;
//! 2. each channel is convolved with its scaled Laplacian stencil and the
//!    reaction term `P - k * c` is added, giving a rate per interior cell;
//! 3. the [`UpdateRule`] advances the interior cells by `dt`.
//!
//! Phase 1 completes before phase 2 starts and phase 2 writes into a separate
//! rate buffer, so no read ever observes a half-updated field. Border cells are
//! never advanced.
//!
//! There is no step-size guard here. Steps larger than
//! [`stable_timestep`](crate::stability::stable_timestep) diverge silently.

use crate::boundary::BoundaryEngine;
use crate::field::{FieldTensor, BORDER_WIDTH};
use diffusion_common::LigandConfig;
use rayon::prelude::*;
use std::fmt::Debug;

/// Five-point discrete Laplacian.
pub const LAPLACIAN: [[f64; 3]; 3] = [
    [0.0, 1.0, 0.0],
    [1.0, -4.0, 1.0],
    [0.0, 1.0, 0.0],
];

/// Cells reached by the stencil on each side of its centre.
pub const STENCIL_RADIUS: usize = LAPLACIAN.len() / 2;

/// Arithmetic applied to each interior cell once its rate is known.
pub trait UpdateRule: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn advance(&self, value: f64, rate: f64, dt: f64) -> f64;
}

/// `value + rate * dt`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardEuler;

impl UpdateRule for ForwardEuler {
    fn name(&self) -> &'static str {
        "forward-euler"
    }

    #[inline(always)]
    fn advance(&self, value: f64, rate: f64, dt: f64) -> f64 {
        value + rate * dt
    }
}

/// Per-channel coefficients with the stencil already scaled by `D / h^2`.
#[derive(Debug, Clone)]
struct ChannelKinetics {
    /// Non-zero stencil taps as `(row offset, col offset, weight)`.
    taps: Vec<(usize, usize, f64)>,
    production: f64,
    degradation: f64,
}

impl ChannelKinetics {
    fn new(ligand: &LigandConfig, resolution: f64) -> Self {
        let scale = ligand.diffusion_coefficient / (resolution * resolution);
        let taps = LAPLACIAN
            .iter()
            .enumerate()
            .flat_map(|(dr, row)| row.iter().enumerate().map(move |(dc, &w)| (dr, dc, w)))
            .filter(|&(_, _, w)| w != 0.0)
            .map(|(dr, dc, w)| (dr, dc, w * scale))
            .collect();
        Self {
            taps,
            production: ligand.production_rate,
            degradation: ligand.degradation_rate,
        }
    }
}

/// Advances every ligand channel by one explicit step.
#[derive(Debug)]
pub struct DiffusionStepper {
    kinetics: Vec<ChannelKinetics>,
    rule: Box<dyn UpdateRule>,
    /// Interior rates, channel-major, reused across ticks.
    rates: Vec<f64>,
}

impl DiffusionStepper {
    pub fn new(ligands: &[LigandConfig], resolution: f64) -> Self {
        Self {
            kinetics: ligands.iter().map(|l| ChannelKinetics::new(l, resolution)).collect(),
            rule: Box::new(ForwardEuler),
            rates: Vec::new(),
        }
    }

    pub fn set_update_rule(&mut self, rule: Box<dyn UpdateRule>) {
        self.rule = rule;
    }

    pub fn update_rule(&self) -> &dyn UpdateRule {
        self.rule.as_ref()
    }

    pub fn step(&mut self, field: &mut FieldTensor, boundary: &BoundaryEngine, dt: f64) {
        boundary.apply(field);
        self.compute_rates(field);
        self.apply_rates(field, dt);
    }

    /// Diffusive flux plus reaction for every interior cell, read from the whole
    /// padded channel.
    fn compute_rates(&mut self, field: &FieldTensor) {
        let geometry = *field.geometry();
        let (rows, cols) = (geometry.interior_rows(), geometry.interior_cols());
        self.rates.resize(rows * cols * geometry.n_ligands, 0.0);

        let kinetics = &self.kinetics;
        self.rates
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(k, rate_row)| {
                let ligand = k / rows;
                let row = k % rows + BORDER_WIDTH;
                let channel = field.channel(ligand);
                let kin = &kinetics[ligand];
                for (c, rate) in rate_row.iter_mut().enumerate() {
                    let col = c + BORDER_WIDTH;
                    let mut flux = 0.0;
                    for &(dr, dc, w) in &kin.taps {
                        let r = row + dr - STENCIL_RADIUS;
                        let cc = col + dc - STENCIL_RADIUS;
                        flux += w * channel[r * geometry.cols + cc];
                    }
                    let value = channel[row * geometry.cols + col];
                    *rate = flux + kin.production - kin.degradation * value;
                }
            });
    }

    fn apply_rates(&self, field: &mut FieldTensor, dt: f64) {
        let geometry = *field.geometry();
        let (inner_rows, inner_cols) = (geometry.interior_rows(), geometry.interior_cols());
        let rule = self.rule.as_ref();
        let rates = &self.rates;

        field
            .as_mut_slice()
            .par_chunks_mut(geometry.cols)
            .enumerate()
            .for_each(|(k, cells)| {
                let ligand = k / geometry.rows;
                let row = k % geometry.rows;
                if row < BORDER_WIDTH || row >= geometry.rows - BORDER_WIDTH {
                    return;
                }
                let start = (ligand * inner_rows + row - BORDER_WIDTH) * inner_cols;
                let rate_row = &rates[start..start + inner_cols];
                for (value, &rate) in cells[BORDER_WIDTH..BORDER_WIDTH + inner_cols]
                    .iter_mut()
                    .zip(rate_row)
                {
                    *value = rule.advance(*value, rate, dt);
                }
            });
    }
}
