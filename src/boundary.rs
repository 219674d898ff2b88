//! Ghost-cell filling for the three supported boundary policies.

use crate::field::{FieldTensor, GridGeometry, BORDER_WIDTH};
use diffusion_common::BoundaryCondition;
use rayon::prelude::*;

#[derive(Clone, Copy)]
enum Side {
    Neg,
    Pos,
}

/// Fills border cells from the current interior according to a policy fixed at
/// construction.
///
/// Every border value depends only on interior cells, so the edges write
/// disjoint regions and repeated application without an interior change is a
/// no-op. Corners compose the row rule and the column rule.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryEngine {
    condition: BoundaryCondition,
    resolution: f64,
}

impl BoundaryEngine {
    pub fn new(condition: BoundaryCondition, resolution: f64) -> Self {
        Self { condition, resolution }
    }

    pub fn condition(&self) -> &BoundaryCondition {
        &self.condition
    }

    /// Rewrites every ghost cell of every channel. Interior cells are not touched.
    pub fn apply(&self, field: &mut FieldTensor) {
        let geometry = *field.geometry();
        field
            .as_mut_slice()
            .par_chunks_mut(geometry.channel_len())
            .for_each(|channel| self.fill_channel(channel, &geometry));
    }

    fn fill_channel(&self, channel: &mut [f64], geometry: &GridGeometry) {
        let (rows, cols) = (geometry.rows, geometry.cols);
        let last_row = rows - BORDER_WIDTH;
        let last_col = cols - BORDER_WIDTH;

        // Top and bottom rows span the full width, corners included.
        for &row in &[0, last_row] {
            for col in 0..cols {
                let value = self.ghost_value(channel, geometry, row, col);
                channel[row * cols + col] = value;
            }
        }
        for row in BORDER_WIDTH..last_row {
            for &col in &[0, last_col] {
                let value = self.ghost_value(channel, geometry, row, col);
                channel[row * cols + col] = value;
            }
        }
    }

    /// Value of border cell `(row, col)` derived from the interior only.
    #[inline(always)]
    fn ghost_value(&self, channel: &[f64], geometry: &GridGeometry, row: usize, col: usize) -> f64 {
        let row_side = side_of(row, geometry.rows);
        let col_side = side_of(col, geometry.cols);
        let source_row = self.source_index(row, geometry.rows);
        let source_col = self.source_index(col, geometry.cols);

        let mut value = channel[source_row * geometry.cols + source_col];
        if let Some(side) = row_side {
            value = self.rule(value, side, Axis::Y);
        }
        if let Some(side) = col_side {
            value = self.rule(value, side, Axis::X);
        }
        value
    }

    /// Interior index a border index reads from along one axis.
    #[inline(always)]
    fn source_index(&self, index: usize, len: usize) -> usize {
        let last_interior = len - 1 - BORDER_WIDTH;
        match self.condition {
            BoundaryCondition::Periodic => {
                if index < BORDER_WIDTH {
                    last_interior
                } else if index > last_interior {
                    BORDER_WIDTH
                } else {
                    index
                }
            }
            _ => index.clamp(BORDER_WIDTH, last_interior),
        }
    }

    #[inline(always)]
    fn rule(&self, adjacent: f64, side: Side, axis: Axis) -> f64 {
        match self.condition {
            BoundaryCondition::Periodic => adjacent,
            BoundaryCondition::Neumann { x_neg, x_pos, y_neg, y_pos } => {
                let flux = pick(side, axis, x_neg, x_pos, y_neg, y_pos);
                adjacent - self.resolution * flux
            }
            BoundaryCondition::Dirichlet { x_neg, x_pos, y_neg, y_pos } => {
                let target = pick(side, axis, x_neg, x_pos, y_neg, y_pos);
                2.0 * target - adjacent
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

#[inline(always)]
fn side_of(index: usize, len: usize) -> Option<Side> {
    if index < BORDER_WIDTH {
        Some(Side::Neg)
    } else if index >= len - BORDER_WIDTH {
        Some(Side::Pos)
    } else {
        None
    }
}

#[inline(always)]
fn pick(side: Side, axis: Axis, x_neg: f64, x_pos: f64, y_neg: f64, y_pos: f64) -> f64 {
    match (axis, side) {
        (Axis::X, Side::Neg) => x_neg,
        (Axis::X, Side::Pos) => x_pos,
        (Axis::Y, Side::Neg) => y_neg,
        (Axis::Y, Side::Pos) => y_pos,
    }
}
