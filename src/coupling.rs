//! Bilinear coupling between continuous agent positions and the grid.
//!
//! A position maps to fractional grid coordinates
//! `(x / resolution + BORDER_WIDTH, y / resolution + BORDER_WIDTH)`; the four
//! surrounding nodes (floor/ceil per axis) receive weights that are
//! non-negative and sum to one. [`sample`] gathers with those weights and
//! [`scatter_add`] distributes with the very same weights, so a scatter of `Δ`
//! adds exactly `Δ` to the summed field.
//!
//! Corners outside the allocated tensor are rejected rather than clamped.

use crate::error::{EnvironmentError, Result};
use crate::field::{FieldTensor, GridGeometry, BORDER_WIDTH};
use diffusion_common::Vec2;
use rayon::prelude::*;

/// Corner order used for weights and offsets.
pub const TOP_LEFT: usize = 0;
pub const TOP_RIGHT: usize = 1;
pub const BOTTOM_LEFT: usize = 2;
pub const BOTTOM_RIGHT: usize = 3;

/// Index reported in [`EnvironmentError::OutOfBounds`] for a NaN or infinite coordinate.
pub const NON_FINITE_INDEX: i64 = i64::MIN;

/// Fractional `(col, row)` coordinate of a physical position in the padded grid.
#[inline(always)]
pub fn to_grid_coordinate(position: Vec2, resolution: f64) -> (f64, f64) {
    (
        position.x / resolution + BORDER_WIDTH as f64,
        position.y / resolution + BORDER_WIDTH as f64,
    )
}

/// Bilinear weights for a fractional grid coordinate, in corner order.
#[inline(always)]
pub fn bilinear_weights(grid_x: f64, grid_y: f64) -> [f64; 4] {
    let fx = grid_x - grid_x.floor();
    let fy = grid_y - grid_y.floor();
    let mut weights = [0.0; 4];
    weights[TOP_LEFT] = (1.0 - fx) * (1.0 - fy);
    weights[TOP_RIGHT] = fx * (1.0 - fy);
    weights[BOTTOM_LEFT] = (1.0 - fx) * fy;
    weights[BOTTOM_RIGHT] = fx * fy;
    weights
}

/// Corner offsets (within one channel) and weights for one position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerWeights {
    pub offsets: [usize; 4],
    pub weights: [f64; 4],
}

/// Precomputed corners and weights for a batch of positions.
///
/// Building the plan once lets a population sample and then scatter at the
/// same positions without recomputing the interpolation.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationPlan {
    geometry: GridGeometry,
    corners: Vec<CornerWeights>,
}

impl InterpolationPlan {
    pub fn new(geometry: &GridGeometry, positions: &[Vec2]) -> Result<Self> {
        let corners = positions
            .par_iter()
            .map(|&position| locate(geometry, position))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { geometry: *geometry, corners })
    }

    pub fn len(&self) -> usize {
        self.corners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }

    pub fn corners(&self) -> &[CornerWeights] {
        &self.corners
    }

    fn check_field(&self, field: &FieldTensor) -> Result<()> {
        let g = field.geometry();
        if g.rows != self.geometry.rows || g.cols != self.geometry.cols {
            return Err(EnvironmentError::DimensionMismatch {
                what: "plan grid cells",
                expected: g.channel_len(),
                got: self.geometry.channel_len(),
            });
        }
        Ok(())
    }
}

fn locate(geometry: &GridGeometry, position: Vec2) -> Result<CornerWeights> {
    let (gx, gy) = to_grid_coordinate(position, geometry.resolution);
    let (left, right) = (gx.floor(), gx.ceil());
    let (top, bottom) = (gy.floor(), gy.ceil());

    let max_col = (geometry.cols - 1) as f64;
    let max_row = (geometry.rows - 1) as f64;
    let col_ok = left >= 0.0 && right <= max_col;
    let row_ok = top >= 0.0 && bottom <= max_row;
    if !col_ok || !row_ok {
        let col = if left < 0.0 || !left.is_finite() { left } else { right };
        let row = if top < 0.0 || !top.is_finite() { top } else { bottom };
        return Err(EnvironmentError::OutOfBounds {
            row: corner_index(row),
            col: corner_index(col),
            rows: geometry.rows,
            cols: geometry.cols,
        });
    }

    let (left, right, top, bottom) = (left as usize, right as usize, top as usize, bottom as usize);
    let cols = geometry.cols;
    let mut offsets = [0usize; 4];
    offsets[TOP_LEFT] = top * cols + left;
    offsets[TOP_RIGHT] = top * cols + right;
    offsets[BOTTOM_LEFT] = bottom * cols + left;
    offsets[BOTTOM_RIGHT] = bottom * cols + right;

    Ok(CornerWeights {
        offsets,
        weights: bilinear_weights(gx, gy),
    })
}

/// Integral corner index for error reports; non-finite coordinates map to
/// [`NON_FINITE_INDEX`].
fn corner_index(value: f64) -> i64 {
    if value.is_finite() {
        value as i64
    } else {
        NON_FINITE_INDEX
    }
}

fn check_ligands(field: &FieldTensor, ligands: &[usize]) -> Result<()> {
    let count = field.geometry().n_ligands;
    match ligands.iter().find(|&&index| index >= count) {
        Some(&index) => Err(EnvironmentError::LigandIndexOutOfRange { index, count }),
        None => Ok(()),
    }
}

fn check_len(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(EnvironmentError::DimensionMismatch { what, expected, got })
    }
}

/// Concentration of `ligands[i]` at the `i`-th planned position.
pub fn sample_with(field: &FieldTensor, plan: &InterpolationPlan, ligands: &[usize]) -> Result<Vec<f64>> {
    check_len("ligand indices", plan.len(), ligands.len())?;
    plan.check_field(field)?;
    check_ligands(field, ligands)?;

    Ok(plan
        .corners
        .par_iter()
        .zip(ligands.par_iter())
        .map(|(corner, &ligand)| gather(field.channel(ligand), corner))
        .collect())
}

/// Concentrations of every listed ligand at every planned position, one row per position.
pub fn sample_all(field: &FieldTensor, plan: &InterpolationPlan, ligands: &[usize]) -> Result<Vec<Vec<f64>>> {
    plan.check_field(field)?;
    check_ligands(field, ligands)?;

    Ok(plan
        .corners
        .par_iter()
        .map(|corner| {
            ligands
                .iter()
                .map(|&ligand| gather(field.channel(ligand), corner))
                .collect()
        })
        .collect())
}

#[inline(always)]
fn gather(channel: &[f64], corner: &CornerWeights) -> f64 {
    corner
        .offsets
        .iter()
        .zip(corner.weights.iter())
        .map(|(&offset, &w)| channel[offset] * w)
        .sum()
}

/// Adds `deltas[i]` of `ligands[i]` around the `i`-th planned position.
///
/// Contributions are computed in parallel and then summed into the field
/// serially, so positions sharing a corner all land.
pub fn scatter_add_with(
    field: &mut FieldTensor,
    plan: &InterpolationPlan,
    deltas: &[f64],
    ligands: &[usize],
) -> Result<()> {
    check_len("ligand indices", plan.len(), ligands.len())?;
    check_len("deltas", plan.len(), deltas.len())?;
    plan.check_field(field)?;
    check_ligands(field, ligands)?;

    let channel_len = field.geometry().channel_len();
    let contributions: Vec<(usize, f64)> = plan
        .corners
        .par_iter()
        .zip(deltas.par_iter())
        .zip(ligands.par_iter())
        .flat_map_iter(|((corner, &delta), &ligand)| {
            let base = ligand * channel_len;
            corner
                .offsets
                .iter()
                .zip(corner.weights)
                .map(move |(&offset, w)| (base + offset, delta * w))
        })
        .collect();

    let data = field.as_mut_slice();
    for (index, amount) in contributions {
        data[index] += amount;
    }
    Ok(())
}

/// Bilinear sample of `ligands[i]` at `positions[i]`.
pub fn sample(field: &FieldTensor, positions: &[Vec2], ligands: &[usize]) -> Result<Vec<f64>> {
    check_len("ligand indices", positions.len(), ligands.len())?;
    let plan = InterpolationPlan::new(field.geometry(), positions)?;
    sample_with(field, &plan, ligands)
}

/// Bilinear scatter of `deltas[i]` of `ligands[i]` at `positions[i]`.
pub fn scatter_add(field: &mut FieldTensor, deltas: &[f64], positions: &[Vec2], ligands: &[usize]) -> Result<()> {
    check_len("ligand indices", positions.len(), ligands.len())?;
    check_len("deltas", positions.len(), deltas.len())?;
    let plan = InterpolationPlan::new(field.geometry(), positions)?;
    scatter_add_with(field, &plan, deltas, ligands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// 6x6 interior, resolution 0.5, two ligands.
    fn field() -> FieldTensor {
        let g = GridGeometry::new([3.0, 3.0], 0.5, 2).unwrap();
        FieldTensor::new(g, &[1.0, 0.0]).unwrap()
    }

    fn total(field: &FieldTensor, ligand: usize) -> f64 {
        field.channel(ligand).iter().sum()
    }

    #[test]
    fn grid_coordinate_offsets_by_border() {
        assert_eq!(to_grid_coordinate(Vec2::new(1.0, 0.25), 0.5), (3.0, 1.5));
    }

    #[test]
    fn weights_follow_fractional_offsets() {
        let w = bilinear_weights(2.25, 3.5);
        assert!((w[TOP_LEFT] - 0.75 * 0.5).abs() < 1e-15);
        assert!((w[TOP_RIGHT] - 0.25 * 0.5).abs() < 1e-15);
        assert!((w[BOTTOM_LEFT] - 0.75 * 0.5).abs() < 1e-15);
        assert!((w[BOTTOM_RIGHT] - 0.25 * 0.5).abs() < 1e-15);
    }

    #[test]
    fn sampling_reproduces_linear_fields() {
        let mut f = field();
        // value = 2 + 3*col - row over the whole padded channel
        let cols = f.geometry().cols;
        for (i, v) in f.channel_mut(1).iter_mut().enumerate() {
            let (r, c) = ((i / cols) as f64, (i % cols) as f64);
            *v = 2.0 + 3.0 * c - r;
        }
        let positions = [Vec2::new(0.3, 1.7), Vec2::new(2.0, 0.0), Vec2::new(1.1, 2.95)];
        let values = sample(&f, &positions, &[1, 1, 1]).unwrap();
        for (p, v) in positions.iter().zip(values) {
            let (gx, gy) = to_grid_coordinate(*p, 0.5);
            assert!((v - (2.0 + 3.0 * gx - gy)).abs() < 1e-12);
        }
    }

    #[test]
    fn scatter_adds_exactly_delta_in_total() {
        let mut f = field();
        let before = total(&f, 0);
        scatter_add(&mut f, &[2.5], &[Vec2::new(1.3, 1.85)], &[0]).unwrap();
        assert!((total(&f, 0) - before - 2.5).abs() < 1e-12);
        assert_eq!(total(&f, 1), 0.0);
    }

    #[test]
    fn scatter_then_sample_on_a_node_returns_pre_value_plus_delta() {
        let mut f = field();
        let p = [Vec2::new(1.5, 1.0)];
        let pre = sample(&f, &p, &[0]).unwrap()[0];
        scatter_add(&mut f, &[0.75], &p, &[0]).unwrap();
        let post = sample(&f, &p, &[0]).unwrap()[0];
        assert!((post - (pre + 0.75)).abs() < 1e-12);
    }

    #[test]
    fn overlapping_scatters_accumulate() {
        let mut f = field();
        let p = Vec2::new(1.2, 1.4);
        scatter_add(&mut f, &[1.0, 1.0, 1.0], &[p, p, p], &[1, 1, 1]).unwrap();
        let mut g = field();
        scatter_add(&mut g, &[3.0], &[p], &[1]).unwrap();
        for (a, b) in f.channel(1).iter().zip(g.channel(1)) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn plan_is_reusable_for_sample_and_scatter() {
        let mut f = field();
        let positions = [Vec2::new(0.6, 0.6), Vec2::new(2.2, 1.3)];
        let plan = InterpolationPlan::new(f.geometry(), &positions).unwrap();
        assert_eq!(plan.len(), 2);
        scatter_add_with(&mut f, &plan, &[1.0, -0.5], &[1, 1]).unwrap();
        let matrix = sample_all(&f, &plan, &[0, 1]).unwrap();
        assert_eq!(matrix.len(), 2);
        assert!((matrix[0][0] - 1.0).abs() < 1e-12);
        assert_eq!(matrix[0][1], sample_with(&f, &plan, &[1, 1]).unwrap()[0]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut f = field();
        let p = [Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0)];
        assert_eq!(
            sample(&f, &p, &[0]),
            Err(EnvironmentError::DimensionMismatch { what: "ligand indices", expected: 2, got: 1 })
        );
        assert_eq!(
            scatter_add(&mut f, &[1.0], &p, &[0, 0]),
            Err(EnvironmentError::DimensionMismatch { what: "deltas", expected: 2, got: 1 })
        );
    }

    #[test]
    fn out_of_range_positions_are_rejected() {
        let mut f = field();
        let before = f.as_slice().to_vec();
        let err = scatter_add(&mut f, &[1.0, 1.0], &[Vec2::new(1.0, 1.0), Vec2::new(-0.6, 1.0)], &[0, 0]);
        assert!(matches!(err, Err(EnvironmentError::OutOfBounds { col: -1, .. })));
        // nothing written when any position fails
        assert_eq!(f.as_slice(), before.as_slice());

        assert!(matches!(
            sample(&f, &[Vec2::new(1.0, 3.6)], &[0]),
            Err(EnvironmentError::OutOfBounds { row: 9, rows: 8, .. })
        ));
        assert!(matches!(
            sample(&f, &[Vec2::new(f64::NAN, 1.0)], &[0]),
            Err(EnvironmentError::OutOfBounds { col: NON_FINITE_INDEX, row: 3, .. })
        ));
        assert!(matches!(
            sample(&f, &[Vec2::new(1.0, f64::INFINITY)], &[0]),
            Err(EnvironmentError::OutOfBounds { row: NON_FINITE_INDEX, .. })
        ));
        // ghost cells are inside the allocation
        assert!(sample(&f, &[Vec2::new(-0.5, 3.0)], &[0]).is_ok());
    }

    #[test]
    fn unknown_ligand_index_is_rejected() {
        let f = field();
        assert_eq!(
            sample(&f, &[Vec2::new(1.0, 1.0)], &[2]),
            Err(EnvironmentError::LigandIndexOutOfRange { index: 2, count: 2 })
        );
    }

    proptest! {
        #[test]
        fn weights_are_complete(x in 0.0f64..3.0, y in 0.0f64..3.0) {
            let (gx, gy) = to_grid_coordinate(Vec2::new(x, y), 0.5);
            let w = bilinear_weights(gx, gy);
            prop_assert!(w.iter().all(|&v| v >= 0.0));
            prop_assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn interior_positions_always_locate(x in 0.0f64..=3.0, y in 0.0f64..=3.0) {
            let f = field();
            prop_assert!(InterpolationPlan::new(f.geometry(), &[Vec2::new(x, y)]).is_ok());
        }
    }
}
