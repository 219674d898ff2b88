//! Padded concentration storage shared by the boundary engine, the stepper and
//! the coupling layer.

use crate::error::{EnvironmentError, Result};
use crate::stepper::STENCIL_RADIUS;

/// Ghost cells on each side of every spatial axis.
pub const BORDER_WIDTH: usize = STENCIL_RADIUS;

const _: () = assert!(BORDER_WIDTH == 1, "boundary rules fill exactly one ghost layer");

/// Tolerance applied before rounding `size / resolution` up, so that sizes which
/// are exact multiples of the resolution do not gain a cell from float noise.
const CELL_COUNT_EPSILON: f64 = 1e-9;

/// Shape of the padded field. Rows run along physical `y`, columns along `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    /// Rows including both ghost rows.
    pub rows: usize,
    /// Columns including both ghost columns.
    pub cols: usize,
    pub resolution: f64,
    pub n_ligands: usize,
}

impl GridGeometry {
    /// Derives the padded shape from a physical `[x, y]` size.
    pub fn new(dimensions: [f64; 2], resolution: f64, n_ligands: usize) -> Result<Self> {
        if !(resolution > 0.0) || !resolution.is_finite() {
            return Err(EnvironmentError::InvalidConfig(format!(
                "resolution must be positive and finite, got {resolution}"
            )));
        }
        if n_ligands == 0 {
            return Err(EnvironmentError::InvalidConfig("no ligands registered".into()));
        }
        let mut cells = [0usize; 2];
        for (axis, &size) in dimensions.iter().enumerate() {
            if !(size > 0.0) || !size.is_finite() {
                return Err(EnvironmentError::InvalidConfig(format!(
                    "physical size along axis {axis} must be positive and finite, got {size}"
                )));
            }
            let count = (size / resolution - CELL_COUNT_EPSILON).ceil().max(1.0);
            // `as usize` saturates, so anything at or above usize::MAX is rejected here
            if count >= usize::MAX as f64 {
                return Err(too_large(dimensions, resolution));
            }
            cells[axis] = count as usize;
        }
        // [x, y] -> (rows = y, cols = x)
        let rows = cells[1].checked_add(2 * BORDER_WIDTH);
        let cols = cells[0].checked_add(2 * BORDER_WIDTH);
        let (rows, cols) = match (rows, cols) {
            (Some(rows), Some(cols)) => (rows, cols),
            _ => return Err(too_large(dimensions, resolution)),
        };
        if rows.checked_mul(cols).and_then(|len| len.checked_mul(n_ligands)).is_none() {
            return Err(too_large(dimensions, resolution));
        }
        Ok(Self {
            rows,
            cols,
            resolution,
            n_ligands,
        })
    }

    pub fn interior_rows(&self) -> usize {
        self.rows - 2 * BORDER_WIDTH
    }

    pub fn interior_cols(&self) -> usize {
        self.cols - 2 * BORDER_WIDTH
    }

    /// Cells in one padded channel.
    pub fn channel_len(&self) -> usize {
        self.rows * self.cols
    }

    /// Physical extent of the interior as `[x, y]`.
    pub fn physical_size(&self) -> [f64; 2] {
        [
            self.interior_cols() as f64 * self.resolution,
            self.interior_rows() as f64 * self.resolution,
        ]
    }
}

fn too_large(dimensions: [f64; 2], resolution: f64) -> EnvironmentError {
    EnvironmentError::InvalidConfig(format!(
        "grid of {:?} at resolution {resolution} has too many cells to allocate",
        dimensions
    ))
}

/// Dense `(rows, cols, n_ligands)` tensor including the ghost border.
///
/// Stored channel-major so each ligand is one contiguous row-major slab; the
/// stepper and boundary engine work channel by channel.
#[derive(Debug, Clone)]
pub struct FieldTensor {
    geometry: GridGeometry,
    data: Vec<f64>,
}

impl FieldTensor {
    /// Allocates the tensor with every cell of channel `i` set to `initial[i]`.
    pub fn new(geometry: GridGeometry, initial: &[f64]) -> Result<Self> {
        if initial.len() != geometry.n_ligands {
            return Err(EnvironmentError::DimensionMismatch {
                what: "initial concentrations",
                expected: geometry.n_ligands,
                got: initial.len(),
            });
        }
        let channel_len = geometry.channel_len();
        let mut data = Vec::with_capacity(channel_len * geometry.n_ligands);
        for &value in initial {
            data.extend(std::iter::repeat(value).take(channel_len));
        }
        Ok(Self { geometry, data })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    #[inline(always)]
    pub fn index(&self, row: usize, col: usize, ligand: usize) -> usize {
        ligand * self.geometry.channel_len() + row * self.geometry.cols + col
    }

    /// Value at a padded coordinate, `None` outside the allocation.
    pub fn get(&self, row: usize, col: usize, ligand: usize) -> Option<f64> {
        if row < self.geometry.rows && col < self.geometry.cols && ligand < self.geometry.n_ligands {
            Some(self.data[self.index(row, col, ligand)])
        } else {
            None
        }
    }

    pub fn channel(&self, ligand: usize) -> &[f64] {
        let len = self.geometry.channel_len();
        &self.data[ligand * len..(ligand + 1) * len]
    }

    pub fn channel_mut(&mut self, ligand: usize) -> &mut [f64] {
        let len = self.geometry.channel_len();
        &mut self.data[ligand * len..(ligand + 1) * len]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Border-excluded view across all ligands.
    pub fn interior_view(&self) -> InteriorView<'_> {
        InteriorView { tensor: self }
    }

    /// Overwrites the interior of one channel from row-major interior data.
    pub fn set_interior(&mut self, ligand: usize, values: &[f64]) -> Result<()> {
        let geometry = self.geometry;
        if ligand >= geometry.n_ligands {
            return Err(EnvironmentError::LigandIndexOutOfRange {
                index: ligand,
                count: geometry.n_ligands,
            });
        }
        let (rows, cols) = (geometry.interior_rows(), geometry.interior_cols());
        if values.len() != rows * cols {
            return Err(EnvironmentError::DimensionMismatch {
                what: "interior values",
                expected: rows * cols,
                got: values.len(),
            });
        }
        let channel = self.channel_mut(ligand);
        for (r, source) in values.chunks_exact(cols).enumerate() {
            let start = (r + BORDER_WIDTH) * geometry.cols + BORDER_WIDTH;
            channel[start..start + cols].copy_from_slice(source);
        }
        Ok(())
    }
}

/// Read-only, border-excluded view of every ligand channel.
#[derive(Debug, Clone, Copy)]
pub struct InteriorView<'a> {
    tensor: &'a FieldTensor,
}

impl<'a> InteriorView<'a> {
    /// `(rows, cols, n_ligands)` of the interior.
    pub fn shape(&self) -> (usize, usize, usize) {
        let g = self.tensor.geometry;
        (g.interior_rows(), g.interior_cols(), g.n_ligands)
    }

    /// Value at interior coordinates.
    pub fn get(&self, row: usize, col: usize, ligand: usize) -> Option<f64> {
        let (rows, cols, _) = self.shape();
        if row < rows && col < cols {
            self.tensor.get(row + BORDER_WIDTH, col + BORDER_WIDTH, ligand)
        } else {
            None
        }
    }

    /// The interior of a single channel.
    pub fn channel(&self, ligand: usize) -> Option<ChannelView<'a>> {
        if ligand < self.tensor.geometry.n_ligands {
            Some(ChannelView {
                geometry: self.tensor.geometry,
                data: self.tensor.channel(ligand),
            })
        } else {
            None
        }
    }
}

/// Read-only interior of one ligand channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelView<'a> {
    geometry: GridGeometry,
    data: &'a [f64],
}

impl<'a> ChannelView<'a> {
    pub fn rows(&self) -> usize {
        self.geometry.interior_rows()
    }

    pub fn cols(&self) -> usize {
        self.geometry.interior_cols()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows() && col < self.cols() {
            Some(self.data[(row + BORDER_WIDTH) * self.geometry.cols + col + BORDER_WIDTH])
        } else {
            None
        }
    }

    /// Interior rows, each a contiguous slice.
    pub fn row_slices(&self) -> impl Iterator<Item = &'a [f64]> + 'a {
        let cols = self.geometry.cols;
        let inner = self.cols();
        let data = self.data;
        (BORDER_WIDTH..self.geometry.rows - BORDER_WIDTH)
            .map(move |r| &data[r * cols + BORDER_WIDTH..r * cols + BORDER_WIDTH + inner])
    }

    /// Interior values in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + 'a {
        self.row_slices().flat_map(|row| row.iter().copied())
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }

    pub fn sum(&self) -> f64 {
        self.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        self.sum() / (self.rows() * self.cols()) as f64
    }

    pub fn max(&self) -> f64 {
        self.iter().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.iter().fold(f64::INFINITY, f64::min)
    }
}
