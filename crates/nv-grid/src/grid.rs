//! Finalised grids and their construction parameters.

use nv_geom::zone::{TRACKER_LAYERS, TRACKER_ROWS};
use nv_geom::{CaloZone, Layout};
use serde::{Deserialize, Serialize};

use crate::axis::Axis;

/// What a grid cell measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridMode {
    /// Number of hits (or entries) per cell.
    Count,
    /// Mean of a per-hit quantity per cell.
    Average,
}

/// Everything needed to allocate a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Grid name.
    pub name: String,
    /// Display title.
    pub title: String,
    /// Geometry the cells map to.
    pub layout: Layout,
    /// Count or average mode.
    pub mode: GridMode,
    /// X axis.
    pub x_axis: Axis,
    /// Y axis.
    pub y_axis: Axis,
}

impl GridSpec {
    /// Tracker layer/row map.
    pub fn tracker(name: impl Into<String>, mode: GridMode) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            layout: Layout::Tracker,
            mode,
            x_axis: Axis::integer(TRACKER_LAYERS.0, TRACKER_LAYERS.1),
            y_axis: Axis::integer(TRACKER_ROWS.0, TRACKER_ROWS.1),
        }
    }

    /// One calorimeter zone map, named `<name>_<zone>`.
    pub fn calo(name: &str, zone: CaloZone, mode: GridMode) -> Self {
        let (x0, x1) = zone.x_range();
        let (y0, y1) = zone.y_range();
        let name = format!("{name}_{}", zone.name());
        Self {
            title: name.clone(),
            name,
            layout: Layout::Calo(zone),
            mode,
            x_axis: Axis::integer(x0, x1),
            y_axis: Axis::integer(y0, y1),
        }
    }

    /// 1-D distribution: `x_axis` bins, one y bin, count mode.
    pub fn distribution(name: impl Into<String>, x_axis: Axis) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            layout: Layout::Distribution,
            mode: GridMode::Count,
            x_axis,
            y_axis: Axis::single(),
        }
    }

    /// Replace the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Number of cells.
    pub fn n_cells(&self) -> usize {
        self.x_axis.bins * self.y_axis.bins
    }

    /// Human-readable location of the cell at flat index `idx`.
    pub fn cell_label(&self, idx: usize) -> String {
        let (ix, iy) = (idx % self.x_axis.bins, idx / self.x_axis.bins);
        match self.layout {
            Layout::Distribution => {
                let a = &self.x_axis;
                format!("bin {ix} [{:.4}, {:.4})", a.bin_low(ix), a.bin_low(ix + 1))
            }
            layout => layout
                .cell_label(self.x_axis.bin_coordinate(ix), self.y_axis.bin_coordinate(iy)),
        }
    }
}

/// A finalised, immutable grid. Cells are stored row-major:
/// `index = iy * nx + ix`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Construction parameters.
    pub spec: GridSpec,
    /// Raw fill count per cell.
    pub counts: Vec<u64>,
    /// Cell value (count or mean, after any rescaling).
    pub values: Vec<f64>,
    /// Cell uncertainty (Poisson or standard error of the mean).
    pub errors: Vec<f64>,
    /// Fills that landed inside the grid.
    pub entries: u64,
    /// Fills rejected as outside the axis ranges.
    pub out_of_range: u64,
    /// Factor applied by [`Grid::scaled`] (1 when never rescaled).
    pub scale: f64,
}

impl Grid {
    /// Grid name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Grid mode.
    pub fn mode(&self) -> GridMode {
        self.spec.mode
    }

    /// Cell layout.
    pub fn layout(&self) -> Layout {
        self.spec.layout
    }

    /// Bins along x.
    pub fn nx(&self) -> usize {
        self.spec.x_axis.bins
    }

    /// Bins along y.
    pub fn ny(&self) -> usize {
        self.spec.y_axis.bins
    }

    /// Number of cells.
    pub fn n_cells(&self) -> usize {
        self.values.len()
    }

    /// `true` for a single-row grid (1-D distribution).
    pub fn is_1d(&self) -> bool {
        self.ny() == 1
    }

    /// Whether `other` has identical axes.
    pub fn same_shape(&self, other: &Grid) -> bool {
        self.spec.x_axis == other.spec.x_axis && self.spec.y_axis == other.spec.y_axis
    }

    /// Flat index of cell `(ix, iy)`.
    pub fn index(&self, ix: usize, iy: usize) -> usize {
        iy * self.nx() + ix
    }

    /// `(ix, iy)` of a flat index.
    pub fn cell(&self, idx: usize) -> (usize, usize) {
        (idx % self.nx(), idx / self.nx())
    }

    /// Value at map coordinates, `None` outside the grid.
    pub fn value_at(&self, x: i32, y: i32) -> Option<f64> {
        self.coord_index(x, y).map(|i| self.values[i])
    }

    /// Error at map coordinates, `None` outside the grid.
    pub fn error_at(&self, x: i32, y: i32) -> Option<f64> {
        self.coord_index(x, y).map(|i| self.errors[i])
    }

    /// Count at map coordinates, `None` outside the grid.
    pub fn count_at(&self, x: i32, y: i32) -> Option<u64> {
        self.coord_index(x, y).map(|i| self.counts[i])
    }

    fn coord_index(&self, x: i32, y: i32) -> Option<usize> {
        let ix = self.spec.x_axis.find_bin(f64::from(x))?;
        let iy = self.spec.y_axis.find_bin(f64::from(y))?;
        Some(self.index(ix, iy))
    }

    /// Sum of cell values.
    pub fn total(&self) -> f64 {
        self.values.iter().filter(|v| v.is_finite()).sum()
    }

    /// Human-readable location of a cell.
    pub fn cell_label(&self, idx: usize) -> String {
        self.spec.cell_label(idx)
    }

    /// Rescale values and errors by `factor`.
    ///
    /// Only count-mode grids are rescaled; an average does not depend on the
    /// number of events, so average-mode grids come back unchanged.
    pub fn scaled(mut self, factor: f64) -> Self {
        if self.spec.mode == GridMode::Average {
            tracing::debug!(grid = %self.spec.name, "average-mode grid is not rescaled");
            return self;
        }
        for v in &mut self.values {
            *v *= factor;
        }
        for e in &mut self.errors {
            *e *= factor;
        }
        self.scale *= factor;
        self
    }
}
