//! Footprint grid visited in Morton order.
//!
//! Cells are sized so each holds roughly a target number of points, then
//! ordered along a Z-order curve so consecutive cells touch the same pages.

use tracing::debug;

use crate::database::Database;
use crate::geometry::Aabb;

/// Largest per-axis cell count that fits the 20-bit key fields.
const GRID_AXIS_MAX: usize = 0xfffff;

#[derive(Clone, Debug, Default)]
pub struct GridIterator {
  clip: Aabb,
  x_size: usize,
  y_size: usize,
  cell_x: f64,
  cell_y: f64,
  cells: Vec<u64>,
  index: usize,
}

/// Pack a cell coordinate: `x` in the low 20 bits, `y` in the next 20.
#[inline]
pub fn cell_key(x: usize, y: usize) -> u64 {
  (x as u64 & 0xfffff) | ((y as u64 & 0xfffff) << 20)
}

#[inline]
pub fn cell_coords(key: u64) -> (usize, usize) {
  ((key & 0xfffff) as usize, ((key >> 20) & 0xfffff) as usize)
}

impl GridIterator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build the grid over the database clip footprint.
  pub fn set_grid(&mut self, db: &Database, points_per_cell: u64, cell_min_length_percent: f64) {
    self.configure(
      db.point_count(),
      &db.boundary(),
      &db.clip_boundary(),
      points_per_cell,
      cell_min_length_percent,
    );
  }

  /// Build the grid from explicit inputs.
  ///
  /// Density is `total_points` over the XY area of `boundary`; the grid
  /// covers `clip`.
  pub fn configure(
    &mut self,
    total_points: u64,
    boundary: &Aabb,
    clip: &Aabb,
    points_per_cell: u64,
    cell_min_length_percent: f64,
  ) {
    self.clip = *clip;
    self.cells.clear();
    self.index = 0;
    if clip.is_empty() {
      self.x_size = 0;
      self.y_size = 0;
      return;
    }

    let size = clip.size();
    let area = boundary.size().x * boundary.size().y;
    let clip_area = size.x * size.y;
    let ratio = if area > 0.0 { (clip_area / area).min(1.0) } else { 1.0 };
    let clip_points = total_points as f64 * ratio;
    let cells = (clip_points / points_per_cell.max(1) as f64).ceil().max(1.0);

    let mut length = (clip_area / cells).sqrt();
    let min_length = size.x.min(size.y) * 0.01 * cell_min_length_percent;
    if length < min_length {
      length = min_length;
    }

    let axis_cells = |extent: f64| -> usize {
      if length > 0.0 && length.is_finite() {
        ((extent / length).round() as usize).clamp(1, GRID_AXIS_MAX)
      } else {
        1
      }
    };
    self.x_size = axis_cells(size.x);
    self.y_size = axis_cells(size.y);
    self.cell_x = size.x / self.x_size as f64;
    self.cell_y = size.y / self.y_size as f64;

    self.cells.reserve(self.x_size * self.y_size);
    morton(&mut self.cells, 0, self.x_size, 0, self.y_size);

    debug!(
      x = self.x_size,
      y = self.y_size,
      cell_x = self.cell_x,
      cell_y = self.cell_y,
      "grid configured"
    );
  }

  /// Number of cells.
  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  /// Cells per axis.
  pub fn dimensions(&self) -> (usize, usize) {
    (self.x_size, self.y_size)
  }

  /// Cell keys in visiting order.
  pub fn keys(&self) -> &[u64] {
    &self.cells
  }

  /// World box of the cell at grid coordinate `(x, y)`.
  pub fn cell(&self, x: usize, y: usize) -> Aabb {
    let min_x = self.clip.min.x + self.cell_x * x as f64;
    let min_y = self.clip.min.y + self.cell_y * y as f64;
    // The last column and row end exactly on the footprint edge.
    let max_x = if x + 1 == self.x_size {
      self.clip.max.x
    } else {
      min_x + self.cell_x
    };
    let max_y = if y + 1 == self.y_size {
      self.clip.max.y
    } else {
      min_y + self.cell_y
    };
    Aabb::from_coords(min_x, min_y, self.clip.min.z, max_x, max_y, self.clip.max.z)
  }

  /// Next cell box in Morton order.
  pub fn next_grid(&mut self) -> Option<Aabb> {
    let key = *self.cells.get(self.index)?;
    self.index += 1;
    let (x, y) = cell_coords(key);
    Some(self.cell(x, y))
  }

  /// Cells already returned by `next_grid`.
  pub fn position(&self) -> usize {
    self.index
  }

  pub fn reset(&mut self) {
    self.index = 0;
  }
}

/// Quarter `[x1, x2) × [y1, y2)` until single cells remain.
fn morton(out: &mut Vec<u64>, x1: usize, x2: usize, y1: usize, y2: usize) {
  let dx = x2 - x1;
  let dy = y2 - y1;
  if dx == 0 || dy == 0 {
    return;
  }
  if dx == 1 && dy == 1 {
    out.push(cell_key(x1, y1));
    return;
  }

  let px = x1 + dx / 2;
  let py = y1 + dy / 2;
  morton(out, x1, px, y1, py);
  morton(out, px, x2, y1, py);
  morton(out, x1, px, py, y2);
  morton(out, px, x2, py, y2);
}

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;
