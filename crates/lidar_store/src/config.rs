//! Engine configuration: octree build parameters, cache size and step budget.

use std::time::Duration;

use crate::constants::{DEFAULT_CACHE_SIZE, OCTREE_MAX_LEVEL};

/// Parameters for building a dataset's spatial index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexConfig {
  /// Points a node keeps before further points descend into children.
  /// Ignored in leaves-only mode.
  pub max_size: u64,
  /// Maximum tree depth. 0 or anything above 17 means 17.
  pub max_level: usize,
  /// Only the deepest nodes own points (depth-first layout).
  pub leaves_only: bool,
}

impl IndexConfig {
  /// Breadth-first layout with moderately sized pages.
  pub const DEFAULT: Self = Self {
    max_size: 10_000,
    max_level: OCTREE_MAX_LEVEL,
    leaves_only: false,
  };

  /// Depth-first layout where every point lives at `max_level - 1`.
  pub const LEAVES_ONLY: Self = Self {
    max_size: 0,
    max_level: 8,
    leaves_only: true,
  };

  /// `max_level` after clamping to the supported range.
  #[inline]
  pub fn clamped_max_level(&self) -> usize {
    clamp_max_level(self.max_level)
  }
}

impl Default for IndexConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Clamp a requested octree depth to `1..=OCTREE_MAX_LEVEL`; 0 means maximum.
#[inline]
pub fn clamp_max_level(max_level: usize) -> usize {
  if max_level == 0 || max_level > OCTREE_MAX_LEVEL {
    OCTREE_MAX_LEVEL
  } else {
    max_level
  }
}

/// Top-level engine settings.
#[derive(Clone, Debug)]
pub struct EngineConfig {
  /// Maximum number of decoded pages held by the cache.
  pub cache_size_max: usize,
  /// Wall-clock budget for a single progressive algorithm step.
  pub step_budget: Duration,
  /// Index parameters for [`crate::Database::import_dataset`].
  pub index: IndexConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      cache_size_max: DEFAULT_CACHE_SIZE,
      step_budget: Duration::from_millis(250),
      index: IndexConfig::DEFAULT,
    }
  }
}
