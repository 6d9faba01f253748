//! Shared constants: octree limits, record sizes and classification codes.

/// Deepest octree level. 17 levels of 3-bit octant codes plus an 8-bit level
/// tag fit in a u64 key.
pub const OCTREE_MAX_LEVEL: usize = 17;

/// Number of u64 words in one serialized octree node.
pub const NODE_WORDS: usize = 11;

/// Bytes per serialized octree node.
pub const NODE_SIZE: usize = NODE_WORDS * 8;

/// Default page cache capacity, in pages.
pub const DEFAULT_CACHE_SIZE: usize = 200;

/// Number of distinct classification codes.
pub const CLASSIFICATION_MAX: usize = 256;

/// Sentinel for a point that has no voxel assigned.
pub const VOXEL_NONE: u64 = u64::MAX;

/// ASPRS LAS classification codes used by the engine.
pub mod class {
  pub const NEVER_CLASSIFIED: u8 = 0;
  pub const UNASSIGNED: u8 = 1;
  pub const GROUND: u8 = 2;
  pub const LOW_VEGETATION: u8 = 3;
  pub const MEDIUM_VEGETATION: u8 = 4;
  pub const HIGH_VEGETATION: u8 = 5;
  pub const BUILDING: u8 = 6;
  pub const LOW_POINT: u8 = 7;
  pub const WATER: u8 = 9;
}
