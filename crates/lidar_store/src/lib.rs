//! lidar_store - Out-of-core point cloud storage and processing
//!
//! Large LiDAR point clouds are kept on disk, each dataset next to an octree
//! index whose nodes map to contiguous point ranges. Queries walk only the
//! pages they need through a bounded LRU page cache, so datasets far larger
//! than memory can be classified and edited in place.
//!
//! # Features
//!
//! - **Spatial index**: loose octree over a fixed boundary with breadth-first
//!   or leaves-only layouts, serialized as a versioned chunk
//! - **Page cache**: LRU cache of decoded columnar pages with write-back of
//!   modified pages on eviction and flush
//! - **Queries**: box, cone and sphere predicates plus attribute masks,
//!   resumable point-by-point iteration with in-place modification
//! - **Grid iteration**: Morton-ordered tiling of the clip footprint
//! - **Progressive algorithms**: time-boxed ground classification and
//!   elevation computation, optionally on a background worker
//!
//! # Example
//!
//! ```ignore
//! use lidar_store::{Action, Database, GroundClassification, GroundParameters};
//!
//! let mut db = Database::default();
//! db.open_dataset("plot.pts")?;
//!
//! let mut ground = GroundClassification::new(GroundParameters::default());
//! ground.run(&mut db)?;
//! db.close()?;
//! ```

pub mod constants;
pub mod config;
pub mod error;

pub use config::{EngineConfig, IndexConfig};
pub use error::{ErrorKind, Result, StoreError};

// Geometric predicates
pub mod geometry;
pub use geometry::{Aabb, Cone, Shape, Sphere};

// Chunked file format and point storage
pub mod io;
pub use io::{PointRecord, PointStorage};

// Octree over point ranges
pub mod index;
pub use index::{Node, Selection, SpatialIndex};

pub mod dataset;
pub use dataset::{Dataset, DatasetBuilder, Datasets};

pub mod view;
pub use view::{ColorSource, ViewSettings};

// LRU page cache
pub mod cache;
pub use cache::{Page, PageCache, PageKey, PageState};

pub mod database;
pub use database::{ChangeEvent, Database, SharedDatabase};

pub mod query;
pub use query::{PointMut, PointRef, Query, Where};

pub mod grid;
pub use grid::GridIterator;

// Time-boxed algorithms and the background worker
pub mod algorithm;
pub use algorithm::{
  Action, ActionWorker, ElevationComputation, GroundClassification, GroundParameters,
  ProgressCounter, StepOutcome, WorkerEvent,
};
