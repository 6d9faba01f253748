//! Indexed point sets.
//!
//! A [`Dataset`] pairs a [`SpatialIndex`] with the storage holding its points
//! in index order, so every node's page range is one contiguous read.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::IndexConfig;
use crate::error::{Result, StoreError};
use crate::geometry::Aabb;
use crate::index::{Node, SpatialIndex};
use crate::io::{MemoryStorage, PointFile, PointRecord, PointStorage};

/// File extension of the point chunk.
pub const POINT_FILE_EXTENSION: &str = "pts";
/// File extension of the index chunk stored next to the points.
pub const INDEX_FILE_EXTENSION: &str = "idx";

pub struct Dataset {
  id: u64,
  label: String,
  path: Option<PathBuf>,
  enabled: bool,
  index: SpatialIndex,
  storage: Box<dyn PointStorage>,
}

impl Dataset {
  /// Pair an index with its storage. Fails if they disagree on the point count.
  pub fn new(
    id: u64,
    label: impl Into<String>,
    index: SpatialIndex,
    storage: Box<dyn PointStorage>,
  ) -> Result<Self> {
    if index.point_count() != storage.len() {
      return Err(StoreError::format(format!(
        "index covers {} points but storage holds {}",
        index.point_count(),
        storage.len()
      )));
    }
    Ok(Self {
      id,
      label: label.into(),
      path: None,
      enabled: true,
      index,
      storage,
    })
  }

  /// Open `<path>.pts` and its sibling `<path>.idx`.
  pub fn open(id: u64, path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().with_extension(POINT_FILE_EXTENSION);
    let storage = PointFile::open(&path)?;
    let index = SpatialIndex::read(path.with_extension(INDEX_FILE_EXTENSION))?;
    let label = path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default();

    let mut dataset = Self::new(id, label, index, Box::new(storage))?;
    info!(id, points = dataset.point_count(), path = %path.display(), "dataset opened");
    dataset.path = Some(path);
    Ok(dataset)
  }

  #[inline]
  pub fn id(&self) -> u64 {
    self.id
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  #[inline]
  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
  }

  #[inline]
  pub fn index(&self) -> &SpatialIndex {
    &self.index
  }

  #[inline]
  pub fn boundary(&self) -> &Aabb {
    self.index.boundary()
  }

  pub fn point_count(&self) -> u64 {
    self.storage.len()
  }

  fn page_node(&self, node: usize) -> Result<Node> {
    self.index.try_node(node).copied()
  }

  /// Read the page range of `node` into `out`.
  pub fn read_page(&mut self, node: usize, out: &mut Vec<PointRecord>) -> Result<()> {
    let node = self.page_node(node)?;
    self.storage.read_points(node.from, node.size as usize, out)
  }

  /// Write back the page range of `node`.
  pub fn write_page(&mut self, node: usize, points: &[PointRecord]) -> Result<()> {
    let Node { from, size, .. } = self.page_node(node)?;
    if points.len() as u64 != size {
      return Err(StoreError::invariant(format!(
        "page of node {node} has {} points, expected {size}",
        points.len()
      )));
    }
    self.storage.write_points(from, points)
  }

  pub fn flush(&mut self) -> Result<()> {
    self.storage.flush()
  }
}

/// Builds a dataset from unordered points.
#[derive(Clone, Debug, Default)]
pub struct DatasetBuilder {
  config: IndexConfig,
  boundary: Option<Aabb>,
}

impl DatasetBuilder {
  pub fn new(config: IndexConfig) -> Self {
    Self {
      config,
      boundary: None,
    }
  }

  /// Index over `boundary` instead of the points' own extent. The boundary is
  /// still grown to contain every point.
  pub fn with_boundary(mut self, boundary: Aabb) -> Self {
    self.boundary = Some(boundary);
    self
  }

  /// Build the index and return the points sorted into page order.
  pub fn build(&self, points: Vec<PointRecord>) -> (SpatialIndex, Vec<PointRecord>) {
    let extent = Aabb::from_points(points.iter().map(|p| p.position));
    let boundary = match self.boundary {
      Some(boundary) => boundary.union(&extent),
      None => extent,
    };

    let mut index = SpatialIndex::new();
    index.insert_begin(
      boundary,
      self.config.max_size,
      self.config.max_level,
      self.config.leaves_only,
    );
    let keys: Vec<u64> = points.iter().map(|p| index.insert(p.position)).collect();
    index.insert_end();

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by_key(|&i| keys[i]);
    let sorted = order.into_iter().map(|i| points[i]).collect();
    (index, sorted)
  }

  /// Build a dataset kept entirely in memory.
  pub fn build_in_memory(
    &self,
    id: u64,
    label: impl Into<String>,
    points: Vec<PointRecord>,
  ) -> Result<Dataset> {
    let (index, points) = self.build(points);
    Dataset::new(id, label, index, Box::new(MemoryStorage::new(points)))
  }

  /// Write `<path>.pts` and `<path>.idx`, then open the result.
  pub fn create(&self, id: u64, path: impl AsRef<Path>, points: Vec<PointRecord>) -> Result<Dataset> {
    let path = path.as_ref().with_extension(POINT_FILE_EXTENSION);
    let (index, points) = self.build(points);
    index.write(path.with_extension(INDEX_FILE_EXTENSION))?;
    drop(PointFile::create(&path, &points)?);
    Dataset::open(id, &path)
  }
}

/// The datasets loaded into a database.
#[derive(Default)]
pub struct Datasets {
  datasets: Vec<Dataset>,
}

impl Datasets {
  pub fn len(&self) -> usize {
    self.datasets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.datasets.is_empty()
  }

  pub fn insert(&mut self, dataset: Dataset) -> Result<()> {
    if self.get(dataset.id()).is_some() {
      return Err(StoreError::invariant(format!(
        "dataset id {} is already in use",
        dataset.id()
      )));
    }
    self.datasets.push(dataset);
    Ok(())
  }

  pub fn remove(&mut self, id: u64) -> Option<Dataset> {
    let position = self.datasets.iter().position(|d| d.id() == id)?;
    Some(self.datasets.remove(position))
  }

  pub fn get(&self, id: u64) -> Option<&Dataset> {
    self.datasets.iter().find(|d| d.id() == id)
  }

  pub fn get_mut(&mut self, id: u64) -> Option<&mut Dataset> {
    self.datasets.iter_mut().find(|d| d.id() == id)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Dataset> {
    self.datasets.iter()
  }

  pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Dataset> {
    self.datasets.iter_mut()
  }

  /// Union of the enabled datasets' boundaries.
  pub fn boundary(&self) -> Aabb {
    self
      .iter()
      .filter(|d| d.is_enabled())
      .fold(Aabb::EMPTY, |acc, d| acc.union(d.boundary()))
  }

  /// Points in the enabled datasets.
  pub fn point_count(&self) -> u64 {
    self
      .iter()
      .filter(|d| d.is_enabled())
      .map(Dataset::point_count)
      .sum()
  }

  /// Next unused dataset id.
  pub fn next_id(&self) -> u64 {
    self.iter().map(|d| d.id() + 1).max().unwrap_or(0)
  }
}

#[cfg(test)]
#[path = "dataset_test.rs"]
mod dataset_test;
