//! The database context: datasets, page cache, view settings and events.
//!
//! Every operation takes the context explicitly. When a background worker is
//! running, share it through [`SharedDatabase`] and follow the protocol:
//! cancel the worker, lock, mutate, unlock, restart the worker.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::info;

use crate::cache::{PageCache, PageKey, PageState};
use crate::config::EngineConfig;
use crate::dataset::{Dataset, DatasetBuilder, Datasets};
use crate::error::Result;
use crate::geometry::Aabb;
use crate::io::PointRecord;
use crate::view::{ColorSource, ViewSettings};

/// What changed in the database.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
  /// Datasets were added, removed, enabled or disabled.
  Datasets,
  /// Clip filter changed.
  Filter,
  /// Color source or value ranges changed.
  Settings,
  /// Point classifications were rewritten.
  Classifications,
  /// Point elevations were recomputed.
  Elevation,
}

/// Fan-out of change events to any number of subscribers.
#[derive(Default)]
pub struct EventQueue {
  subscribers: Vec<Sender<ChangeEvent>>,
}

impl EventQueue {
  pub fn subscribe(&mut self) -> Receiver<ChangeEvent> {
    let (tx, rx) = unbounded();
    self.subscribers.push(tx);
    rx
  }

  /// Deliver `event`; subscribers whose receiver was dropped are forgotten.
  pub fn emit(&mut self, event: ChangeEvent) {
    self.subscribers.retain(|tx| tx.send(event).is_ok());
  }
}

pub struct Database {
  config: EngineConfig,
  datasets: Datasets,
  cache: PageCache,
  view: ViewSettings,
  events: EventQueue,
}

impl Database {
  pub fn new(config: EngineConfig) -> Self {
    Self {
      cache: PageCache::new(config.cache_size_max),
      config,
      datasets: Datasets::default(),
      view: ViewSettings::default(),
      events: EventQueue::default(),
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  // --- datasets ---------------------------------------------------------

  pub fn datasets(&self) -> &Datasets {
    &self.datasets
  }

  pub fn add_dataset(&mut self, dataset: Dataset) -> Result<u64> {
    let id = dataset.id();
    self.datasets.insert(dataset)?;
    self.events.emit(ChangeEvent::Datasets);
    Ok(id)
  }

  /// Open a dataset from disk under the next free id.
  pub fn open_dataset(&mut self, path: impl AsRef<Path>) -> Result<u64> {
    let dataset = Dataset::open(self.datasets.next_id(), path)?;
    self.add_dataset(dataset)
  }

  /// Index `points` with the configured [`IndexConfig`], write them next to
  /// `path` and open the result under the next free id.
  ///
  /// [`IndexConfig`]: crate::config::IndexConfig
  pub fn import_dataset(&mut self, path: impl AsRef<Path>, points: Vec<PointRecord>) -> Result<u64> {
    let dataset = DatasetBuilder::new(self.config.index).create(self.datasets.next_id(), path, points)?;
    info!(id = dataset.id(), points = dataset.point_count(), "dataset imported");
    self.add_dataset(dataset)
  }

  /// Flush pending changes, then drop the dataset and its cached pages.
  pub fn remove_dataset(&mut self, id: u64) -> Result<Option<Dataset>> {
    self.flush()?;
    self.cache.remove_dataset(id);
    let removed = self.datasets.remove(id);
    if removed.is_some() {
      self.events.emit(ChangeEvent::Datasets);
    }
    Ok(removed)
  }

  pub fn set_dataset_enabled(&mut self, id: u64, enabled: bool) {
    if let Some(dataset) = self.datasets.get_mut(id) {
      dataset.set_enabled(enabled);
      self.events.emit(ChangeEvent::Datasets);
    }
  }

  /// Union of the enabled datasets' boundaries.
  pub fn boundary(&self) -> Aabb {
    self.datasets.boundary()
  }

  /// Clip box if one is set, otherwise the full boundary.
  pub fn clip_boundary(&self) -> Aabb {
    self.view.clip.unwrap_or_else(|| self.boundary())
  }

  /// Points in the enabled datasets.
  pub fn point_count(&self) -> u64 {
    self.datasets.point_count()
  }

  // --- view -------------------------------------------------------------

  pub fn view(&self) -> &ViewSettings {
    &self.view
  }

  /// Set or clear the clip box. Cached pages recompute their selection.
  pub fn set_clip_filter(&mut self, clip: Option<Aabb>) {
    self.view.clip = clip;
    self.cache.set_state(PageState::Select);
    self.events.emit(ChangeEvent::Filter);
  }

  pub fn set_color_source(&mut self, source: ColorSource) {
    self.view.color_source = source;
    self.cache.set_state(PageState::RunModifiers);
    self.events.emit(ChangeEvent::Settings);
  }

  pub fn set_elevation_range(&mut self, range: Option<(f64, f64)>) {
    self.view.elevation_range = range;
    self.events.emit(ChangeEvent::Settings);
  }

  pub fn set_descriptor_range(&mut self, range: Option<(f32, f32)>) {
    self.view.descriptor_range = range;
    self.events.emit(ChangeEvent::Settings);
  }

  // --- cache ------------------------------------------------------------

  pub fn cache(&self) -> &PageCache {
    &self.cache
  }

  pub fn cache_mut(&mut self) -> &mut PageCache {
    &mut self.cache
  }

  /// Slot of the page for `key`, loading it if needed.
  pub fn fetch_page(&mut self, key: PageKey) -> Result<usize> {
    self.cache.fetch(key, &mut self.datasets)
  }

  /// Write every modified page.
  pub fn flush(&mut self) -> Result<usize> {
    self.cache.flush(&mut self.datasets)
  }

  /// Flush and release everything. Dropping a database without closing it
  /// discards unflushed page changes.
  pub fn close(mut self) -> Result<()> {
    self.flush()?;
    info!(datasets = self.datasets.len(), "database closed");
    Ok(())
  }

  /// Flush, then drop every cached page.
  pub fn clear_cache(&mut self) -> Result<()> {
    self.flush()?;
    self.cache.clear();
    Ok(())
  }

  /// Drop unflushed page changes without writing them.
  pub fn discard_changes(&mut self) -> usize {
    self.cache.discard_modified()
  }

  /// Advance cached pages through their view work; true while work remains.
  pub fn next_state(&mut self) -> bool {
    self.cache.next_state(&self.view)
  }

  // --- events -----------------------------------------------------------

  pub fn subscribe(&mut self) -> Receiver<ChangeEvent> {
    self.events.subscribe()
  }

  pub fn emit(&mut self, event: ChangeEvent) {
    self.events.emit(event);
  }
}

impl Default for Database {
  fn default() -> Self {
    Self::new(EngineConfig::default())
  }
}

/// Shared handle for the UI side and the background worker.
#[derive(Clone, Default)]
pub struct SharedDatabase {
  inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
  pub fn new(database: Database) -> Self {
    Self {
      inner: Arc::new(Mutex::new(database)),
    }
  }

  /// Acquire the database for one critical section.
  ///
  /// A panic in another holder does not make the data unusable; the guard is
  /// recovered from a poisoned lock.
  pub fn lock(&self) -> MutexGuard<'_, Database> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
#[path = "database_test.rs"]
mod database_test;
