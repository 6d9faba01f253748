//! Fixed-size point records and their storage backends.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::DVec3;

use super::chunk::{Chunk, ChunkFile, CHUNK_HEADER_SIZE};
use super::{get_f64, get_u16, get_u32, get_u64, put_f64, put_u16, put_u32, put_u64};
use crate::constants::VOXEL_NONE;
use crate::error::{Result, StoreError};

/// "PNT1" point chunk signature.
pub const POINT_CHUNK_SIGNATURE: u32 = 0x31544E50;
pub const POINT_CHUNK_MAJOR_VERSION: u8 = 1;
pub const POINT_CHUNK_MINOR_VERSION: u8 = 0;

/// Point chunk header: `point_count: u64`, `record_size: u64`.
const POINT_CHUNK_HEADER_SIZE: usize = 16;

/// Bytes per encoded point record.
pub const POINT_RECORD_SIZE: usize = 80;

/// One point with every attribute the engine stores.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointRecord {
  pub position: DVec3,
  pub gps_time: f64,
  pub elevation: f64,
  pub voxel: u64,
  pub layer: u32,
  pub descriptor: f32,
  pub intensity: u16,
  pub color: [u16; 3],
  pub user_color: [u16; 3],
  pub return_number: u8,
  pub number_of_returns: u8,
  pub classification: u8,
  pub user_data: u8,
}

impl PointRecord {
  pub fn new(position: DVec3) -> Self {
    Self {
      position,
      ..Self::default()
    }
  }

  pub fn with_classification(mut self, classification: u8) -> Self {
    self.classification = classification;
    self
  }

  pub fn encode(&self, buf: &mut [u8]) {
    put_f64(buf, 0, self.position.x);
    put_f64(buf, 8, self.position.y);
    put_f64(buf, 16, self.position.z);
    put_f64(buf, 24, self.gps_time);
    put_f64(buf, 32, self.elevation);
    put_u64(buf, 40, self.voxel);
    put_u32(buf, 48, self.layer);
    put_u32(buf, 52, self.descriptor.to_bits());
    put_u16(buf, 56, self.intensity);
    for i in 0..3 {
      put_u16(buf, 58 + 2 * i, self.color[i]);
      put_u16(buf, 64 + 2 * i, self.user_color[i]);
    }
    buf[70] = self.return_number;
    buf[71] = self.number_of_returns;
    buf[72] = self.classification;
    buf[73] = self.user_data;
    buf[74..POINT_RECORD_SIZE].fill(0);
  }

  pub fn decode(buf: &[u8]) -> Self {
    let mut color = [0u16; 3];
    let mut user_color = [0u16; 3];
    for i in 0..3 {
      color[i] = get_u16(buf, 58 + 2 * i);
      user_color[i] = get_u16(buf, 64 + 2 * i);
    }
    Self {
      position: DVec3::new(get_f64(buf, 0), get_f64(buf, 8), get_f64(buf, 16)),
      gps_time: get_f64(buf, 24),
      elevation: get_f64(buf, 32),
      voxel: get_u64(buf, 40),
      layer: get_u32(buf, 48),
      descriptor: f32::from_bits(get_u32(buf, 52)),
      intensity: get_u16(buf, 56),
      color,
      user_color,
      return_number: buf[70],
      number_of_returns: buf[71],
      classification: buf[72],
      user_data: buf[73],
    }
  }
}

impl Default for PointRecord {
  fn default() -> Self {
    Self {
      position: DVec3::ZERO,
      gps_time: 0.0,
      elevation: 0.0,
      voxel: VOXEL_NONE,
      layer: 0,
      descriptor: 0.0,
      intensity: 0,
      color: [0; 3],
      user_color: [0; 3],
      return_number: 1,
      number_of_returns: 1,
      classification: 0,
      user_data: 0,
    }
  }
}

/// Random access to a dataset's points in index order.
pub trait PointStorage: Send {
  /// Number of stored points.
  fn len(&self) -> u64;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Replace `out` with `count` points starting at `from`.
  fn read_points(&mut self, from: u64, count: usize, out: &mut Vec<PointRecord>) -> Result<()>;

  /// Overwrite points starting at `from`.
  fn write_points(&mut self, from: u64, points: &[PointRecord]) -> Result<()>;

  fn flush(&mut self) -> Result<()> {
    Ok(())
  }
}

fn check_range(from: u64, count: usize, len: u64) -> Result<()> {
  match from.checked_add(count as u64) {
    Some(end) if end <= len => Ok(()),
    _ => Err(StoreError::invariant(format!(
      "point range {from}+{count} exceeds {len} stored points"
    ))),
  }
}

/// Points stored in a "PNT1" chunk file.
pub struct PointFile {
  file: ChunkFile<File>,
  data_offset: u64,
  count: u64,
  buffer: Vec<u8>,
}

impl PointFile {
  /// Write `points` to a new file at `path`.
  pub fn create(path: impl AsRef<Path>, points: &[PointRecord]) -> Result<Self> {
    let mut file = ChunkFile::create(path)?;
    let count = points.len() as u64;

    let mut chunk = Chunk::new(
      POINT_CHUNK_SIGNATURE,
      POINT_CHUNK_MAJOR_VERSION,
      POINT_CHUNK_MINOR_VERSION,
    );
    chunk.header_length = POINT_CHUNK_HEADER_SIZE as u64;
    chunk.data_length = count * POINT_RECORD_SIZE as u64;
    file.write_chunk(&chunk)?;

    let mut header = [0u8; POINT_CHUNK_HEADER_SIZE];
    put_u64(&mut header, 0, count);
    put_u64(&mut header, 8, POINT_RECORD_SIZE as u64);
    file.write_all(&header)?;

    let mut buffer = vec![0u8; points.len() * POINT_RECORD_SIZE];
    for (point, record) in points.iter().zip(buffer.chunks_exact_mut(POINT_RECORD_SIZE)) {
      point.encode(record);
    }
    file.write_all(&buffer)?;
    file.flush()?;

    Ok(Self {
      file,
      data_offset: (CHUNK_HEADER_SIZE + POINT_CHUNK_HEADER_SIZE) as u64,
      count,
      buffer: Vec::new(),
    })
  }

  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let mut file = ChunkFile::open(path)?;
    let chunk = file.read_chunk()?;
    chunk.validate(
      POINT_CHUNK_SIGNATURE,
      POINT_CHUNK_MAJOR_VERSION,
      POINT_CHUNK_MINOR_VERSION,
    )?;
    if chunk.header_length < POINT_CHUNK_HEADER_SIZE as u64 {
      return Err(StoreError::format(format!(
        "point chunk header has {} bytes, expected {POINT_CHUNK_HEADER_SIZE}",
        chunk.header_length
      )));
    }

    let mut header = [0u8; POINT_CHUNK_HEADER_SIZE];
    file.read_exact(&mut header)?;
    let count = get_u64(&header, 0);
    let record_size = get_u64(&header, 8);
    if record_size != POINT_RECORD_SIZE as u64 {
      return Err(StoreError::format(format!(
        "point record size {record_size} is not supported"
      )));
    }
    if count.checked_mul(record_size) != Some(chunk.data_length) {
      return Err(StoreError::format("point chunk data length does not match point count"));
    }
    let extra_header = chunk.header_length - POINT_CHUNK_HEADER_SIZE as u64;
    let available = file.remaining()?.saturating_sub(extra_header);
    if chunk.data_length > available {
      return Err(StoreError::format(format!(
        "point chunk declares {} data bytes but only {available} remain",
        chunk.data_length
      )));
    }

    Ok(Self {
      file,
      data_offset: CHUNK_HEADER_SIZE as u64 + chunk.header_length,
      count,
      buffer: Vec::new(),
    })
  }
}

impl PointStorage for PointFile {
  fn len(&self) -> u64 {
    self.count
  }

  fn read_points(&mut self, from: u64, count: usize, out: &mut Vec<PointRecord>) -> Result<()> {
    check_range(from, count, self.count)?;
    self.buffer.resize(count * POINT_RECORD_SIZE, 0);
    self
      .file
      .seek(self.data_offset + from * POINT_RECORD_SIZE as u64)?;
    self.file.read_exact(&mut self.buffer)?;
    out.clear();
    out.extend(
      self
        .buffer
        .chunks_exact(POINT_RECORD_SIZE)
        .map(PointRecord::decode),
    );
    Ok(())
  }

  fn write_points(&mut self, from: u64, points: &[PointRecord]) -> Result<()> {
    check_range(from, points.len(), self.count)?;
    self.buffer.resize(points.len() * POINT_RECORD_SIZE, 0);
    for (point, record) in points
      .iter()
      .zip(self.buffer.chunks_exact_mut(POINT_RECORD_SIZE))
    {
      point.encode(record);
    }
    self
      .file
      .seek(self.data_offset + from * POINT_RECORD_SIZE as u64)?;
    self.file.write_all(&self.buffer)
  }

  fn flush(&mut self) -> Result<()> {
    self.file.flush()
  }
}

/// Read and write counters shared with a [`MemoryStorage`].
#[derive(Debug, Default)]
pub struct StorageStats {
  reads: AtomicUsize,
  writes: AtomicUsize,
}

impl StorageStats {
  pub fn reads(&self) -> usize {
    self.reads.load(Ordering::Relaxed)
  }

  pub fn writes(&self) -> usize {
    self.writes.load(Ordering::Relaxed)
  }
}

/// Points held in memory. Used for scratch datasets and tests.
#[derive(Default)]
pub struct MemoryStorage {
  points: Vec<PointRecord>,
  stats: Arc<StorageStats>,
}

impl MemoryStorage {
  pub fn new(points: Vec<PointRecord>) -> Self {
    Self {
      points,
      stats: Arc::default(),
    }
  }

  /// Counters that stay observable after the storage moves into a dataset.
  pub fn stats(&self) -> Arc<StorageStats> {
    Arc::clone(&self.stats)
  }

  pub fn points(&self) -> &[PointRecord] {
    &self.points
  }
}

impl PointStorage for MemoryStorage {
  fn len(&self) -> u64 {
    self.points.len() as u64
  }

  fn read_points(&mut self, from: u64, count: usize, out: &mut Vec<PointRecord>) -> Result<()> {
    check_range(from, count, self.len())?;
    self.stats.reads.fetch_add(1, Ordering::Relaxed);
    let from = from as usize;
    out.clear();
    out.extend_from_slice(&self.points[from..from + count]);
    Ok(())
  }

  fn write_points(&mut self, from: u64, points: &[PointRecord]) -> Result<()> {
    check_range(from, points.len(), self.len())?;
    self.stats.writes.fetch_add(1, Ordering::Relaxed);
    let from = from as usize;
    self.points[from..from + points.len()].copy_from_slice(points);
    Ok(())
  }
}

#[cfg(test)]
#[path = "point_file_test.rs"]
mod point_file_test;
