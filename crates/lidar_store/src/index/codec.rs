//! "IDX8" chunk (de)serialization.
//!
//! Header: `node_count: u64` and the boundary as six f64 values (min x, y, z
//! then max x, y, z). Data: `node_count` records of 11 u64 words.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use glam::DVec3;
use tracing::debug;

use super::{Node, SpatialIndex};
use crate::constants::{NODE_SIZE, NODE_WORDS};
use crate::error::{Result, StoreError};
use crate::geometry::Aabb;
use crate::io::chunk::{Chunk, ChunkFile};
use crate::io::{get_f64, get_u64, put_f64, put_u64};

/// "IDX8" little-endian.
pub const INDEX_CHUNK_SIGNATURE: u32 = 0x38584449;
pub const INDEX_CHUNK_MAJOR_VERSION: u8 = 1;
pub const INDEX_CHUNK_MINOR_VERSION: u8 = 0;

/// Size of the version 1.0 index header.
pub const INDEX_HEADER_SIZE: usize = 56;

impl SpatialIndex {
  pub fn read(path: impl AsRef<Path>) -> Result<Self> {
    let mut file: ChunkFile<File> = ChunkFile::open_read(path)?;
    let chunk = file.read_chunk()?;
    Self::read_chunk(&mut file, &chunk)
  }

  pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
    let mut file = ChunkFile::create(path)?;
    self.write_chunk(&mut file)?;
    file.flush()
  }

  /// Decode the index from `file`, positioned after the generic `chunk` header.
  pub fn read_chunk<F: Read + Write + Seek>(file: &mut ChunkFile<F>, chunk: &Chunk) -> Result<Self> {
    chunk.validate(
      INDEX_CHUNK_SIGNATURE,
      INDEX_CHUNK_MAJOR_VERSION,
      INDEX_CHUNK_MINOR_VERSION,
    )?;
    if chunk.header_length < INDEX_HEADER_SIZE as u64 {
      return Err(StoreError::format(format!(
        "index header has {} bytes, expected {INDEX_HEADER_SIZE}",
        chunk.header_length
      )));
    }

    let mut header = [0u8; INDEX_HEADER_SIZE];
    file.read_exact(&mut header)?;
    file.skip(chunk.header_length - INDEX_HEADER_SIZE as u64)?;

    let node_count = get_u64(&header, 0);
    let boundary = Aabb {
      min: DVec3::new(get_f64(&header, 8), get_f64(&header, 16), get_f64(&header, 24)),
      max: DVec3::new(get_f64(&header, 32), get_f64(&header, 40), get_f64(&header, 48)),
    };

    let data_length = node_count
      .checked_mul(NODE_SIZE as u64)
      .filter(|&len| len == chunk.data_length)
      .ok_or_else(|| StoreError::format("index data length does not match node count"))?;
    let available = file.remaining()?;
    if data_length > available {
      return Err(StoreError::format(format!(
        "index declares {data_length} data bytes but only {available} remain"
      )));
    }

    let mut data = vec![0u8; data_length as usize];
    file.read_exact(&mut data)?;

    let nodes = data
      .chunks_exact(NODE_SIZE)
      .map(|record| {
        let mut words = [0u64; NODE_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
          *word = get_u64(record, i * 8);
        }
        Node::from_words(&words)
      })
      .collect();

    let index = Self {
      nodes,
      boundary,
      build: None,
    };
    index.validate_links()?;
    debug!(nodes = index.len(), "octree read");
    Ok(index)
  }

  pub fn write_chunk<F: Read + Write + Seek>(&self, file: &mut ChunkFile<F>) -> Result<()> {
    let mut chunk = Chunk::new(
      INDEX_CHUNK_SIGNATURE,
      INDEX_CHUNK_MAJOR_VERSION,
      INDEX_CHUNK_MINOR_VERSION,
    );
    chunk.header_length = INDEX_HEADER_SIZE as u64;
    chunk.data_length = (self.nodes.len() * NODE_SIZE) as u64;
    file.write_chunk(&chunk)?;

    let mut header = [0u8; INDEX_HEADER_SIZE];
    put_u64(&mut header, 0, self.nodes.len() as u64);
    let b = &self.boundary;
    for (i, v) in [b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z]
      .into_iter()
      .enumerate()
    {
      put_f64(&mut header, 8 + i * 8, v);
    }
    file.write_all(&header)?;

    let mut data = vec![0u8; self.nodes.len() * NODE_SIZE];
    for (node, record) in self.nodes.iter().zip(data.chunks_exact_mut(NODE_SIZE)) {
      for (i, word) in node.to_words().into_iter().enumerate() {
        put_u64(record, i * 8, word);
      }
    }
    file.write_all(&data)
  }
}
