//! Typed, versioned binary sections.
//!
//! Each chunk starts with a fixed 24-byte header:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | signature (`u32`) |
//! | 4 | 1 | major version |
//! | 5 | 1 | minor version |
//! | 6 | 2 | reserved |
//! | 8 | 8 | header length (`u64`) |
//! | 16 | 8 | data length (`u64`) |
//!
//! The chunk's own header of `header_length` bytes follows, then
//! `data_length` bytes of payload.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::{get_u64, put_u64};
use crate::error::{Result, StoreError};

/// Size of the generic chunk header.
pub const CHUNK_HEADER_SIZE: usize = 24;

/// Generic chunk header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Chunk {
  pub signature: u32,
  pub major_version: u8,
  pub minor_version: u8,
  pub header_length: u64,
  pub data_length: u64,
}

impl Chunk {
  pub fn new(signature: u32, major_version: u8, minor_version: u8) -> Self {
    Self {
      signature,
      major_version,
      minor_version,
      header_length: 0,
      data_length: 0,
    }
  }

  /// Total bytes after the generic header.
  #[inline]
  pub fn payload_length(&self) -> u64 {
    self.header_length + self.data_length
  }

  pub fn encode(&self) -> [u8; CHUNK_HEADER_SIZE] {
    let mut buf = [0u8; CHUNK_HEADER_SIZE];
    buf[0..4].copy_from_slice(&self.signature.to_le_bytes());
    buf[4] = self.major_version;
    buf[5] = self.minor_version;
    put_u64(&mut buf, 8, self.header_length);
    put_u64(&mut buf, 16, self.data_length);
    buf
  }

  pub fn decode(buf: &[u8; CHUNK_HEADER_SIZE]) -> Self {
    Self {
      signature: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
      major_version: buf[4],
      minor_version: buf[5],
      header_length: get_u64(buf, 8),
      data_length: get_u64(buf, 16),
    }
  }

  /// Check the signature and major version.
  ///
  /// Newer minor versions are accepted; readers skip header bytes they do not
  /// understand.
  pub fn validate(&self, signature: u32, major_version: u8, minor_version: u8) -> Result<()> {
    if self.signature != signature {
      return Err(StoreError::format(format!(
        "chunk signature {:#010x} does not match expected {:#010x} ({})",
        self.signature,
        signature,
        signature_name(signature)
      )));
    }
    if self.major_version != major_version {
      return Err(StoreError::format(format!(
        "{} chunk version {}.{} is not supported, expected {}.{}",
        signature_name(signature),
        self.major_version,
        self.minor_version,
        major_version,
        minor_version
      )));
    }
    Ok(())
  }
}

/// Printable form of a chunk signature, e.g. `IDX8`.
pub fn signature_name(signature: u32) -> String {
  signature
    .to_le_bytes()
    .iter()
    .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
    .collect()
}

/// A stream of chunks over any seekable byte source.
///
/// Files are the common case; tests use `std::io::Cursor<Vec<u8>>`.
pub struct ChunkFile<F = File> {
  inner: F,
}

impl ChunkFile<File> {
  /// Open an existing file for reading and writing.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .open(path)
      .map_err(|e| StoreError::io(format!("opening {}", path.display()), e))?;
    Ok(Self::new(file))
  }

  /// Open an existing file read-only.
  pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let file =
      File::open(path).map_err(|e| StoreError::io(format!("opening {}", path.display()), e))?;
    Ok(Self::new(file))
  }

  /// Create or truncate a file.
  pub fn create(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(true)
      .open(path)
      .map_err(|e| StoreError::io(format!("creating {}", path.display()), e))?;
    Ok(Self::new(file))
  }
}

impl<F: Read + Write + Seek> ChunkFile<F> {
  pub fn new(inner: F) -> Self {
    Self { inner }
  }

  pub fn into_inner(self) -> F {
    self.inner
  }

  /// Read the next generic chunk header.
  pub fn read_chunk(&mut self) -> Result<Chunk> {
    let mut buf = [0u8; CHUNK_HEADER_SIZE];
    self.read_exact(&mut buf)?;
    Ok(Chunk::decode(&buf))
  }

  pub fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
    self.write_all(&chunk.encode())
  }

  pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
    self.inner.read_exact(buf)?;
    Ok(())
  }

  pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
    self
      .inner
      .write_all(buf)
      .map_err(|e| StoreError::io("writing chunk", e))
  }

  /// Skip `n` bytes forward.
  pub fn skip(&mut self, n: u64) -> Result<()> {
    let n = i64::try_from(n).map_err(|_| StoreError::format("chunk length overflow"))?;
    self
      .inner
      .seek(SeekFrom::Current(n))
      .map_err(|e| StoreError::io("seeking in chunk", e))?;
    Ok(())
  }

  pub fn seek(&mut self, position: u64) -> Result<()> {
    self
      .inner
      .seek(SeekFrom::Start(position))
      .map_err(|e| StoreError::io("seeking in chunk file", e))?;
    Ok(())
  }

  pub fn position(&mut self) -> Result<u64> {
    self
      .inner
      .stream_position()
      .map_err(|e| StoreError::io("querying chunk file position", e))
  }

  /// Bytes between the current position and the end of the stream.
  pub fn remaining(&mut self) -> Result<u64> {
    let position = self.position()?;
    let end = self
      .inner
      .seek(SeekFrom::End(0))
      .map_err(|e| StoreError::io("seeking to end of chunk file", e))?;
    self.seek(position)?;
    Ok(end.saturating_sub(position))
  }

  pub fn flush(&mut self) -> Result<()> {
    self
      .inner
      .flush()
      .map_err(|e| StoreError::io("flushing chunk file", e))
  }
}

#[cfg(test)]
#[path = "chunk_test.rs"]
mod chunk_test;
