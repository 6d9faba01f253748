//! Binary containers: the chunk file and fixed-size point records.
//!
//! Everything on disk is little-endian regardless of host byte order.

pub mod chunk;
pub mod point_file;

pub use chunk::{Chunk, ChunkFile, CHUNK_HEADER_SIZE};
pub use point_file::{MemoryStorage, PointFile, PointRecord, PointStorage, POINT_RECORD_SIZE};

#[inline]
pub(crate) fn get_u64(buf: &[u8], at: usize) -> u64 {
  let mut bytes = [0u8; 8];
  bytes.copy_from_slice(&buf[at..at + 8]);
  u64::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn get_f64(buf: &[u8], at: usize) -> f64 {
  f64::from_bits(get_u64(buf, at))
}

#[inline]
pub(crate) fn get_u32(buf: &[u8], at: usize) -> u32 {
  let mut bytes = [0u8; 4];
  bytes.copy_from_slice(&buf[at..at + 4]);
  u32::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn get_u16(buf: &[u8], at: usize) -> u16 {
  u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
pub(crate) fn put_u64(buf: &mut [u8], at: usize, value: u64) {
  buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn put_f64(buf: &mut [u8], at: usize, value: f64) {
  put_u64(buf, at, value.to_bits());
}

#[inline]
pub(crate) fn put_u32(buf: &mut [u8], at: usize, value: u32) {
  buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn put_u16(buf: &mut [u8], at: usize, value: u16) {
  buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}
