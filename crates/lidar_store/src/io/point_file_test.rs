use super::*;
use crate::ErrorKind;

fn sample_point(i: u32) -> PointRecord {
  PointRecord {
    position: DVec3::new(i as f64 * 0.5, -(i as f64), 100.0 + i as f64),
    gps_time: 1.0e6 + i as f64,
    elevation: 0.25 * i as f64,
    voxel: i as u64,
    layer: i,
    descriptor: 0.5,
    intensity: (i * 7) as u16,
    color: [1, 2, 3],
    user_color: [4, 5, 6],
    return_number: 2,
    number_of_returns: 3,
    classification: (i % 10) as u8,
    user_data: 42,
  }
}

#[test]
fn test_record_encoding_is_bit_exact() {
  let point = sample_point(7);
  let mut buf = [0xffu8; POINT_RECORD_SIZE];
  point.encode(&mut buf);

  assert_eq!(&buf[0..8], &3.5f64.to_le_bytes());
  assert_eq!(buf[72], 7, "classification byte");
  assert!(buf[74..].iter().all(|&b| b == 0), "padding must be zeroed");
  assert_eq!(PointRecord::decode(&buf), point);
}

#[test]
fn test_default_point_has_no_voxel() {
  assert_eq!(PointRecord::default().voxel, VOXEL_NONE);
}

// =========================================================================
// PointFile
// =========================================================================

#[test]
fn test_point_file_create_open_read() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("plot.pts");
  let points: Vec<_> = (0..50).map(sample_point).collect();

  PointFile::create(&path, &points).unwrap();

  let mut file = PointFile::open(&path).unwrap();
  assert_eq!(file.len(), 50);

  let mut out = Vec::new();
  file.read_points(10, 5, &mut out).unwrap();
  assert_eq!(out, &points[10..15]);
}

#[test]
fn test_point_file_write_persists() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("plot.pts");
  let points: Vec<_> = (0..20).map(sample_point).collect();
  let mut file = PointFile::create(&path, &points).unwrap();

  let mut changed = points[3..6].to_vec();
  for p in &mut changed {
    p.classification = 2;
  }
  file.write_points(3, &changed).unwrap();
  file.flush().unwrap();
  drop(file);

  let mut file = PointFile::open(&path).unwrap();
  let mut out = Vec::new();
  file.read_points(0, 20, &mut out).unwrap();
  assert_eq!(&out[3..6], changed.as_slice());
  assert_eq!(out[6], points[6], "neighbouring records untouched");
}

#[test]
fn test_point_file_range_checked() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("plot.pts");
  let mut file = PointFile::create(&path, &[sample_point(0)]).unwrap();

  let mut out = Vec::new();
  let err = file.read_points(0, 2, &mut out).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvariantViolation);
}

#[test]
fn test_point_file_rejects_other_chunk() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("bogus.pts");
  std::fs::write(&path, [0u8; 64]).unwrap();

  let err = PointFile::open(&path).err().unwrap();
  assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_point_file_rejects_count_beyond_file() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("plot.pts");
  PointFile::create(&path, &[sample_point(0), sample_point(1)]).unwrap();

  // Claim far more records than the file holds, keeping the lengths consistent.
  let count: u64 = 1 << 40;
  let mut bytes = std::fs::read(&path).unwrap();
  bytes[16..24].copy_from_slice(&(count * POINT_RECORD_SIZE as u64).to_le_bytes());
  bytes[24..32].copy_from_slice(&count.to_le_bytes());
  std::fs::write(&path, bytes).unwrap();

  let err = PointFile::open(&path).err().unwrap();
  assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_open_missing_file_is_io_error() {
  let dir = tempfile::tempdir().unwrap();
  let err = PointFile::open(dir.path().join("missing.pts")).err().unwrap();
  assert_eq!(err.kind(), ErrorKind::Io);
}

// =========================================================================
// MemoryStorage
// =========================================================================

#[test]
fn test_memory_storage_counts_access() {
  let mut storage = MemoryStorage::new((0..10).map(sample_point).collect());
  let stats = storage.stats();

  let mut out = Vec::new();
  storage.read_points(2, 3, &mut out).unwrap();
  storage.write_points(2, &out).unwrap();

  assert_eq!(stats.reads(), 1);
  assert_eq!(stats.writes(), 1);
  assert!(storage.write_points(9, &out).is_err());
}
