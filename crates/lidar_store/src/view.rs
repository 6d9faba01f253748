//! View settings shared between the database and cached pages.

use crate::geometry::Aabb;

/// Attribute that drives render colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorSource {
  #[default]
  Color,
  UserColor,
  Intensity,
  Classification,
  Elevation,
  Descriptor,
}

/// Clip box, color source and published value ranges.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewSettings {
  /// Points outside this box are hidden and excluded from filtered queries.
  pub clip: Option<Aabb>,
  pub color_source: ColorSource,
  /// Elevation span used for color ramps, set by the elevation action.
  pub elevation_range: Option<(f64, f64)>,
  pub descriptor_range: Option<(f32, f32)>,
}

/// RGB color for an ASPRS classification code.
pub fn classification_color(code: u8) -> [f32; 3] {
  match code {
    0 => [0.6, 0.6, 0.6],
    1 => [0.8, 0.8, 0.8],
    2 => [0.6, 0.4, 0.2],
    3 => [0.6, 0.9, 0.3],
    4 => [0.3, 0.8, 0.2],
    5 => [0.1, 0.5, 0.1],
    6 => [0.9, 0.3, 0.2],
    7 => [1.0, 0.0, 1.0],
    9 => [0.2, 0.4, 0.9],
    _ => [0.9, 0.9, 0.2],
  }
}

/// Blue to red ramp over `t` in `[0, 1]`.
pub fn ramp_color(t: f64) -> [f32; 3] {
  let t = t.clamp(0.0, 1.0) as f32;
  [t, 1.0 - (2.0 * t - 1.0).abs(), 1.0 - t]
}
