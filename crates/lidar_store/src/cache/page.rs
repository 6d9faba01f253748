//! One octree node's points, decoded into columns.

use glam::DVec3;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::geometry::Aabb;
use crate::io::PointRecord;
use crate::view::{classification_color, ramp_color, ColorSource, ViewSettings};

/// Cache key of a page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey {
  pub dataset: u64,
  pub node: usize,
}

impl PageKey {
  #[inline]
  pub fn new(dataset: u64, node: usize) -> Self {
    Self { dataset, node }
  }
}

/// Per-page work pipeline for the view.
///
/// `Select`, `Read` and `RunModifiers` are advanced by [`Page::next_state`].
/// `Render` waits for the renderer, which moves the page to `Rendered`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PageState {
  #[default]
  Unselected,
  Select,
  Read,
  RunModifiers,
  Render,
  Rendered,
}

/// Columnar point attributes for one node's page range.
#[derive(Debug, Default)]
pub struct Page {
  key: PageKey,
  state: PageState,
  modified: bool,
  /// Dataset boundary minimum; render positions are relative to it.
  origin: DVec3,

  pub position: Vec<DVec3>,
  pub intensity: Vec<u16>,
  pub return_number: Vec<u8>,
  pub number_of_returns: Vec<u8>,
  pub classification: Vec<u8>,
  pub user_data: Vec<u8>,
  pub gps_time: Vec<f64>,
  pub color: Vec<[u16; 3]>,
  pub user_color: Vec<[u16; 3]>,
  pub layer: Vec<u32>,
  pub voxel: Vec<u64>,
  pub elevation: Vec<f64>,
  pub descriptor: Vec<f32>,

  /// Indices of the points passing the view clip box.
  pub selection: Vec<u32>,
  pub render_position: Vec<[f32; 3]>,
  pub render_color: Vec<[f32; 3]>,
}

impl Page {
  pub fn empty(key: PageKey) -> Self {
    Self {
      key,
      ..Self::default()
    }
  }

  pub fn from_records(key: PageKey, origin: DVec3, records: &[PointRecord]) -> Self {
    let mut page = Self {
      key,
      origin,
      ..Self::default()
    };
    let n = records.len();
    page.position.reserve_exact(n);
    page.intensity.reserve_exact(n);
    page.classification.reserve_exact(n);
    for r in records {
      page.position.push(r.position);
      page.intensity.push(r.intensity);
      page.return_number.push(r.return_number);
      page.number_of_returns.push(r.number_of_returns);
      page.classification.push(r.classification);
      page.user_data.push(r.user_data);
      page.gps_time.push(r.gps_time);
      page.color.push(r.color);
      page.user_color.push(r.user_color);
      page.layer.push(r.layer);
      page.voxel.push(r.voxel);
      page.elevation.push(r.elevation);
      page.descriptor.push(r.descriptor);
    }
    page
  }

  /// Decode the page range of `key.node` from `dataset`.
  pub fn load(key: PageKey, dataset: &mut Dataset, scratch: &mut Vec<PointRecord>) -> Result<Self> {
    dataset.read_page(key.node, scratch)?;
    Ok(Self::from_records(key, dataset.boundary().min, scratch))
  }

  /// Write the columns back and clear the modified flag.
  pub fn store(&mut self, dataset: &mut Dataset, scratch: &mut Vec<PointRecord>) -> Result<()> {
    scratch.clear();
    scratch.extend((0..self.len()).map(|i| self.record(i)));
    dataset.write_page(self.key.node, scratch)?;
    self.modified = false;
    Ok(())
  }

  pub fn record(&self, i: usize) -> PointRecord {
    PointRecord {
      position: self.position[i],
      gps_time: self.gps_time[i],
      elevation: self.elevation[i],
      voxel: self.voxel[i],
      layer: self.layer[i],
      descriptor: self.descriptor[i],
      intensity: self.intensity[i],
      color: self.color[i],
      user_color: self.user_color[i],
      return_number: self.return_number[i],
      number_of_returns: self.number_of_returns[i],
      classification: self.classification[i],
      user_data: self.user_data[i],
    }
  }

  #[inline]
  pub fn key(&self) -> PageKey {
    self.key
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.position.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.position.is_empty()
  }

  #[inline]
  pub fn state(&self) -> PageState {
    self.state
  }

  pub fn set_state(&mut self, state: PageState) {
    self.state = state;
  }

  #[inline]
  pub fn is_modified(&self) -> bool {
    self.modified
  }

  pub fn set_modified(&mut self) {
    self.modified = true;
  }

  /// Number of points passing the view clip box.
  #[inline]
  pub fn selection_size(&self) -> usize {
    self.selection.len()
  }

  /// Do one unit of view work. Returns true while more calls are needed.
  pub fn next_state(&mut self, view: &ViewSettings) -> bool {
    match self.state {
      PageState::Select => {
        self.select(view.clip.as_ref());
        self.state = PageState::Read;
        true
      }
      PageState::Read => {
        self.read_render_positions();
        self.state = PageState::RunModifiers;
        true
      }
      PageState::RunModifiers => {
        self.run_color_modifier(view);
        self.state = PageState::Render;
        false
      }
      PageState::Unselected | PageState::Render | PageState::Rendered => false,
    }
  }

  /// Recompute the clip selection from the decoded positions.
  fn select(&mut self, clip: Option<&Aabb>) {
    let n = self.len() as u32;
    self.selection.clear();
    match clip {
      Some(clip) => self.selection.extend(
        self
          .position
          .iter()
          .enumerate()
          .filter(|(_, &p)| clip.contains_point(p))
          .map(|(i, _)| i as u32),
      ),
      None => self.selection.extend(0..n),
    }
  }

  fn read_render_positions(&mut self) {
    let origin = self.origin;
    self.render_position.clear();
    self.render_position.extend(self.selection.iter().map(|&i| {
      let p = self.position[i as usize] - origin;
      [p.x as f32, p.y as f32, p.z as f32]
    }));
  }

  fn run_color_modifier(&mut self, view: &ViewSettings) {
    self.render_color.clear();
    self.render_color.extend(self.selection.iter().map(|&i| {
      let i = i as usize;
      match view.color_source {
        ColorSource::Color => rgb(self.color[i]),
        ColorSource::UserColor => rgb(self.user_color[i]),
        ColorSource::Intensity => [f32::from(self.intensity[i]) / 65535.0; 3],
        ColorSource::Classification => classification_color(self.classification[i]),
        ColorSource::Elevation => match view.elevation_range {
          Some((min, max)) if max > min => ramp_color((self.elevation[i] - min) / (max - min)),
          _ => ramp_color(0.0),
        },
        ColorSource::Descriptor => match view.descriptor_range {
          Some((min, max)) if max > min => [(self.descriptor[i] - min) / (max - min); 3],
          _ => [self.descriptor[i]; 3],
        },
      }
    }));
  }
}

#[inline]
fn rgb(c: [u16; 3]) -> [f32; 3] {
  c.map(|v| f32::from(v) / 65535.0)
}
