//! Axis-aligned bounding box in double precision.

use glam::DVec3;

/// Double-precision axis-aligned bounding box.
///
/// Dataset boundaries, query windows and derived octree node boxes all use
/// this type. Both corners are inclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
	/// Minimum corner (inclusive).
	pub min: DVec3,
	/// Maximum corner (inclusive).
	pub max: DVec3,
}

impl Aabb {
	/// Box that contains nothing; `extend` turns it into the first point.
	pub const EMPTY: Self = Self {
		min: DVec3::splat(f64::INFINITY),
		max: DVec3::splat(f64::NEG_INFINITY),
	};

	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	pub fn from_coords(x1: f64, y1: f64, z1: f64, x2: f64, y2: f64, z2: f64) -> Self {
		Self::new(DVec3::new(x1, y1, z1), DVec3::new(x2, y2, z2))
	}

	pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
		Self {
			min: center - half_extents,
			max: center + half_extents,
		}
	}

	/// Smallest box containing every point, or [`Aabb::EMPTY`].
	pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
		points.into_iter().fold(Self::EMPTY, |mut aabb, p| {
			aabb.extend(p);
			aabb
		})
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
	}

	/// Grow the box to include `point`.
	#[inline]
	pub fn extend(&mut self, point: DVec3) {
		self.min = self.min.min(point);
		self.max = self.max.max(point);
	}

	/// Smallest box containing both boxes. Empty operands are ignored.
	pub fn union(&self, other: &Aabb) -> Aabb {
		if self.is_empty() {
			return *other;
		}
		if other.is_empty() {
			return *self;
		}
		Aabb {
			min: self.min.min(other.min),
			max: self.max.max(other.max),
		}
	}

	/// Check if this AABB overlaps with another.
	///
	/// Two AABBs overlap if they share any interior or boundary points.
	#[inline]
	pub fn overlaps(&self, other: &Aabb) -> bool {
		self.min.x <= other.max.x
			&& self.max.x >= other.min.x
			&& self.min.y <= other.max.y
			&& self.max.y >= other.min.y
			&& self.min.z <= other.max.z
			&& self.max.z >= other.min.z
	}

	/// True when this box lies entirely within `window`.
	#[inline]
	pub fn is_inside(&self, window: &Aabb) -> bool {
		self.min.x >= window.min.x
			&& self.max.x <= window.max.x
			&& self.min.y >= window.min.y
			&& self.max.y <= window.max.y
			&& self.min.z >= window.min.z
			&& self.max.z <= window.max.z
	}

	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		point.x >= self.min.x
			&& point.x <= self.max.x
			&& point.y >= self.min.y
			&& point.y <= self.max.y
			&& point.z >= self.min.z
			&& point.z <= self.max.z
	}

	/// Get the size of the AABB (max - min).
	#[inline]
	pub fn size(&self) -> DVec3 {
		self.max - self.min
	}

	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}

	/// Half of the diagonal: radius of the bounding sphere around the center.
	#[inline]
	pub fn radius(&self) -> f64 {
		self.size().length() * 0.5
	}

	/// Squared distance from `point` to the closest point of the box.
	#[inline]
	pub fn distance_squared(&self, point: DVec3) -> f64 {
		let closest = point.clamp(self.min, self.max);
		closest.distance_squared(point)
	}

	/// Octant code of `point` relative to `center`.
	///
	/// Bit 0 is set for the upper x half, bit 1 for y and bit 2 for z. A
	/// coordinate equal to the center belongs to the lower half.
	#[inline]
	pub fn octant_code(point: DVec3, center: DVec3) -> usize {
		let mut code = 0;
		if point.x > center.x {
			code |= 1;
		}
		if point.y > center.y {
			code |= 2;
		}
		if point.z > center.z {
			code |= 4;
		}
		code
	}

	/// Sub-box for octant `code` when the box is bisected at `center`.
	#[inline]
	pub fn octant(&self, code: usize, center: DVec3) -> Aabb {
		let mut octant = *self;
		if code & 1 != 0 {
			octant.min.x = center.x;
		} else {
			octant.max.x = center.x;
		}
		if code & 2 != 0 {
			octant.min.y = center.y;
		} else {
			octant.max.y = center.y;
		}
		if code & 4 != 0 {
			octant.min.z = center.z;
		} else {
			octant.max.z = center.z;
		}
		octant
	}
}

impl Default for Aabb {
	fn default() -> Self {
		Self::EMPTY
	}
}
