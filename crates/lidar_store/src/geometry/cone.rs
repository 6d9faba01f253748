//! Vertical cone predicate.

use glam::DVec3;

use super::Aabb;

/// Vertical cone with its apex at `apex`, opening towards the plane
/// `z = z_far`. A far plane below the apex gives a downward cone.
///
/// `angle` is the half-angle from the vertical axis, in degrees. The apex
/// itself is not part of the cone, so a point never lies in its own cone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cone {
	pub apex: DVec3,
	pub z_far: f64,
	pub angle: f64,
	tan: f64,
}

impl Cone {
	pub fn new(apex: DVec3, z_far: f64, angle: f64) -> Self {
		Self {
			apex,
			z_far,
			angle,
			tan: angle.to_radians().tan(),
		}
	}

	/// Height of the cone from apex to far plane.
	#[inline]
	pub fn height(&self) -> f64 {
		(self.z_far - self.apex.z).abs()
	}

	/// Radius of the cone at the far plane.
	#[inline]
	pub fn far_radius(&self) -> f64 {
		self.height() * self.tan
	}

	pub fn contains_point(&self, point: DVec3) -> bool {
		let h = if self.z_far < self.apex.z {
			self.apex.z - point.z
		} else {
			point.z - self.apex.z
		};
		if h <= 0.0 || h > self.height() {
			return false;
		}
		let dx = point.x - self.apex.x;
		let dy = point.y - self.apex.y;
		let r = h * self.tan;
		dx * dx + dy * dy <= r * r
	}

	pub fn bounding_box(&self) -> Aabb {
		let r = self.far_radius();
		Aabb::from_coords(
			self.apex.x - r,
			self.apex.y - r,
			self.apex.z.min(self.z_far),
			self.apex.x + r,
			self.apex.y + r,
			self.apex.z.max(self.z_far),
		)
	}
}
