use glam::DVec3;

use super::Aabb;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
	pub center: DVec3,
	pub radius: f64,
}

impl Sphere {
	pub fn new(center: DVec3, radius: f64) -> Self {
		Self { center, radius }
	}

	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		self.center.distance_squared(point) <= self.radius * self.radius
	}

	pub fn bounding_box(&self) -> Aabb {
		Aabb::from_center_half_extents(self.center, DVec3::splat(self.radius))
	}
}
