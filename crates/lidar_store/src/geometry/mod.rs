//! Geometric predicates used by queries and algorithms.

mod aabb;
mod cone;
mod sphere;

pub use aabb::Aabb;
pub use cone::Cone;
pub use sphere::Sphere;

use glam::DVec3;

/// The single geometric predicate a query can carry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
	Box(Aabb),
	Cone(Cone),
	Sphere(Sphere),
}

impl Shape {
	pub fn contains_point(&self, point: DVec3) -> bool {
		match self {
			Shape::Box(aabb) => aabb.contains_point(point),
			Shape::Cone(cone) => cone.contains_point(point),
			Shape::Sphere(sphere) => sphere.contains_point(point),
		}
	}

	/// Box used to select octree nodes.
	pub fn bounding_box(&self) -> Aabb {
		match self {
			Shape::Box(aabb) => *aabb,
			Shape::Cone(cone) => cone.bounding_box(),
			Shape::Sphere(sphere) => sphere.bounding_box(),
		}
	}
}
