//! Bounding sphere used for scene-graph culling and size tests

use crate::core::types::{Mat4, Vec3};
use super::aabb::Aabb;

/// Sphere enclosing a subgraph. A negative radius means "contains nothing".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn empty() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: -1.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.radius >= 0.0
    }

    /// Sphere around the box: box center, half-diagonal radius.
    pub fn from_aabb(aabb: &Aabb) -> Self {
        if !aabb.is_valid() {
            return Self::empty();
        }
        Self {
            center: aabb.center(),
            radius: aabb.size().length() * 0.5,
        }
    }

    pub fn radius_squared(&self) -> f32 {
        self.radius * self.radius
    }

    /// Check if point lies inside or on the sphere
    pub fn contains(&self, point: Vec3) -> bool {
        self.is_valid() && (point - self.center).length_squared() <= self.radius_squared()
    }

    /// Grow to include a point, moving the center as little as possible.
    pub fn expand_by_point(&mut self, point: Vec3) {
        if !self.is_valid() {
            self.center = point;
            self.radius = 0.0;
            return;
        }
        let offset = point - self.center;
        let dist = offset.length();
        if dist > self.radius {
            let new_radius = (self.radius + dist) * 0.5;
            self.center += offset * ((new_radius - self.radius) / dist);
            self.radius = new_radius;
        }
    }

    /// Grow to include another sphere.
    pub fn expand_by_sphere(&mut self, other: &BoundingSphere) {
        if !other.is_valid() {
            return;
        }
        if !self.is_valid() {
            *self = *other;
            return;
        }
        let offset = other.center - self.center;
        let dist = offset.length();
        if dist + other.radius <= self.radius {
            return;
        }
        if dist + self.radius <= other.radius {
            *self = *other;
            return;
        }
        let new_radius = (self.radius + dist + other.radius) * 0.5;
        self.center += offset * ((new_radius - self.radius) / dist);
        self.radius = new_radius;
    }

    /// Sphere after applying `matrix`; the radius grows by the largest axis scale.
    pub fn transformed(&self, matrix: &Mat4) -> BoundingSphere {
        if !self.is_valid() {
            return *self;
        }
        let scale = matrix
            .x_axis
            .truncate()
            .length()
            .max(matrix.y_axis.truncate().length())
            .max(matrix.z_axis.truncate().length());
        BoundingSphere {
            center: matrix.transform_point3(self.center),
            radius: self.radius * scale,
        }
    }

    /// Bound of a set of child spheres.
    ///
    /// The center is the middle of the box around the child centers, the radius
    /// reaches the far side of every child.
    pub fn enclosing(children: &[BoundingSphere]) -> BoundingSphere {
        let valid: Vec<&BoundingSphere> = children.iter().filter(|s| s.is_valid()).collect();
        if valid.is_empty() {
            return BoundingSphere::empty();
        }
        let centers = Aabb::from_points(valid.iter().map(|s| &s.center));
        let center = centers.center();
        let radius = valid
            .iter()
            .map(|s| (s.center - center).length() + s.radius)
            .fold(0.0_f32, f32::max);
        BoundingSphere { center, radius }
    }
}
