// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use crate::{
    algebra::{Matrix4, Point3, Vector3},
    math::Matrix4Ext,
};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisAlignedBoundingBox {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Default for AxisAlignedBoundingBox {
    #[inline]
    fn default() -> Self {
        Self {
            min: Vector3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vector3::new(-f32::MAX, -f32::MAX, -f32::MAX),
        }
    }
}

impl AxisAlignedBoundingBox {
    #[inline]
    pub const fn unit() -> Self {
        Self::from_min_max(Vector3::new(-0.5, -0.5, -0.5), Vector3::new(0.5, 0.5, 0.5))
    }

    #[inline]
    pub const fn collapsed() -> Self {
        Self {
            min: Vector3::new(0.0, 0.0, 0.0),
            max: Vector3::new(0.0, 0.0, 0.0),
        }
    }

    #[inline]
    pub fn from_radius(radius: f32) -> Self {
        Self {
            min: Vector3::new(-radius, -radius, -radius),
            max: Vector3::new(radius, radius, radius),
        }
    }

    #[inline]
    pub const fn from_min_max(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_points(points: &[Vector3<f32>]) -> Self {
        let mut aabb = AxisAlignedBoundingBox::default();
        for pt in points {
            aabb.add_point(*pt);
        }
        aabb
    }

    #[inline]
    pub fn add_point(&mut self, a: Vector3<f32>) {
        self.min = self.min.inf(&a);
        self.max = self.max.sup(&a);
    }

    #[inline]
    pub fn inflate(&mut self, delta: Vector3<f32>) {
        self.min -= delta.scale(0.5);
        self.max += delta.scale(0.5);
    }

    #[inline]
    pub fn add_box(&mut self, other: Self) {
        self.add_point(other.min);
        self.add_point(other.max);
    }

    #[inline]
    pub fn corners(&self) -> [Vector3<f32>; 8] {
        [
            Vector3::new(self.min.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.min.z),
        ]
    }

    #[inline]
    pub fn center(&self) -> Vector3<f32> {
        (self.max + self.min).scale(0.5)
    }

    #[inline]
    pub fn half_extents(&self) -> Vector3<f32> {
        (self.max - self.min).scale(0.5)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.max.x >= self.min.x
            && self.max.y >= self.min.y
            && self.max.z >= self.min.z
            && self.min.iter().all(|e| e.is_finite())
            && self.max.iter().all(|e| e.is_finite())
    }

    #[inline]
    pub fn is_contains_point(&self, point: Vector3<f32>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    #[inline]
    pub fn is_intersects_sphere(&self, position: Vector3<f32>, radius: f32) -> bool {
        let closest = position.sup(&self.min).inf(&self.max);
        (closest - position).norm_squared() <= radius * radius
    }

    #[inline]
    pub fn is_intersects_aabb(&self, other: &Self) -> bool {
        let self_center = self.center();
        let self_half_extents = self.half_extents();

        let other_half_extents = other.half_extents();
        let other_center = other.center();

        if (self_center.x - other_center.x).abs() > (self_half_extents.x + other_half_extents.x) {
            return false;
        }

        if (self_center.y - other_center.y).abs() > (self_half_extents.y + other_half_extents.y) {
            return false;
        }

        if (self_center.z - other_center.z).abs() > (self_half_extents.z + other_half_extents.z) {
            return false;
        }

        true
    }

    /// Transforms axis-aligned bounding box using given affine transformation matrix.
    ///
    /// # References
    ///
    /// Transforming Axis-Aligned Bounding Boxes by Jim Arvo, "Graphics Gems", Academic Press, 1990
    #[inline]
    #[must_use]
    pub fn transform(&self, m: &Matrix4<f32>) -> AxisAlignedBoundingBox {
        let basis = m.basis();

        let mut transformed = Self {
            min: m.position(),
            max: m.position(),
        };

        for i in 0..3 {
            for j in 0..3 {
                let a = basis[(i, j)] * self.min[j];
                let b = basis[(i, j)] * self.max[j];
                if a < b {
                    transformed.min[i] += a;
                    transformed.max[i] += b;
                } else {
                    transformed.min[i] += b;
                    transformed.max[i] += a;
                }
            }
        }

        transformed
    }

    /// Returns corners of the box transformed by the given matrix. Unlike [`Self::transform`] the
    /// result is an oriented box, so it is tighter for rotated objects.
    #[inline]
    pub fn oriented_corners(&self, m: &Matrix4<f32>) -> [Vector3<f32>; 8] {
        self.corners()
            .map(|corner| m.transform_point(&Point3::from(corner)).coords)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algebra::Vector3;

    #[test]
    fn test_aabb_from_points() {
        let aabb = AxisAlignedBoundingBox::from_points(&[
            Vector3::new(1.0, -2.0, 0.0),
            Vector3::new(-1.0, 3.0, 5.0),
        ]);
        assert_eq!(aabb.min, Vector3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vector3::new(1.0, 3.0, 5.0));
        assert!(aabb.is_valid());
        assert!(!AxisAlignedBoundingBox::default().is_valid());
    }

    #[test]
    fn test_aabb_intersections() {
        let unit = AxisAlignedBoundingBox::unit();
        let far = AxisAlignedBoundingBox::from_min_max(
            Vector3::new(10.0, 10.0, 10.0),
            Vector3::new(11.0, 11.0, 11.0),
        );
        assert!(unit.is_intersects_aabb(&unit));
        assert!(!unit.is_intersects_aabb(&far));
        assert!(unit.is_intersects_sphere(Vector3::new(1.0, 0.0, 0.0), 0.6));
        assert!(!unit.is_intersects_sphere(Vector3::new(2.0, 0.0, 0.0), 0.6));
    }

    #[test]
    fn test_aabb_transform() {
        let aabb = AxisAlignedBoundingBox::unit()
            .transform(&Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(aabb.min, Vector3::new(0.5, 1.5, 2.5));
        assert_eq!(aabb.max, Vector3::new(1.5, 2.5, 3.5));

        let scaled = AxisAlignedBoundingBox::unit()
            .transform(&Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 2.0, 2.0)));
        assert_eq!(scaled.min, Vector3::new(-1.0, -1.0, -1.0));
        assert_eq!(scaled.max, Vector3::new(1.0, 1.0, 1.0));
    }
}
