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
    math::{aabb::AxisAlignedBoundingBox, plane::Plane},
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frustum {
    /// 0 - left, 1 - right, 2 - top, 3 - bottom, 4 - far, 5 - near
    planes: [Plane; 6],
    corners: [Vector3<f32>; 8],
}

impl Frustum {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const TOP: usize = 2;
    pub const BOTTOM: usize = 3;
    pub const FAR: usize = 4;
    pub const NEAR: usize = 5;

    #[inline]
    pub fn from_view_projection_matrix(m: Matrix4<f32>) -> Option<Self> {
        let planes = [
            // Left
            Plane::from_abcd(m[3] + m[0], m[7] + m[4], m[11] + m[8], m[15] + m[12])?,
            // Right
            Plane::from_abcd(m[3] - m[0], m[7] - m[4], m[11] - m[8], m[15] - m[12])?,
            // Top
            Plane::from_abcd(m[3] - m[1], m[7] - m[5], m[11] - m[9], m[15] - m[13])?,
            // Bottom
            Plane::from_abcd(m[3] + m[1], m[7] + m[5], m[11] + m[9], m[15] + m[13])?,
            // Far
            Plane::from_abcd(m[3] - m[2], m[7] - m[6], m[11] - m[10], m[15] - m[14])?,
            // Near
            Plane::from_abcd(m[3] + m[2], m[7] + m[6], m[11] + m[10], m[15] + m[14])?,
        ];

        let corners = [
            planes[Self::LEFT].intersection_point(&planes[Self::TOP], &planes[Self::FAR]),
            planes[Self::LEFT].intersection_point(&planes[Self::BOTTOM], &planes[Self::FAR]),
            planes[Self::RIGHT].intersection_point(&planes[Self::BOTTOM], &planes[Self::FAR]),
            planes[Self::RIGHT].intersection_point(&planes[Self::TOP], &planes[Self::FAR]),
            planes[Self::LEFT].intersection_point(&planes[Self::TOP], &planes[Self::NEAR]),
            planes[Self::LEFT].intersection_point(&planes[Self::BOTTOM], &planes[Self::NEAR]),
            planes[Self::RIGHT].intersection_point(&planes[Self::BOTTOM], &planes[Self::NEAR]),
            planes[Self::RIGHT].intersection_point(&planes[Self::TOP], &planes[Self::NEAR]),
        ];

        Some(Self { planes, corners })
    }

    #[inline]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    #[inline]
    pub fn corners(&self) -> &[Vector3<f32>; 8] {
        &self.corners
    }

    #[inline]
    pub fn is_intersects_point_cloud(&self, points: &[Vector3<f32>]) -> bool {
        for plane in self.planes.iter() {
            let mut back_points = 0;
            for point in points {
                if plane.dot(point) <= 0.0 {
                    back_points += 1;
                    if back_points >= points.len() {
                        // All points are behind current plane.
                        return false;
                    }
                }
            }
        }
        true
    }

    #[inline]
    pub fn is_intersects_aabb(&self, aabb: &AxisAlignedBoundingBox) -> bool {
        if self.is_intersects_point_cloud(&aabb.corners()) {
            return true;
        }

        for corner in self.corners.iter() {
            if aabb.is_contains_point(*corner) {
                return true;
            }
        }

        false
    }

    /// Oriented bounding box test. The box is given in local space of an object and `transform`
    /// moves it to the world space. Huge objects that enclose the whole frustum are handled by
    /// testing the frustum corners in the local space of the box.
    #[inline]
    pub fn is_intersects_obb(
        &self,
        local_bounds: &AxisAlignedBoundingBox,
        transform: &Matrix4<f32>,
    ) -> bool {
        if self.is_intersects_point_cloud(&local_bounds.oriented_corners(transform)) {
            return true;
        }

        if let Some(inv_transform) = transform.try_inverse() {
            for corner in self.corners.iter() {
                let local = inv_transform.transform_point(&Point3::from(*corner)).coords;
                if local_bounds.is_contains_point(local) {
                    return true;
                }
            }
        }

        false
    }

    #[inline]
    pub fn is_contains_point(&self, pt: Vector3<f32>) -> bool {
        for plane in self.planes.iter() {
            if plane.dot(&pt) <= 0.0 {
                return false;
            }
        }
        true
    }

    #[inline]
    pub fn is_intersects_sphere(&self, p: Vector3<f32>, r: f32) -> bool {
        for plane in self.planes.iter() {
            let d = plane.dot(&p);
            if d < -r {
                return false;
            }
            if d.abs() < r {
                return true;
            }
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algebra::{Isometry3, Point3, Vector3};

    fn camera_frustum() -> Frustum {
        // Camera at origin looking towards -Z.
        let view = Isometry3::look_at_rh(
            &Point3::origin(),
            &Point3::new(0.0, 0.0, -1.0),
            &Vector3::y(),
        )
        .to_homogeneous();
        let projection = Matrix4::new_perspective(1.0, 90.0f32.to_radians(), 0.1, 100.0);
        Frustum::from_view_projection_matrix(projection * view).unwrap()
    }

    #[test]
    fn test_frustum_from_identity_matrix() {
        let f = Frustum::from_view_projection_matrix(Matrix4::identity()).unwrap();
        assert_eq!(
            f.planes()[Frustum::LEFT],
            Plane::from_abcd(1.0, 0.0, 0.0, 1.0).unwrap()
        );
        assert_eq!(
            f.planes()[Frustum::NEAR],
            Plane::from_abcd(0.0, 0.0, 1.0, 1.0).unwrap()
        );
        assert_eq!(f.corners()[0], Vector3::new(-1.0, 1.0, 1.0));
    }

    #[test]
    fn test_frustum_contains_point() {
        let f = camera_frustum();
        assert!(f.is_contains_point(Vector3::new(0.0, 0.0, -5.0)));
        assert!(!f.is_contains_point(Vector3::new(0.0, 0.0, 5.0)));
        assert!(!f.is_contains_point(Vector3::new(0.0, 0.0, -500.0)));
    }

    #[test]
    fn test_frustum_obb() {
        let f = camera_frustum();
        let bounds = AxisAlignedBoundingBox::unit();
        assert!(f.is_intersects_obb(
            &bounds,
            &Matrix4::new_translation(&Vector3::new(0.0, 0.0, -5.0))
        ));
        assert!(!f.is_intersects_obb(
            &bounds,
            &Matrix4::new_translation(&Vector3::new(0.0, 0.0, 5.0))
        ));
        // A box that encloses the whole frustum.
        assert!(f.is_intersects_obb(
            &bounds,
            &Matrix4::new_nonuniform_scaling(&Vector3::new(1000.0, 1000.0, 1000.0))
        ));
    }

    #[test]
    fn test_frustum_sphere() {
        let f = camera_frustum();
        assert!(f.is_intersects_sphere(Vector3::new(0.0, 0.0, -10.0), 1.0));
        assert!(!f.is_intersects_sphere(Vector3::new(0.0, 0.0, 10.0), 1.0));
    }
}
