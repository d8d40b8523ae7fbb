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

//! Math primitives used by the renderer: rectangles, planes, bounding volumes and frustums.

#![allow(missing_docs)]

pub mod aabb;
pub mod frustum;
pub mod plane;

use crate::algebra::{Matrix3, Matrix4, Scalar, Vector2, Vector3, Vector4};
use crate::num_traits::NumAssign;
use std::fmt::Debug;

pub use aabb::AxisAlignedBoundingBox;
pub use frustum::Frustum;
pub use plane::Plane;

pub trait Number: Scalar + Copy + PartialOrd + NumAssign + Debug + Default {}

impl<T> Number for T where T: Scalar + Copy + PartialOrd + NumAssign + Debug + Default {}

#[inline]
fn min<T: Number>(a: T, b: T) -> T {
    if a < b {
        a
    } else {
        b
    }
}

#[inline]
fn max<T: Number>(a: T, b: T) -> T {
    if a > b {
        a
    } else {
        b
    }
}

/// Rectangle with top-left position and size.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Rect<T: Number> {
    pub position: Vector2<T>,
    pub size: Vector2<T>,
}

impl<T: Number> Rect<T> {
    #[inline]
    pub fn new(x: T, y: T, w: T, h: T) -> Self {
        Self {
            position: Vector2::new(x, y),
            size: Vector2::new(w, h),
        }
    }

    #[inline]
    pub fn x(&self) -> T {
        self.position.x
    }

    #[inline]
    pub fn y(&self) -> T {
        self.position.y
    }

    #[inline]
    pub fn w(&self) -> T {
        self.size.x
    }

    #[inline]
    pub fn h(&self) -> T {
        self.size.y
    }

    #[inline]
    pub fn right(&self) -> T {
        self.position.x + self.size.x
    }

    #[inline]
    pub fn bottom(&self) -> T {
        self.position.y + self.size.y
    }

    /// Returns `true` if the rectangle covers no area.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.size.x <= T::zero() || self.size.y <= T::zero()
    }

    /// Extends the rectangle so it contains the given point.
    #[inline]
    pub fn push(&mut self, p: Vector2<T>) {
        let x0 = min(p.x, self.x());
        let y0 = min(p.y, self.y());
        let x1 = max(p.x, self.right());
        let y1 = max(p.y, self.bottom());
        *self = Self::new(x0, y0, x1 - x0, y1 - y0);
    }

    /// Returns the overlapping part of two rectangles, `None` if they do not overlap.
    #[inline]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let x0 = max(self.x(), other.x());
        let y0 = max(self.y(), other.y());
        let x1 = min(self.right(), other.right());
        let y1 = min(self.bottom(), other.bottom());
        if x1 > x0 && y1 > y0 {
            Some(Self::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }
}

/// A rectangle that starts empty and grows with every pushed point.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct OptionRect<T: Number> {
    bounds: Option<Rect<T>>,
}

impl<T: Number> OptionRect<T> {
    #[inline]
    pub fn push(&mut self, p: Vector2<T>) {
        match self.bounds.as_mut() {
            Some(bounds) => bounds.push(p),
            None => self.bounds = Some(Rect::new(p.x, p.y, T::zero(), T::zero())),
        }
    }

    #[inline]
    pub fn into_inner(self) -> Option<Rect<T>> {
        self.bounds
    }
}

pub trait Matrix4Ext<T: Scalar> {
    fn side(&self) -> Vector3<T>;
    fn up(&self) -> Vector3<T>;
    fn look(&self) -> Vector3<T>;
    fn position(&self) -> Vector3<T>;
    fn basis(&self) -> Matrix3<T>;
}

impl<T: Scalar + Copy> Matrix4Ext<T> for Matrix4<T> {
    #[inline]
    fn side(&self) -> Vector3<T> {
        Vector3::new(self[0], self[1], self[2])
    }

    #[inline]
    fn up(&self) -> Vector3<T> {
        Vector3::new(self[4], self[5], self[6])
    }

    #[inline]
    fn look(&self) -> Vector3<T> {
        Vector3::new(self[8], self[9], self[10])
    }

    #[inline]
    fn position(&self) -> Vector3<T> {
        Vector3::new(self[12], self[13], self[14])
    }

    #[inline]
    fn basis(&self) -> Matrix3<T> {
        self.fixed_view::<3, 3>(0, 0).into_owned()
    }
}

/// Projects a world-space point into the window space of the given viewport. Returns `None` if
/// the point lies behind the viewer.
#[inline]
pub fn project_point(
    point: Vector3<f32>,
    view_projection: &Matrix4<f32>,
    viewport: Rect<i32>,
) -> Option<Vector2<f32>> {
    let clip = view_projection * Vector4::new(point.x, point.y, point.z, 1.0);
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = clip.xyz().scale(1.0 / clip.w);
    Some(Vector2::new(
        viewport.x() as f32 + (ndc.x * 0.5 + 0.5) * viewport.w() as f32,
        viewport.y() as f32 + (1.0 - (ndc.y * 0.5 + 0.5)) * viewport.h() as f32,
    ))
}

/// Calculates the screen-space rectangle that encloses all the given points. If any point is
/// behind the viewer the whole viewport is returned. The result is clipped by the viewport and
/// `None` means that the rectangle has no area.
pub fn screen_rect_of_points(
    points: &[Vector3<f32>],
    view_projection: &Matrix4<f32>,
    viewport: Rect<i32>,
) -> Option<Rect<i32>> {
    let mut rect = OptionRect::<f32>::default();
    for point in points {
        match project_point(*point, view_projection, viewport) {
            Some(p) => rect.push(p),
            None => return Some(viewport).filter(|v| !v.is_degenerate()),
        }
    }
    let rect = rect.into_inner()?;
    let x0 = rect.x().floor() as i32;
    let y0 = rect.y().floor() as i32;
    let x1 = rect.right().ceil() as i32;
    let y1 = rect.bottom().ceil() as i32;
    Rect::new(x0, y0, x1 - x0, y1 - y0).intersection(&viewport)
}

/// Projects a bounding sphere into the screen space. Returns the whole viewport when the viewer is
/// inside of the sphere and `None` if the projection has no area.
pub fn projected_sphere_rect(
    center: Vector3<f32>,
    radius: f32,
    viewer_position: Vector3<f32>,
    view_projection: &Matrix4<f32>,
    viewport: Rect<i32>,
) -> Option<Rect<i32>> {
    if radius <= 0.0 {
        return None;
    }
    if (viewer_position - center).norm() <= radius {
        return Some(viewport).filter(|v| !v.is_degenerate());
    }
    let mut bounds = AxisAlignedBoundingBox::from_radius(radius);
    bounds.min += center;
    bounds.max += center;
    screen_rect_of_points(&bounds.corners(), view_projection, viewport)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algebra::{Isometry3, Point3};

    fn view_projection() -> Matrix4<f32> {
        let view = Isometry3::look_at_rh(
            &Point3::origin(),
            &Point3::new(0.0, 0.0, -1.0),
            &Vector3::y(),
        )
        .to_homogeneous();
        Matrix4::new_perspective(1.0, 90.0f32.to_radians(), 0.1, 100.0) * view
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.intersection(&Rect::new(5, 5, 10, 10)), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(a.intersection(&Rect::new(10, 0, 10, 10)), None);
        assert!(Rect::new(0, 0, 0, 10).is_degenerate());
    }

    #[test]
    fn test_option_rect() {
        let mut rect = OptionRect::<i32>::default();
        assert_eq!(rect.into_inner(), None);
        rect.push(Vector2::new(1, 2));
        rect.push(Vector2::new(4, 8));
        assert_eq!(rect.into_inner(), Some(Rect::new(1, 2, 3, 6)));
    }

    #[test]
    fn test_projected_sphere_rect() {
        let viewport = Rect::new(0, 0, 100, 100);
        let vp = view_projection();

        let eye = Vector3::default();
        let centered =
            projected_sphere_rect(Vector3::new(0.0, 0.0, -10.0), 1.0, eye, &vp, viewport).unwrap();
        assert!(centered.w() > 0 && centered.w() < 100);
        assert!(centered.x() > 0);

        // Viewer inside the sphere.
        assert_eq!(
            projected_sphere_rect(Vector3::default(), 5.0, Vector3::default(), &vp, viewport),
            Some(viewport)
        );

        // Completely off-screen to the right.
        assert_eq!(
            projected_sphere_rect(Vector3::new(50.0, 0.0, -5.0), 1.0, eye, &vp, viewport),
            None
        );
    }
}
