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

//! Camera defines the point of view the pipeline renders from.

use crate::{
    core::{
        algebra::{Isometry3, Matrix4, Point3, Vector2, Vector3},
        math::{AxisAlignedBoundingBox, Frustum, Rect},
    },
    graphics::gpu_texture::CubeMapFace,
};
use serde::{Deserialize, Serialize};

/// Projection mode of a camera.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Vertical field of view in radians.
    Perspective { fov: f32 },
    /// Height of the view volume in world units.
    Orthographic { vertical_size: f32 },
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective {
            fov: 75.0f32.to_radians(),
        }
    }
}

/// See module docs.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    view: Matrix4<f32>,
    projection: Projection,
    z_near: f32,
    z_far: f32,
    viewport_size: Vector2<usize>,
}

impl Camera {
    pub fn new(
        view: Matrix4<f32>,
        projection: Projection,
        z_near: f32,
        z_far: f32,
        viewport_size: Vector2<usize>,
    ) -> Self {
        Self {
            view,
            projection,
            z_near,
            z_far,
            viewport_size,
        }
    }

    /// Creates a perspective camera at `eye` looking at `target`.
    pub fn look_at(
        eye: Vector3<f32>,
        target: Vector3<f32>,
        up: Vector3<f32>,
        fov: f32,
        viewport_size: Vector2<usize>,
    ) -> Self {
        let view = Isometry3::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
            .to_homogeneous();
        Self::new(
            view,
            Projection::Perspective { fov },
            0.025,
            2048.0,
            viewport_size,
        )
    }

    /// Creates a camera that looks along the given cube map face from the origin of `world`. Used
    /// to capture reflection probes and omnidirectional shadow maps.
    pub fn cube_face(
        face: CubeMapFace,
        world: &Matrix4<f32>,
        z_near: f32,
        z_far: f32,
        size: usize,
    ) -> Self {
        let position = Vector3::new(world[12], world[13], world[14]);
        let (look, up) = cube_face_directions(face);
        Self::new(
            Isometry3::look_at_rh(
                &Point3::from(position),
                &Point3::from(position + look),
                &up,
            )
            .to_homogeneous(),
            Projection::Perspective {
                fov: std::f32::consts::FRAC_PI_2,
            },
            z_near,
            z_far,
            Vector2::new(size, size),
        )
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn set_view_matrix(&mut self, view: Matrix4<f32>) {
        self.view = view;
    }

    pub fn inv_view_matrix(&self) -> Matrix4<f32> {
        self.view.try_inverse().unwrap_or_else(Matrix4::identity)
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.viewport_size.x as f32 / (self.viewport_size.y.max(1)) as f32
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        match self.projection {
            Projection::Perspective { fov } => {
                Matrix4::new_perspective(self.aspect_ratio(), fov, self.z_near, self.z_far)
            }
            Projection::Orthographic { vertical_size } => {
                let half_height = vertical_size * 0.5;
                let half_width = half_height * self.aspect_ratio();
                Matrix4::new_orthographic(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.z_near,
                    self.z_far,
                )
            }
        }
    }

    pub fn view_projection_matrix(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view
    }

    pub fn position(&self) -> Vector3<f32> {
        let inv = self.inv_view_matrix();
        Vector3::new(inv[12], inv[13], inv[14])
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    pub fn z_far(&self) -> f32 {
        self.z_far
    }

    pub fn set_z_near(&mut self, z_near: f32) {
        self.z_near = z_near;
    }

    pub fn set_z_far(&mut self, z_far: f32) {
        self.z_far = z_far;
    }

    pub fn viewport_size(&self) -> Vector2<usize> {
        self.viewport_size
    }

    pub fn set_viewport_size(&mut self, size: Vector2<usize>) {
        self.viewport_size = size;
    }

    pub fn viewport(&self) -> Rect<i32> {
        Rect::new(
            0,
            0,
            self.viewport_size.x as i32,
            self.viewport_size.y as i32,
        )
    }

    /// Returns `None` if the camera has degenerate matrices.
    pub fn frustum(&self) -> Option<Frustum> {
        Frustum::from_view_projection_matrix(self.view_projection_matrix())
    }

    /// Checks whether a box given in local space of an object is visible to the camera.
    pub fn test_obb(
        &self,
        local_bounds: &AxisAlignedBoundingBox,
        transform: &Matrix4<f32>,
    ) -> bool {
        match self.frustum() {
            Some(frustum) => frustum.is_intersects_obb(local_bounds, transform),
            None => true,
        }
    }
}

/// Look and up vectors of each cube map face, OpenGL conventions.
pub fn cube_face_directions(face: CubeMapFace) -> (Vector3<f32>, Vector3<f32>) {
    match face {
        CubeMapFace::PositiveX => (Vector3::x(), -Vector3::y()),
        CubeMapFace::NegativeX => (-Vector3::x(), -Vector3::y()),
        CubeMapFace::PositiveY => (Vector3::y(), Vector3::z()),
        CubeMapFace::NegativeY => (-Vector3::y(), -Vector3::z()),
        CubeMapFace::PositiveZ => (Vector3::z(), -Vector3::y()),
        CubeMapFace::NegativeZ => (-Vector3::z(), -Vector3::y()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn camera() -> Camera {
        Camera::look_at(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::y(),
            90.0f32.to_radians(),
            Vector2::new(800, 600),
        )
    }

    #[test]
    fn test_position_is_recovered_from_view() {
        let camera = Camera::look_at(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::zeros(),
            Vector3::y(),
            1.0,
            Vector2::new(100, 100),
        );
        assert!((camera.position() - Vector3::new(1.0, 2.0, 3.0)).norm() < 1.0e-5);
    }

    #[test]
    fn test_obb() {
        let camera = camera();
        let unit = AxisAlignedBoundingBox::unit();
        assert!(camera.test_obb(
            &unit,
            &Matrix4::new_translation(&Vector3::new(0.0, 0.0, -5.0))
        ));
        assert!(!camera.test_obb(
            &unit,
            &Matrix4::new_translation(&Vector3::new(0.0, 0.0, 5.0))
        ));
    }

    #[test]
    fn test_cube_face_camera_looks_along_face() {
        let world = Matrix4::new_translation(&Vector3::new(0.0, 1.0, 0.0));
        let camera = Camera::cube_face(CubeMapFace::PositiveX, &world, 0.1, 10.0, 64);
        assert_eq!(camera.viewport_size(), Vector2::new(64, 64));
        assert_eq!(camera.z_far(), 10.0);
        let unit = AxisAlignedBoundingBox::unit();
        assert!(camera.test_obb(
            &unit,
            &Matrix4::new_translation(&Vector3::new(5.0, 1.0, 0.0))
        ));
        assert!(!camera.test_obb(
            &unit,
            &Matrix4::new_translation(&Vector3::new(-5.0, 1.0, 0.0))
        ));
    }
}
