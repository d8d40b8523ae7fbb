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

//! Reflection probes capture the surroundings into a cube map, which is then used for
//! image-based reflections of everything inside of the probe's influence volume.

use crate::core::{
    algebra::{Matrix4, Vector3},
    math::AxisAlignedBoundingBox,
};
use serde::{Deserialize, Serialize};

/// Defines what a probe captures. The order of variants matters: probes are composited in the
/// ascending order, so environment probes are always applied last.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ReflectMethod {
    /// Captures static geometry, lighting and sky.
    #[default]
    StaticOnly,
    /// Captures lighting and sky only.
    Environment,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ProbeShape {
    Sphere {
        range: f32,
    },
    Box {
        /// Half extents of the box.
        extents: Vector3<f32>,
        /// Width of the band in which the reflection fades out.
        transition_distance: f32,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReflectionProbe {
    method: ReflectMethod,
    shape: ProbeShape,
    intensity: f32,
    resolution: usize,
    apply_prefilter: bool,
}

impl ReflectionProbe {
    pub fn new(method: ReflectMethod, shape: ProbeShape) -> Self {
        Self {
            method,
            shape,
            intensity: 1.0,
            resolution: 128,
            apply_prefilter: true,
        }
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// Size of a cube face in pixels, clamped to at least one pixel.
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution.max(1);
        self
    }

    pub fn with_prefilter(mut self, apply_prefilter: bool) -> Self {
        self.apply_prefilter = apply_prefilter;
        self
    }

    pub fn method(&self) -> ReflectMethod {
        self.method
    }

    pub fn shape(&self) -> &ProbeShape {
        &self.shape
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn apply_prefilter(&self) -> bool {
        self.apply_prefilter
    }

    /// Maximum distance from the probe center at which the probe has an effect, in world units.
    pub fn max_range(&self, scale: Vector3<f32>) -> f32 {
        match self.shape {
            ProbeShape::Sphere { range } => scale.max() * range,
            ProbeShape::Box {
                extents,
                transition_distance,
            } => (scale.component_mul(&extents) + Vector3::repeat(transition_distance)).norm(),
        }
    }

    /// Half size of the captured area along each axis. Used as the far clip of face cameras.
    pub fn capture_extents(&self, scale: Vector3<f32>) -> Vector3<f32> {
        match self.shape {
            ProbeShape::Sphere { range } => Vector3::repeat(scale.max() * range),
            ProbeShape::Box { extents, .. } => scale.component_mul(&extents),
        }
    }

    pub fn local_bounds(&self) -> AxisAlignedBoundingBox {
        match self.shape {
            ProbeShape::Sphere { range } => AxisAlignedBoundingBox::from_radius(range),
            ProbeShape::Box {
                extents,
                transition_distance,
            } => {
                let half = extents + Vector3::repeat(transition_distance);
                AxisAlignedBoundingBox::from_min_max(-half, half)
            }
        }
    }

    pub fn world_bounds(&self, transform: &Matrix4<f32>) -> AxisAlignedBoundingBox {
        self.local_bounds().transform(transform)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_environment_sorts_last() {
        assert!(ReflectMethod::StaticOnly < ReflectMethod::Environment);
    }

    #[test]
    fn test_max_range() {
        let sphere =
            ReflectionProbe::new(ReflectMethod::StaticOnly, ProbeShape::Sphere { range: 5.0 });
        assert_eq!(sphere.max_range(Vector3::new(1.0, 2.0, 1.0)), 10.0);

        let cube = ReflectionProbe::new(
            ReflectMethod::StaticOnly,
            ProbeShape::Box {
                extents: Vector3::new(2.0, 0.0, 0.0),
                transition_distance: 1.0,
            },
        );
        let expected = Vector3::<f32>::new(3.0, 1.0, 1.0).norm();
        assert!((cube.max_range(Vector3::repeat(1.0)) - expected).abs() < 1.0e-6);
    }
}
