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

//! Light sources. A light is a component of an entity, its position and direction come from the
//! global transform of the entity. Spot and directional lights shine along the local Z axis.

use crate::core::{
    algebra::{Matrix4, Vector3, Vector4},
    color::Color,
    math::{AxisAlignedBoundingBox, Matrix4Ext},
};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString, VariantNames};

/// Half size of the bounding box of directional lights. Such lights affect the whole scene.
pub const DIRECTIONAL_LIGHT_EXTENT: f32 = 1.0e6;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    Point {
        range: f32,
        falloff_exponent: f32,
    },
    Spot {
        range: f32,
        /// Full angle of the hot spot, in radians.
        inner_angle: f32,
        /// Full angle of the cone, in radians.
        outer_angle: f32,
    },
}

impl LightKind {
    pub fn directional() -> Self {
        Self::Directional
    }

    pub fn point(range: f32) -> Self {
        Self::Point {
            range,
            falloff_exponent: 2.0,
        }
    }

    pub fn spot(range: f32, inner_angle: f32, outer_angle: f32) -> Self {
        Self::Spot {
            range,
            inner_angle,
            outer_angle,
        }
    }

    /// Index of the kind in `[directional, point, spot]` order.
    pub fn index(&self) -> usize {
        match self {
            Self::Directional => 0,
            Self::Point { .. } => 1,
            Self::Spot { .. } => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Directional => "DirectionalLight",
            Self::Point { .. } => "PointLight",
            Self::Spot { .. } => "SpotLight",
        }
    }
}

/// How shadow map stores depth.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum ShadowDepthMode {
    /// Reversed depth, better precision for large ranges.
    #[default]
    InvZ,
    Linear,
}

impl ShadowDepthMode {
    pub const ALL: [Self; 2] = [Self::InvZ, Self::Linear];
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum ShadowFilter {
    Hard,
    #[default]
    Pcf,
    Pcss,
    Vsm,
    Esm,
}

impl ShadowFilter {
    pub const ALL: [Self; 5] = [Self::Hard, Self::Pcf, Self::Pcss, Self::Vsm, Self::Esm];
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadowParams {
    pub depth_mode: ShadowDepthMode,
    pub filter: ShadowFilter,
    /// Size of a side of the shadow map (or of each cube face) in pixels.
    pub resolution: usize,
    pub bias: f32,
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self {
            depth_mode: Default::default(),
            filter: Default::default(),
            resolution: 1024,
            bias: 0.00025,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Light {
    kind: LightKind,
    color: Color,
    intensity: f32,
    ambient_intensity: f32,
    casts_shadows: bool,
    shadow: ShadowParams,
}

impl Light {
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            color: Color::WHITE,
            intensity: 1.0,
            ambient_intensity: 0.0,
            casts_shadows: true,
            shadow: Default::default(),
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_ambient_intensity(mut self, ambient_intensity: f32) -> Self {
        self.ambient_intensity = ambient_intensity;
        self
    }

    pub fn with_casts_shadows(mut self, casts_shadows: bool) -> Self {
        self.casts_shadows = casts_shadows;
        self
    }

    pub fn with_shadow_params(mut self, shadow: ShadowParams) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn kind(&self) -> &LightKind {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: LightKind) {
        self.kind = kind;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn ambient_intensity(&self) -> f32 {
        self.ambient_intensity
    }

    pub fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    pub fn set_casts_shadows(&mut self, casts_shadows: bool) {
        self.casts_shadows = casts_shadows;
    }

    pub fn shadow_params(&self) -> &ShadowParams {
        &self.shadow
    }

    pub fn is_directional(&self) -> bool {
        matches!(self.kind, LightKind::Directional)
    }

    /// Bounds of the light volume in local space of the light.
    pub fn local_bounds(&self) -> AxisAlignedBoundingBox {
        match self.kind {
            LightKind::Directional => AxisAlignedBoundingBox::from_radius(DIRECTIONAL_LIGHT_EXTENT),
            LightKind::Point { range, .. } => AxisAlignedBoundingBox::from_radius(range),
            LightKind::Spot {
                range, outer_angle, ..
            } => {
                let radius = range * (outer_angle * 0.5).tan();
                AxisAlignedBoundingBox::from_min_max(
                    Vector3::new(-radius, -radius, 0.0),
                    Vector3::new(radius, radius, range),
                )
            }
        }
    }

    pub fn world_bounds(&self, transform: &Matrix4<f32>) -> AxisAlignedBoundingBox {
        self.local_bounds().transform(transform)
    }

    /// Normalized direction of the light in world space. Meaningless for point lights.
    pub fn direction(transform: &Matrix4<f32>) -> Vector3<f32> {
        transform
            .look()
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z)
    }

    /// Packed light parameters, layout depends on the kind of the light:
    /// directional `(0, 0, 0, ambient)`, point `(range, falloff, 0, ambient)`,
    /// spot `(range, cos(inner / 2), cos(outer / 2), ambient)`.
    pub fn light_data(&self) -> Vector4<f32> {
        match self.kind {
            LightKind::Directional => Vector4::new(0.0, 0.0, 0.0, self.ambient_intensity),
            LightKind::Point {
                range,
                falloff_exponent,
            } => Vector4::new(range, falloff_exponent, 0.0, self.ambient_intensity),
            LightKind::Spot {
                range,
                inner_angle,
                outer_angle,
            } => Vector4::new(
                range,
                (inner_angle * 0.5).cos(),
                (outer_angle * 0.5).cos(),
                self.ambient_intensity,
            ),
        }
    }

    pub fn color_intensity(&self) -> Vector4<f32> {
        let rgb = self.color.srgb_to_linear_f32();
        Vector4::new(rgb.x, rgb.y, rgb.z, self.intensity)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_spot_bounds_extend_along_z() {
        let light = Light::new(LightKind::spot(10.0, 0.5, 90.0f32.to_radians()));
        let bounds = light.local_bounds();
        assert_eq!(bounds.min.z, 0.0);
        assert_eq!(bounds.max.z, 10.0);
        assert!((bounds.max.x - 10.0).abs() < 1.0e-4);
    }

    #[test]
    fn test_light_data_layout() {
        let light = Light::new(LightKind::spot(4.0, 0.0, std::f32::consts::PI))
            .with_ambient_intensity(0.25);
        let data = light.light_data();
        assert_eq!(data.x, 4.0);
        assert_eq!(data.y, 1.0);
        assert!(data.z.abs() < 1.0e-6);
        assert_eq!(data.w, 0.25);

        let point = Light::new(LightKind::point(3.0));
        assert_eq!(point.light_data(), Vector4::new(3.0, 2.0, 0.0, 0.0));
    }

    #[test]
    fn test_shadow_names() {
        assert_eq!(ShadowDepthMode::InvZ.as_ref(), "InvZ");
        assert_eq!(ShadowFilter::Pcss.as_ref(), "Pcss");
    }
}
