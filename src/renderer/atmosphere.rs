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

//! Sky rendering. Three sky models are supported: a scattering sky driven by an interpolation
//! table between clear and hazy conditions, the analytic Preetham (Perez) sky, and a user
//! supplied cube map. The sky is drawn on the far plane, behind everything in the G-buffer.

use crate::{
    core::{
        algebra::{Matrix3, Matrix4, Vector3, Vector4},
        lerpf,
        pool::Handle,
        warn_once,
    },
    graphics::{
        error::FrameworkError,
        framebuffer::FrameBuffer,
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::SharedTexture,
        stats::RenderPassStatistics,
        CompareFunc, DrawParameters, ElementRange,
    },
    renderer::shader::LoadContext,
    scene::{
        camera::{Camera, Projection},
        light::Light,
        sky::{SkyMode, Skylight},
        Entity, Scene,
    },
};
use std::f32::consts::PI;

const CLEAR_TURBIDITY: f32 = 1.9;
const HAZY_TURBIDITY: f32 = 10.0;

/// Hour of the day (`[0; 24)`) that corresponds to the position of the sun, 6:00 is sunrise in
/// the `-X` direction, 12:00 is noon.
pub fn hour_of_day(sun_direction: Vector3<f32>) -> f32 {
    let ground_normal = Vector3::new(0.0, -1.0, 0.0);
    let reference = Vector3::z();
    let Some(sun) = sun_direction.try_normalize(f32::EPSILON) else {
        return 12.0;
    };
    let mut angle = sun.dot(&ground_normal).clamp(-1.0, 1.0).acos();
    if reference.dot(&sun.cross(&ground_normal)) < 0.0 {
        angle = -angle;
    }
    angle.rem_euclid(2.0 * PI).to_degrees() / 15.0
}

/// Uniforms of the standard sky, interpolated between clear and hazy atmosphere.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StandardSkyParams {
    pub kr_and_intensity: Vector4<f32>,
    /// Rayleigh strength, Mie strength, Mie distribution, scatter strength.
    pub turbidity1: Vector4<f32>,
    /// Rayleigh brightness, Mie brightness, spot brightness, spot distance.
    pub turbidity2: Vector4<f32>,
    /// Rayleigh collection power, Mie collection power.
    pub turbidity3: Vector4<f32>,
}

impl StandardSkyParams {
    pub fn new(turbidity: f32) -> Self {
        let t = (turbidity - CLEAR_TURBIDITY) / (HAZY_TURBIDITY - CLEAR_TURBIDITY);
        let mix = |clear: f32, hazy: f32| lerpf(clear, hazy, t);
        let kr = Vector3::new(0.128_677_8, 0.247_844_3, 0.621_606_56)
            .lerp(&Vector3::new(0.05, 0.1, 0.25), t);
        Self {
            kr_and_intensity: Vector4::new(kr.x, kr.y, kr.z, mix(1.8, 0.8)),
            turbidity1: Vector4::new(
                mix(0.139, 0.05),
                mix(0.264, 0.5),
                mix(0.53, 0.7),
                mix(0.078, 0.15),
            ),
            turbidity2: Vector4::new(
                mix(9.0, 5.0),
                mix(0.1, 0.5),
                mix(10.0, 5.0),
                mix(300.0, 100.0),
            ),
            turbidity3: Vector4::new(mix(0.81, 0.6), mix(0.39, 0.6), 0.0, 0.0),
        }
    }
}

/// Preetham sky model: distribution coefficients for luminance and both chromaticities, plus the
/// zenith values. Each vector is `(Y, x, y)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PerezSkyParams {
    pub zenith: Vector3<f32>,
    pub coefficients: [Vector3<f32>; 5],
}

impl PerezSkyParams {
    /// `sun_direction` points towards the sun.
    pub fn new(sun_direction: Vector3<f32>, turbidity: f32) -> Self {
        let t = turbidity;
        let sun = sun_direction
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::y);
        let theta = sun.y.clamp(-1.0, 1.0).acos();

        let chi = (4.0 / 9.0 - t / 120.0) * (PI - 2.0 * theta);
        let zenith_luminance = (4.0453 * t - 4.9710) * chi.tan() - 0.2155 * t + 2.4192;
        let (t2, th, th2, th3) = (t * t, theta, theta * theta, theta * theta * theta);
        let zenith_x = t2 * (0.00166 * th3 - 0.00375 * th2 + 0.00209 * th)
            + t * (-0.02903 * th3 + 0.06377 * th2 - 0.03202 * th + 0.00394)
            + (0.11693 * th3 - 0.21196 * th2 + 0.06052 * th + 0.25886);
        let zenith_y = t2 * (0.00275 * th3 - 0.00610 * th2 + 0.00317 * th)
            + t * (-0.04214 * th3 + 0.08970 * th2 - 0.04153 * th + 0.00516)
            + (0.15346 * th3 - 0.26756 * th2 + 0.06670 * th + 0.26688);

        let coefficients = [
            Vector3::new(0.1787 * t - 1.4630, -0.0193 * t - 0.2592, -0.0167 * t - 0.2608),
            Vector3::new(-0.3554 * t + 0.4275, -0.0665 * t + 0.0008, -0.0950 * t + 0.0092),
            Vector3::new(-0.0227 * t + 5.3251, -0.0004 * t + 0.2125, -0.0079 * t + 0.2102),
            Vector3::new(0.1206 * t - 2.5771, -0.0641 * t - 0.8989, -0.0441 * t - 1.6537),
            Vector3::new(-0.0670 * t + 0.3703, -0.0033 * t + 0.0452, -0.0109 * t + 0.0529),
        ];

        Self {
            zenith: Vector3::new(zenith_luminance.max(0.0), zenith_x, zenith_y),
            coefficients,
        }
    }
}

struct StandardShader {
    program: Box<dyn GpuProgram>,
    parameters: UniformLocation,
    kr_and_intensity: UniformLocation,
    turbidity_parameters: [UniformLocation; 3],
    inv_view_proj: UniformLocation,
}

struct PerezShader {
    program: Box<dyn GpuProgram>,
    sun_direction: UniformLocation,
    zenith: UniformLocation,
    coefficients: [UniformLocation; 5],
    inv_view_proj: UniformLocation,
}

struct SkyboxShader {
    program: Box<dyn GpuProgram>,
    view_projection: UniformLocation,
    cubemap: UniformLocation,
}

/// The skylight that defines the sky of the scene. Only the first one is used.
pub fn find_skylight(scene: &Scene) -> Option<(Handle<Entity>, &Entity, &Skylight)> {
    let mut skylights = scene.skylights();
    let first = skylights.next();
    for (handle, entity, _) in skylights {
        let id = (u64::from(handle.generation()) << 32) | u64::from(handle.index());
        warn_once!(
            id,
            "Skylight: {} is ignored, the scene already has a skylight.",
            entity.name()
        );
    }
    first
}

pub(crate) struct AtmosphereRenderContext<'a> {
    /// Light buffer with the scene depth attached.
    pub framebuffer: &'a mut dyn FrameBuffer,
    pub quad: &'a dyn GeometryBuffer,
    pub cube: &'a dyn GeometryBuffer,
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    pub skybox: Option<&'a SharedTexture>,
}

pub struct AtmospherePass {
    standard: StandardShader,
    perez: PerezShader,
    skybox: SkyboxShader,
}

impl AtmospherePass {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let standard = ctx.program("SkyStandard", "sky_vs.glsl", "sky_standard_fs.glsl")?;
        let perez = ctx.program("SkyPerez", "sky_vs.glsl", "sky_perez_fs.glsl")?;
        let skybox = ctx.program("Skybox", "skybox_vs.glsl", "skybox_fs.glsl")?;
        Ok(Self {
            standard: StandardShader {
                parameters: standard.uniform_location("u_parameters")?,
                kr_and_intensity: standard.uniform_location("u_kr_and_intensity")?,
                turbidity_parameters: [
                    standard.uniform_location("u_turbidity_parameters1")?,
                    standard.uniform_location("u_turbidity_parameters2")?,
                    standard.uniform_location("u_turbidity_parameters3")?,
                ],
                inv_view_proj: standard.uniform_location("u_inv_view_proj")?,
                program: standard,
            },
            perez: PerezShader {
                sun_direction: perez.uniform_location("u_sun_direction")?,
                zenith: perez.uniform_location("u_zenith")?,
                coefficients: [
                    perez.uniform_location("u_coeffs_a")?,
                    perez.uniform_location("u_coeffs_b")?,
                    perez.uniform_location("u_coeffs_c")?,
                    perez.uniform_location("u_coeffs_d")?,
                    perez.uniform_location("u_coeffs_e")?,
                ],
                inv_view_proj: perez.uniform_location("u_inv_view_proj")?,
                program: perez,
            },
            skybox: SkyboxShader {
                view_projection: skybox.uniform_location("u_view_projection")?,
                cubemap: skybox.uniform_location("s_cubemap")?,
                program: skybox,
            },
        })
    }

    pub(crate) fn render(
        &self,
        ctx: AtmosphereRenderContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();
        let Some((_, entity, skylight)) = find_skylight(ctx.scene) else {
            return Ok(stats);
        };

        // Sky models are only meaningful for perspective projection.
        let mut camera = ctx.camera.clone();
        if matches!(camera.projection(), Projection::Orthographic { .. }) {
            camera.set_projection(Projection::default());
        }

        let light_direction = Light::direction(&entity.global_transform_without_scale());
        let viewport = camera.viewport();
        let inv_view_proj = camera
            .view_projection_matrix()
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);
        let params = DrawParameters::screen_pass().with_depth_test(CompareFunc::LessOrEqual);

        match skylight.mode {
            SkyMode::Standard => {
                let shader = &self.standard;
                let sky = StandardSkyParams::new(skylight.turbidity);
                let parameters = Vector4::new(
                    light_direction.x,
                    light_direction.y,
                    light_direction.z,
                    hour_of_day(-light_direction),
                );
                stats += ctx.framebuffer.draw(
                    ctx.quad,
                    viewport,
                    &*shader.program,
                    &params,
                    ElementRange::Full,
                    &mut |binding| {
                        binding
                            .set_vector4(&shader.parameters, &parameters)
                            .set_vector4(&shader.kr_and_intensity, &sky.kr_and_intensity)
                            .set_vector4(&shader.turbidity_parameters[0], &sky.turbidity1)
                            .set_vector4(&shader.turbidity_parameters[1], &sky.turbidity2)
                            .set_vector4(&shader.turbidity_parameters[2], &sky.turbidity3)
                            .set_matrix4(&shader.inv_view_proj, &inv_view_proj);
                    },
                )?;
            }
            SkyMode::Perez => {
                let shader = &self.perez;
                let sun_direction = -light_direction;
                let sky = PerezSkyParams::new(sun_direction, skylight.turbidity);
                stats += ctx.framebuffer.draw(
                    ctx.quad,
                    viewport,
                    &*shader.program,
                    &params,
                    ElementRange::Full,
                    &mut |binding| {
                        binding
                            .set_vector3(&shader.sun_direction, &sun_direction)
                            .set_vector3(&shader.zenith, &sky.zenith)
                            .set_matrix4(&shader.inv_view_proj, &inv_view_proj);
                        for (location, value) in
                            shader.coefficients.iter().zip(sky.coefficients.iter())
                        {
                            binding.set_vector3(location, value);
                        }
                    },
                )?;
            }
            SkyMode::Skybox => {
                let Some(cubemap) = ctx.skybox else {
                    return Ok(stats);
                };
                let shader = &self.skybox;
                // Rotation only, the sky box is infinitely far away.
                let view = camera.view_matrix();
                let rotation: Matrix3<f32> = view.fixed_view::<3, 3>(0, 0).into_owned();
                let view_projection = camera.projection_matrix() * rotation.to_homogeneous();
                stats += ctx.framebuffer.draw(
                    ctx.cube,
                    viewport,
                    &*shader.program,
                    &params,
                    ElementRange::Full,
                    &mut |binding| {
                        binding
                            .set_matrix4(&shader.view_projection, &view_projection)
                            .set_texture(&shader.cubemap, cubemap);
                    },
                )?;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        core::log::{Log, MessageKind},
        scene::EntityBuilder,
    };

    #[test]
    fn test_extra_skylight_is_reported_once() {
        Log::set_silent(true);
        let mut scene = Scene::new();
        let first = EntityBuilder::new("MainSky")
            .with_skylight(Skylight::default())
            .build(&mut scene);
        let extra = EntityBuilder::new("ExtraSky")
            .with_skylight(Skylight::default())
            .build(&mut scene);

        for _ in 0..3 {
            assert_eq!(find_skylight(&scene).map(|(h, ..)| h), Some(first));
        }

        let id = (u64::from(extra.generation()) << 32) | u64::from(extra.index());
        let message = "Skylight: ExtraSky is ignored, the scene already has a skylight.";
        assert!(!Log::write_once(id, MessageKind::Warning, message));
    }

    #[test]
    fn test_hour_of_day() {
        // Sun in the zenith.
        assert!((hour_of_day(Vector3::new(0.0, 1.0, 0.0)) - 12.0).abs() < 1.0e-3);
        // Sun at the horizon.
        let sunrise = hour_of_day(Vector3::new(-1.0, 0.0, 0.0));
        let sunset = hour_of_day(Vector3::new(1.0, 0.0, 0.0));
        assert!((sunrise - 6.0).abs() < 1.0e-3 || (sunrise - 18.0).abs() < 1.0e-3);
        assert!((sunrise - sunset).abs() > 11.9);
    }

    #[test]
    fn test_standard_params_interpolate_between_clear_and_hazy() {
        let clear = StandardSkyParams::new(CLEAR_TURBIDITY);
        assert!((clear.kr_and_intensity.w - 1.8).abs() < 1.0e-5);
        assert!((clear.turbidity2.w - 300.0).abs() < 1.0e-3);

        let hazy = StandardSkyParams::new(HAZY_TURBIDITY);
        assert!((hazy.kr_and_intensity.w - 0.8).abs() < 1.0e-5);
        assert!((hazy.turbidity2.w - 100.0).abs() < 1.0e-3);
        assert!((hazy.kr_and_intensity.x - 0.05).abs() < 1.0e-5);
    }

    #[test]
    fn test_perez_zenith_is_brighter_for_high_sun() {
        let noon = PerezSkyParams::new(Vector3::y(), 2.0);
        let evening = PerezSkyParams::new(Vector3::new(1.0, 0.2, 0.0), 2.0);
        assert!(noon.zenith.x > evening.zenith.x);
        assert!((noon.coefficients[0].x - (0.1787 * 2.0 - 1.4630)).abs() < 1.0e-5);
    }
}
