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

//! Deferred lighting. Every light is drawn as a full-screen quad limited by a scissor rectangle
//! that encloses the projection of the light volume, contributions are summed with additive
//! blending in the light buffer.

use crate::{
    core::{
        algebra::{Matrix4, Vector4},
        color::Color,
        math::{projected_sphere_rect, screen_rect_of_points, Matrix4Ext, Rect},
    },
    graphics::{
        error::FrameworkError,
        framebuffer::{Attachment, FrameBuffer},
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, GpuProgramBinding, UniformLocation},
        gpu_texture::{PixelKind, SharedTexture},
        BlendParameters, DrawParameters, ElementRange,
    },
    renderer::{shader::LoadContext, shadow::ShadowRenderer, stats::FrameStatistics},
    scene::{
        camera::Camera,
        light::{Light, LightKind, ShadowDepthMode, ShadowFilter},
        Entity, Scene,
    },
};
use fxhash::FxHashMap;

const BRDF_LUT_SIZE: usize = 256;

/// Samplers shared by the ambient and per-light programs, in binding order: albedo, normal,
/// material, emission, depth, reflections, BRDF lookup table.
struct CommonUniforms {
    camera_position: UniformLocation,
    inv_view_proj: UniformLocation,
    textures: [UniformLocation; 7],
}

impl CommonUniforms {
    fn new(program: &dyn GpuProgram) -> Result<Self, FrameworkError> {
        Ok(Self {
            camera_position: program.uniform_location("u_camera_position")?,
            inv_view_proj: program.uniform_location("u_inv_view_proj")?,
            textures: [
                program.uniform_location("s_tex0")?,
                program.uniform_location("s_tex1")?,
                program.uniform_location("s_tex2")?,
                program.uniform_location("s_tex3")?,
                program.uniform_location("s_tex4")?,
                program.uniform_location("s_tex5")?,
                program.uniform_location("s_tex6")?,
            ],
        })
    }

    fn bind(&self, binding: &mut GpuProgramBinding, inputs: &LightingInputs) {
        binding
            .set_vector3(&self.camera_position, &inputs.camera_position)
            .set_matrix4(&self.inv_view_proj, &inputs.inv_view_proj);
        for (location, texture) in self.textures.iter().zip(inputs.textures.iter()) {
            binding.set_texture(location, texture);
        }
    }
}

struct ShadowUniforms {
    shadow_map: UniformLocation,
    shadow_matrix: UniformLocation,
    shadow_params: UniformLocation,
}

struct LightShader {
    program: Box<dyn GpuProgram>,
    common: CommonUniforms,
    light_direction: UniformLocation,
    light_position: UniformLocation,
    light_data: UniformLocation,
    light_color_intensity: UniformLocation,
    shadow: Option<ShadowUniforms>,
}

fn kind_define(kind: &LightKind) -> &'static str {
    match kind {
        LightKind::Directional => "DIRECTIONAL_LIGHT",
        LightKind::Point { .. } => "POINT_LIGHT",
        LightKind::Spot { .. } => "SPOT_LIGHT",
    }
}

fn filter_define(filter: ShadowFilter) -> &'static str {
    match filter {
        ShadowFilter::Hard => "SHADOW_FILTER_HARD",
        ShadowFilter::Pcf => "SHADOW_FILTER_PCF",
        ShadowFilter::Pcss => "SHADOW_FILTER_PCSS",
        ShadowFilter::Vsm => "SHADOW_FILTER_VSM",
        ShadowFilter::Esm => "SHADOW_FILTER_ESM",
    }
}

fn depth_mode_define(mode: ShadowDepthMode) -> &'static str {
    match mode {
        ShadowDepthMode::InvZ => "SHADOW_DEPTH_INV_Z",
        ShadowDepthMode::Linear => "SHADOW_DEPTH_LINEAR",
    }
}

impl LightShader {
    fn new(
        ctx: &LoadContext,
        kind: &LightKind,
        variant: LightVariant,
    ) -> Result<Self, FrameworkError> {
        let kind_name = kind.name();
        let mut defines = vec![kind_define(kind)];
        let name = match variant.shadow {
            Some((filter, mode)) => {
                defines.extend(["SHADOWS", filter_define(filter), depth_mode_define(mode)]);
                format!("{kind_name}{}{}", filter.as_ref(), mode.as_ref())
            }
            None => kind_name.to_owned(),
        };
        let program =
            ctx.program_with_defines(&name, "screen_vs.glsl", "light_fs.glsl", &defines)?;
        let shadow = match variant.shadow {
            Some(_) => Some(ShadowUniforms {
                shadow_map: program.uniform_location("s_shadow_map")?,
                shadow_matrix: program.uniform_location("u_shadow_matrix")?,
                shadow_params: program.uniform_location("u_shadow_params")?,
            }),
            None => None,
        };
        Ok(Self {
            common: CommonUniforms::new(&*program)?,
            light_direction: program.uniform_location("u_light_direction")?,
            light_position: program.uniform_location("u_light_position")?,
            light_data: program.uniform_location("u_light_data")?,
            light_color_intensity: program.uniform_location("u_light_color_intensity")?,
            shadow,
            program,
        })
    }
}

struct AmbientShader {
    program: Box<dyn GpuProgram>,
    common: CommonUniforms,
}

impl AmbientShader {
    fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program_with_defines(
            "AmbientLight",
            "screen_vs.glsl",
            "light_fs.glsl",
            &["AMBIENT_LIGHT"],
        )?;
        Ok(Self {
            common: CommonUniforms::new(&*program)?,
            program,
        })
    }
}

/// Light kind index plus the shadow configuration, `None` for the unshadowed program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct LightVariant {
    kind: usize,
    shadow: Option<(ShadowFilter, ShadowDepthMode)>,
}

impl LightVariant {
    /// Every program variant of a light kind.
    fn all(kind: &LightKind) -> impl Iterator<Item = Self> {
        let kind = kind.index();
        std::iter::once(Self { kind, shadow: None }).chain(
            ShadowFilter::ALL.into_iter().flat_map(move |filter| {
                ShadowDepthMode::ALL.into_iter().map(move |mode| Self {
                    kind,
                    shadow: Some((filter, mode)),
                })
            }),
        )
    }
}

struct LightingInputs {
    camera_position: crate::core::algebra::Vector3<f32>,
    inv_view_proj: Matrix4<f32>,
    textures: [SharedTexture; 7],
}

pub(crate) struct LightingRenderContext<'a> {
    pub framebuffer: &'a mut dyn FrameBuffer,
    pub quad: &'a dyn GeometryBuffer,
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    /// Albedo, normal, material, emission and depth of the G-buffer.
    pub gbuffer: [SharedTexture; 5],
    pub reflections: SharedTexture,
    /// `None` when shadows were not rendered for this frame.
    pub shadows: Option<&'a ShadowRenderer>,
    pub stats: &'a mut FrameStatistics,
}

/// Screen-space rectangle touched by the light, `None` when the light can't affect any pixel.
pub fn light_scissor_rect(
    light: &Light,
    entity: &Entity,
    camera: &Camera,
) -> Option<Rect<i32>> {
    if !camera.test_obb(&light.local_bounds(), entity.global_transform()) {
        return None;
    }
    let viewport = camera.viewport();
    let view_projection = camera.view_projection_matrix();
    let rect = match *light.kind() {
        LightKind::Directional => Some(viewport),
        LightKind::Point { range, .. } => projected_sphere_rect(
            entity.global_position(),
            range * entity.global_scale().max(),
            camera.position(),
            &view_projection,
            viewport,
        ),
        LightKind::Spot { .. } => {
            let corners = light
                .local_bounds()
                .oriented_corners(entity.global_transform());
            screen_rect_of_points(&corners, &view_projection, viewport)
        }
    };
    rect.filter(|r| !r.is_degenerate())
}

pub struct LightingPass {
    ambient: AmbientShader,
    variants: FxHashMap<LightVariant, LightShader>,
    brdf_lut: SharedTexture,
}

impl LightingPass {
    pub fn new(ctx: &LoadContext, quad: &dyn GeometryBuffer) -> Result<Self, FrameworkError> {
        let mut variants = FxHashMap::default();
        let kinds = [
            LightKind::directional(),
            LightKind::point(1.0),
            LightKind::spot(1.0, 0.5, 1.0),
        ];
        for kind in kinds.iter() {
            for variant in LightVariant::all(kind) {
                variants.insert(variant, LightShader::new(ctx, kind, variant)?);
            }
        }
        Ok(Self {
            ambient: AmbientShader::new(ctx)?,
            variants,
            brdf_lut: Self::make_brdf_lut(ctx, quad)?,
        })
    }

    /// Precomputes the split-sum BRDF integration table for image based lighting.
    fn make_brdf_lut(
        ctx: &LoadContext,
        quad: &dyn GeometryBuffer,
    ) -> Result<SharedTexture, FrameworkError> {
        let program = ctx.program("BrdfLut", "screen_vs.glsl", "brdf_lut_fs.glsl")?;
        let texture = ctx.server.create_2d_render_target(
            "BrdfLut",
            PixelKind::RG16F,
            BRDF_LUT_SIZE,
            BRDF_LUT_SIZE,
        )?;
        let mut framebuffer = ctx
            .server
            .create_frame_buffer(None, vec![Attachment::color(texture.clone())])?;
        let viewport = framebuffer.viewport();
        framebuffer.draw(
            quad,
            viewport,
            &*program,
            &DrawParameters::screen_pass(),
            ElementRange::Full,
            &mut |_| {},
        )?;
        Ok(texture)
    }

    pub fn brdf_lut(&self) -> &SharedTexture {
        &self.brdf_lut
    }

    pub(crate) fn render(&self, ctx: LightingRenderContext) -> Result<(), FrameworkError> {
        let LightingRenderContext {
            framebuffer,
            quad,
            scene,
            camera,
            gbuffer,
            reflections,
            shadows,
            stats,
        } = ctx;

        let viewport = camera.viewport();
        framebuffer.clear(viewport, Some(Color::BLACK), None, None);

        let [albedo, normal, material, emission, depth] = gbuffer;
        let inputs = LightingInputs {
            camera_position: camera.position(),
            inv_view_proj: camera
                .view_projection_matrix()
                .try_inverse()
                .unwrap_or_else(Matrix4::identity),
            textures: [
                albedo,
                normal,
                material,
                emission,
                depth,
                reflections,
                self.brdf_lut.clone(),
            ],
        };

        stats.lighting += framebuffer.draw(
            quad,
            viewport,
            &*self.ambient.program,
            &DrawParameters::screen_pass().with_blend(BlendParameters::additive()),
            ElementRange::Full,
            &mut |binding| self.ambient.common.bind(binding, &inputs),
        )?;

        for (handle, entity, light) in scene.lights() {
            let Some(scissor) = light_scissor_rect(light, entity, camera) else {
                continue;
            };

            let shadow_map = shadows
                .filter(|_| light.casts_shadows())
                .and_then(|s| s.shadow_map(handle))
                .filter(|s| s.generation_count() > 0);
            let params = light.shadow_params();
            let variant = LightVariant {
                kind: light.kind().index(),
                shadow: shadow_map.map(|_| (params.filter, params.depth_mode)),
            };
            let Some(shader) = self.variants.get(&variant) else {
                continue;
            };

            let transform = entity.global_transform_without_scale();
            let direction = Light::direction(&transform);
            let position = transform.position();
            let light_data = light.light_data();
            let color_intensity = light.color_intensity();
            let shadow_params = Vector4::new(
                params.bias,
                1.0 / params.resolution.max(1) as f32,
                light_data.x,
                0.0,
            );

            stats.lighting += framebuffer.draw(
                quad,
                viewport,
                &*shader.program,
                &DrawParameters::screen_pass()
                    .with_blend(BlendParameters::additive())
                    .with_scissor(scissor),
                ElementRange::Full,
                &mut |binding| {
                    shader.common.bind(binding, &inputs);
                    binding
                        .set_vector3(&shader.light_direction, &direction)
                        .set_vector3(&shader.light_position, &position)
                        .set_vector4(&shader.light_data, &light_data)
                        .set_vector4(&shader.light_color_intensity, &color_intensity);
                    if let (Some(uniforms), Some(map)) = (shader.shadow.as_ref(), shadow_map) {
                        binding
                            .set_texture(&uniforms.shadow_map, map.texture())
                            .set_matrix4(&uniforms.shadow_matrix, &map.light_matrix())
                            .set_vector4(&uniforms.shadow_params, &shadow_params);
                    }
                },
            )?;

            match light.kind() {
                LightKind::Directional => stats.lights.directional_lights_rendered += 1,
                LightKind::Point { .. } => stats.lights.point_lights_rendered += 1,
                LightKind::Spot { .. } => stats.lights.spot_lights_rendered += 1,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        core::algebra::{Vector2, Vector3},
        graphics::{
            geometry_buffer::GeometryBufferDescriptor, headless::HeadlessGraphicsServer,
            server::GraphicsServer,
        },
        renderer::shader::EmbeddedShaders,
        scene::{model::SurfaceData, EntityBuilder},
    };

    fn camera() -> Camera {
        Camera::look_at(
            Vector3::new(0.0, 0.0, 10.0),
            Vector3::zeros(),
            Vector3::y(),
            1.0,
            Vector2::new(100, 100),
        )
    }

    #[test]
    fn test_every_variant_is_compiled() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let quad_data = SurfaceData::make_quad();
        let quad = server
            .create_geometry_buffer(GeometryBufferDescriptor {
                name: "Quad",
                vertices: &quad_data.vertices,
                triangles: &quad_data.triangles,
            })
            .unwrap();
        let pass = LightingPass::new(&ctx, &*quad).unwrap();
        // 3 kinds, each without shadows plus every filter and depth mode combination.
        assert_eq!(pass.variants.len(), 3 * (1 + 5 * 2));
        assert_eq!(server.draws_with("BrdfLut").len(), 1);
        assert!(server.draws_with("PointLightPcssLinear").is_empty());
    }

    #[test]
    fn test_scissor_of_offscreen_point_light_is_empty() {
        let mut scene = Scene::new();
        let visible = EntityBuilder::new("Visible")
            .with_light(Light::new(LightKind::point(1.0)))
            .build(&mut scene);
        let behind = EntityBuilder::new("Behind")
            .with_position(Vector3::new(0.0, 0.0, 50.0))
            .with_light(Light::new(LightKind::point(1.0)))
            .build(&mut scene);
        let camera = camera();

        let rect_of = |handle| {
            let entity = scene.try_get(handle).unwrap();
            light_scissor_rect(entity.light().unwrap(), entity, &camera)
        };
        let rect = rect_of(visible).unwrap();
        assert!(rect.w() > 0 && rect.w() < 100);
        // Behind the camera, outside of the frustum.
        assert!(rect_of(behind).is_none());
    }

    #[test]
    fn test_directional_scissor_covers_viewport() {
        let mut scene = Scene::new();
        let handle = EntityBuilder::new("Sun")
            .with_light(Light::new(LightKind::directional()))
            .build(&mut scene);
        let entity = scene.try_get(handle).unwrap();
        let camera = camera();
        assert_eq!(
            light_scissor_rect(entity.light().unwrap(), entity, &camera),
            Some(camera.viewport())
        );
    }
}
