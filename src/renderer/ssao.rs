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

//! Adaptive screen-space ambient obscurance. Occlusion is computed from the depth and normals of
//! the G-buffer, smoothed by an edge-aware separable blur and finally written into the alpha
//! channel of the albedo buffer, where the lighting pass picks it up.

use crate::{
    core::algebra::{Matrix4, Vector4},
    graphics::{
        error::FrameworkError,
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::{PixelKind, SharedTexture},
        server::GraphicsServer,
        stats::RenderPassStatistics,
        ColorMask, DrawParameters, ElementRange,
    },
    renderer::{
        settings::AssaoSettings,
        shader::LoadContext,
        view::{FrameBufferKey, RenderView, TextureKey, TextureSpec},
    },
    scene::camera::Camera,
};

/// Highest supported quality level, it is also the adaptive one.
pub const MAX_QUALITY_LEVEL: u32 = 3;

struct GenerateShader {
    program: Box<dyn GpuProgram>,
    depth: UniformLocation,
    normal: UniformLocation,
    ao_params: UniformLocation,
    ao_params2: UniformLocation,
    ao_quality: UniformLocation,
    generate_normals: UniformLocation,
    inv_proj: UniformLocation,
    view: UniformLocation,
}

impl GenerateShader {
    fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program("Assao", "screen_vs.glsl", "assao_fs.glsl")?;
        Ok(Self {
            depth: program.uniform_location("s_depth")?,
            normal: program.uniform_location("s_normal")?,
            ao_params: program.uniform_location("u_ao_params")?,
            ao_params2: program.uniform_location("u_ao_params2")?,
            ao_quality: program.uniform_location("u_ao_quality")?,
            generate_normals: program.uniform_location("u_generate_normals")?,
            inv_proj: program.uniform_location("u_inv_proj")?,
            view: program.uniform_location("u_view")?,
            program,
        })
    }
}

struct BlurShader {
    program: Box<dyn GpuProgram>,
    input: UniformLocation,
    depth: UniformLocation,
    blur_direction: UniformLocation,
}

struct ApplyShader {
    program: Box<dyn GpuProgram>,
    ao: UniformLocation,
}

pub(crate) struct AssaoRenderContext<'a> {
    pub server: &'a dyn GraphicsServer,
    pub view: &'a mut RenderView,
    pub quad: &'a dyn GeometryBuffer,
    pub camera: &'a Camera,
    pub settings: &'a AssaoSettings,
    pub depth: SharedTexture,
    pub normal: SharedTexture,
    pub albedo: SharedTexture,
}

pub struct AssaoPass {
    generate: GenerateShader,
    blur: BlurShader,
    apply: ApplyShader,
}

impl AssaoPass {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let blur = ctx.program("AssaoBlur", "screen_vs.glsl", "assao_blur_fs.glsl")?;
        let apply = ctx.program("AssaoApply", "screen_vs.glsl", "assao_apply_fs.glsl")?;
        Ok(Self {
            generate: GenerateShader::new(ctx)?,
            blur: BlurShader {
                input: blur.uniform_location("s_input")?,
                depth: blur.uniform_location("s_depth")?,
                blur_direction: blur.uniform_location("u_blur_direction")?,
                program: blur,
            },
            apply: ApplyShader {
                ao: apply.uniform_location("s_ao")?,
                program: apply,
            },
        })
    }

    pub(crate) fn render(
        &self,
        ctx: AssaoRenderContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let AssaoRenderContext {
            server,
            view,
            quad,
            camera,
            settings,
            depth,
            normal,
            albedo,
        } = ctx;

        let mut stats = RenderPassStatistics::default();
        let size = albedo.borrow().kind().size();
        let spec = TextureSpec::render_target(size.x, size.y, PixelKind::R8);
        let ao = view.get_or_create(server, TextureKey::Ao, &spec)?;
        let ao_blur = view.get_or_create(server, TextureKey::AoBlur, &spec)?;

        let ao_params = Vector4::new(
            settings.radius,
            settings.shadow_multiplier,
            settings.shadow_power,
            settings.shadow_clamp,
        );
        let ao_params2 = Vector4::new(
            settings.horizon_angle_threshold,
            settings.fade_out_from,
            settings.fade_out_to,
            settings.detail_shadow_strength,
        );
        let ao_quality = Vector4::new(
            settings.quality_level.min(MAX_QUALITY_LEVEL) as f32,
            settings.adaptive_quality_limit,
            settings.temporal_supersampling_angle_offset,
            settings.temporal_supersampling_radius_offset,
        );
        let inv_proj = camera
            .projection_matrix()
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);
        let view_matrix = camera.view_matrix();

        let shader = &self.generate;
        let framebuffer = view.framebuffer(server, FrameBufferKey::Ao, None, &[ao.clone()])?;
        let viewport = framebuffer.viewport();
        stats += framebuffer.draw(
            quad,
            viewport,
            &*shader.program,
            &DrawParameters::screen_pass(),
            ElementRange::Full,
            &mut |binding| {
                binding
                    .set_texture(&shader.depth, &depth)
                    .set_texture(&shader.normal, &normal)
                    .set_vector4(&shader.ao_params, &ao_params)
                    .set_vector4(&shader.ao_params2, &ao_params2)
                    .set_vector4(&shader.ao_quality, &ao_quality)
                    .set_bool(&shader.generate_normals, settings.generate_normals)
                    .set_matrix4(&shader.inv_proj, &inv_proj)
                    .set_matrix4(&shader.view, &view_matrix);
            },
        )?;

        let texel = (1.0 / size.x.max(1) as f32, 1.0 / size.y.max(1) as f32);
        for _ in 0..settings.blur_pass_count {
            for (key, input, output, direction) in [
                (FrameBufferKey::AoBlur, &ao, &ao_blur, (texel.0, 0.0)),
                (FrameBufferKey::Ao, &ao_blur, &ao, (0.0, texel.1)),
            ] {
                let blur_direction =
                    Vector4::new(direction.0, direction.1, settings.sharpness, 0.0);
                let framebuffer = view.framebuffer(server, key, None, &[output.clone()])?;
                let viewport = framebuffer.viewport();
                stats += framebuffer.draw(
                    quad,
                    viewport,
                    &*self.blur.program,
                    &DrawParameters::screen_pass(),
                    ElementRange::Full,
                    &mut |binding| {
                        binding
                            .set_texture(&self.blur.input, input)
                            .set_texture(&self.blur.depth, &depth)
                            .set_vector4(&self.blur.blur_direction, &blur_direction);
                    },
                )?;
            }
        }

        let framebuffer =
            view.framebuffer(server, FrameBufferKey::AoApply, None, &[albedo.clone()])?;
        let viewport = framebuffer.viewport();
        let params = DrawParameters {
            color_write: ColorMask {
                red: false,
                green: false,
                blue: false,
                alpha: true,
            },
            ..DrawParameters::screen_pass()
        };
        stats += framebuffer.draw(
            quad,
            viewport,
            &*self.apply.program,
            &params,
            ElementRange::Full,
            &mut |binding| {
                binding.set_texture(&self.apply.ao, &ao);
            },
        )?;

        Ok(stats)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        core::algebra::{Vector2, Vector3},
        graphics::{geometry_buffer::GeometryBufferDescriptor, headless::HeadlessGraphicsServer},
        renderer::shader::EmbeddedShaders,
        scene::model::SurfaceData,
    };

    #[test]
    fn test_blur_passes_ping_pong_and_apply_writes_alpha_only() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let pass = AssaoPass::new(&ctx).unwrap();
        let quad_data = SurfaceData::make_quad();
        let quad = server
            .create_geometry_buffer(GeometryBufferDescriptor {
                name: "Quad",
                vertices: &quad_data.vertices,
                triangles: &quad_data.triangles,
            })
            .unwrap();
        let mut view = RenderView::new();
        let camera = Camera::look_at(
            Vector3::new(0.0, 0.0, 5.0),
            Vector3::zeros(),
            Vector3::y(),
            1.0,
            Vector2::new(16, 16),
        );
        let albedo = server
            .create_2d_render_target("Albedo", PixelKind::RGBA8, 16, 16)
            .unwrap();
        let settings = AssaoSettings {
            quality_level: 10,
            ..Default::default()
        };

        pass.render(AssaoRenderContext {
            server: &server,
            view: &mut view,
            quad: &*quad,
            camera: &camera,
            settings: &settings,
            depth: server
                .create_2d_render_target("Depth", PixelKind::D24S8, 16, 16)
                .unwrap(),
            normal: server
                .create_2d_render_target("Normal", PixelKind::RGBA8, 16, 16)
                .unwrap(),
            albedo: albedo.clone(),
        })
        .unwrap();

        let generate = server.draws_with("Assao");
        assert_eq!(generate.len(), 1);
        assert_eq!(
            generate[0]
                .uniform("u_ao_quality")
                .and_then(|v| v.as_vector4())
                .map(|q| q.x),
            Some(MAX_QUALITY_LEVEL as f32)
        );

        let ao = view.texture(TextureKey::Ao).unwrap().borrow().id();
        let ao_blur = view.texture(TextureKey::AoBlur).unwrap().borrow().id();
        let blur = server.draws_with("AssaoBlur");
        assert_eq!(blur.len(), 2 * settings.blur_pass_count as usize);
        assert_eq!(blur[0].color_targets, vec![ao_blur]);
        assert_eq!(blur[1].color_targets, vec![ao]);

        let apply = server.draws_with("AssaoApply");
        assert_eq!(apply.len(), 1);
        assert_eq!(apply[0].color_targets, vec![albedo.borrow().id()]);
        assert!(apply[0].params.color_write.alpha);
        assert!(!apply[0].params.color_write.red);
    }
}
