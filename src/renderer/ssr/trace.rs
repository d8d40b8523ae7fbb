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
    core::algebra::{Matrix4, Vector3, Vector4},
    graphics::{
        error::FrameworkError,
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::{PixelKind, SharedTexture},
        server::GraphicsServer,
        stats::RenderPassStatistics,
        DrawParameters, ElementRange,
    },
    renderer::{
        settings::SsrSettings,
        shader::LoadContext,
        view::{FrameBufferKey, RenderView, TextureKey, TextureSpec},
    },
};

struct Shader {
    program: Box<dyn GpuProgram>,
    color: UniformLocation,
    normal: UniformLocation,
    material: UniformLocation,
    depth: UniformLocation,
    hiz: UniformLocation,
    color_blurred: UniformLocation,
    ssr_params: UniformLocation,
    hiz_params: UniformLocation,
    fade_params: UniformLocation,
    cone_params: UniformLocation,
    prev_view_proj: UniformLocation,
    view_proj: UniformLocation,
    inv_view_proj: UniformLocation,
    camera_position: UniformLocation,
}

pub(crate) struct TraceInputs<'a> {
    pub color: &'a SharedTexture,
    pub normal: &'a SharedTexture,
    /// Roughness in the red channel.
    pub material: &'a SharedTexture,
    pub depth: &'a SharedTexture,
    pub hiz: &'a SharedTexture,
    /// Blurred color chain of the previous frame, `None` disables cone tracing.
    pub color_blurred: Option<&'a SharedTexture>,
    pub view_projection: Matrix4<f32>,
    pub prev_view_projection: Matrix4<f32>,
    pub camera_position: Vector3<f32>,
    pub frame: u64,
}

/// Hi-Z accelerated ray marching.
pub struct SsrTrace {
    shader: Shader,
}

impl SsrTrace {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program("SsrTrace", "screen_vs.glsl", "ssr_trace_fs.glsl")?;
        Ok(Self {
            shader: Shader {
                color: program.uniform_location("s_color")?,
                normal: program.uniform_location("s_normal")?,
                material: program.uniform_location("s_material")?,
                depth: program.uniform_location("s_depth")?,
                hiz: program.uniform_location("s_hiz")?,
                color_blurred: program.uniform_location("s_color_blurred")?,
                ssr_params: program.uniform_location("u_ssr_params")?,
                hiz_params: program.uniform_location("u_hiz_params")?,
                fade_params: program.uniform_location("u_fade_params")?,
                cone_params: program.uniform_location("u_cone_params")?,
                prev_view_proj: program.uniform_location("u_prev_view_proj")?,
                view_proj: program.uniform_location("u_view_proj")?,
                inv_view_proj: program.uniform_location("u_inv_view_proj")?,
                camera_position: program.uniform_location("u_camera_position")?,
                program,
            },
        })
    }

    /// Size of the trace target for a frame of the given size.
    pub fn trace_size(settings: &SsrSettings, width: usize, height: usize) -> (usize, usize) {
        if settings.half_resolution {
            ((width / 2).max(1), (height / 2).max(1))
        } else {
            (width, height)
        }
    }

    /// Traces reflections into `SSR_CURR` and returns it.
    pub(crate) fn render(
        &self,
        server: &dyn GraphicsServer,
        view: &mut RenderView,
        quad: &dyn GeometryBuffer,
        settings: &SsrSettings,
        inputs: &TraceInputs,
        stats: &mut RenderPassStatistics,
    ) -> Result<SharedTexture, FrameworkError> {
        let (hiz_width, hiz_height, hiz_mips) = {
            let hiz = inputs.hiz.borrow();
            (hiz.kind().width(), hiz.kind().height(), hiz.mip_count())
        };
        let (width, height) = Self::trace_size(settings, hiz_width, hiz_height);
        let target = view.get_or_create(
            server,
            TextureKey::SsrCurr,
            &TextureSpec::render_target(width, height, PixelKind::RGBA16F),
        )?;

        let scale = if settings.half_resolution { 0.5 } else { 1.0 };
        let ssr_params = Vector4::new(
            settings.max_steps as f32,
            settings.depth_tolerance,
            settings.max_rays as f32,
            settings.brightness,
        );
        let hiz_params = Vector4::new(hiz_width as f32, hiz_height as f32, hiz_mips as f32, scale);
        let fade_params = Vector4::new(
            settings.screen_edge_fade_start,
            settings.screen_edge_fade_end,
            settings.roughness_depth_tolerance,
            settings.facing_reflections_fading,
        );
        let cone = &settings.cone_tracing;
        let cone_enabled = cone.enabled && inputs.color_blurred.is_some();
        let cone_params = Vector4::new(
            cone.angle_bias,
            cone.max_mip as f32,
            (inputs.frame % 4) as f32,
            cone_enabled as u32 as f32,
        );
        let inv_view_proj = inputs
            .view_projection
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);
        let color_blurred = inputs.color_blurred.unwrap_or(inputs.color);

        let framebuffer =
            view.framebuffer(server, FrameBufferKey::SsrCurr, None, &[target.clone()])?;
        let viewport = framebuffer.viewport();
        let shader = &self.shader;
        *stats += framebuffer.draw(
            quad,
            viewport,
            &*shader.program,
            &DrawParameters::screen_pass(),
            ElementRange::Full,
            &mut |binding| {
                binding
                    .set_texture(&shader.color, inputs.color)
                    .set_texture(&shader.normal, inputs.normal)
                    .set_texture(&shader.material, inputs.material)
                    .set_texture(&shader.depth, inputs.depth)
                    .set_texture(&shader.hiz, inputs.hiz)
                    .set_texture(&shader.color_blurred, color_blurred)
                    .set_vector4(&shader.ssr_params, &ssr_params)
                    .set_vector4(&shader.hiz_params, &hiz_params)
                    .set_vector4(&shader.fade_params, &fade_params)
                    .set_vector4(&shader.cone_params, &cone_params)
                    .set_matrix4(&shader.prev_view_proj, &inputs.prev_view_projection)
                    .set_matrix4(&shader.view_proj, &inputs.view_projection)
                    .set_matrix4(&shader.inv_view_proj, &inv_view_proj)
                    .set_vector3(&shader.camera_position, &inputs.camera_position);
            },
        )?;

        Ok(target)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_half_resolution_trace_size() {
        let mut settings = SsrSettings::default();
        assert_eq!(SsrTrace::trace_size(&settings, 640, 480), (640, 480));
        settings.half_resolution = true;
        assert_eq!(SsrTrace::trace_size(&settings, 640, 480), (320, 240));
        assert_eq!(SsrTrace::trace_size(&settings, 1, 1), (1, 1));
    }
}
