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
    core::algebra::{Matrix4, Vector4},
    graphics::{
        error::FrameworkError,
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::SharedTexture,
        server::GraphicsServer,
        stats::RenderPassStatistics,
        DrawParameters, ElementRange,
    },
    renderer::{
        settings::SsrSettings,
        shader::LoadContext,
        view::{FrameBufferKey, RenderView},
    },
};

pub(crate) struct ResolveInputs<'a> {
    pub current: &'a SharedTexture,
    pub history: &'a SharedTexture,
    pub temp: &'a SharedTexture,
    pub normal: &'a SharedTexture,
    pub material: &'a SharedTexture,
    pub depth: &'a SharedTexture,
    pub prev_view_projection: Matrix4<f32>,
    pub inv_view_projection: Matrix4<f32>,
}

/// Blends the current trace with reprojected history.
pub struct SsrTemporal {
    program: Box<dyn GpuProgram>,
    current: UniformLocation,
    history: UniformLocation,
    normal: UniformLocation,
    material: UniformLocation,
    depth: UniformLocation,
    temporal_params: UniformLocation,
    motion_params: UniformLocation,
    fade_params: UniformLocation,
    prev_view_proj: UniformLocation,
    inv_view_proj: UniformLocation,
}

impl SsrTemporal {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program("SsrTemporal", "screen_vs.glsl", "ssr_temporal_fs.glsl")?;
        Ok(Self {
            current: program.uniform_location("s_ssr_curr")?,
            history: program.uniform_location("s_ssr_history")?,
            normal: program.uniform_location("s_normal")?,
            material: program.uniform_location("s_material")?,
            depth: program.uniform_location("s_depth")?,
            temporal_params: program.uniform_location("u_temporal_params")?,
            motion_params: program.uniform_location("u_motion_params")?,
            fade_params: program.uniform_location("u_fade_params")?,
            prev_view_proj: program.uniform_location("u_prev_view_proj")?,
            inv_view_proj: program.uniform_location("u_inv_view_proj")?,
            program,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.program.is_valid()
    }

    /// Resolves into the temporary target. The caller copies it into the history afterwards,
    /// the history is never written while it is being read.
    pub(crate) fn render(
        &self,
        server: &dyn GraphicsServer,
        view: &mut RenderView,
        quad: &dyn GeometryBuffer,
        settings: &SsrSettings,
        inputs: &ResolveInputs,
        stats: &mut RenderPassStatistics,
    ) -> Result<(), FrameworkError> {
        let temporal = &settings.temporal;
        let temporal_params = Vector4::new(
            temporal.enabled as u32 as f32,
            temporal.strength,
            temporal.depth_threshold,
            temporal.roughness_sensitivity,
        );
        let motion_params = Vector4::new(
            temporal.motion_scale,
            temporal.normal_dot_threshold,
            temporal.max_accumulation_frames as f32,
            0.0,
        );
        let scale = if settings.half_resolution { 0.5 } else { 1.0 };
        let fade_params = Vector4::new(
            settings.screen_edge_fade_start,
            settings.screen_edge_fade_end,
            scale,
            0.0,
        );

        let framebuffer = view.framebuffer(
            server,
            FrameBufferKey::SsrHistoryTemp,
            None,
            &[inputs.temp.clone()],
        )?;
        let viewport = framebuffer.viewport();
        *stats += framebuffer.draw(
            quad,
            viewport,
            &*self.program,
            &DrawParameters::screen_pass(),
            ElementRange::Full,
            &mut |binding| {
                binding
                    .set_texture(&self.current, inputs.current)
                    .set_texture(&self.history, inputs.history)
                    .set_texture(&self.normal, inputs.normal)
                    .set_texture(&self.material, inputs.material)
                    .set_texture(&self.depth, inputs.depth)
                    .set_vector4(&self.temporal_params, &temporal_params)
                    .set_vector4(&self.motion_params, &motion_params)
                    .set_vector4(&self.fade_params, &fade_params)
                    .set_matrix4(&self.prev_view_proj, &inputs.prev_view_projection)
                    .set_matrix4(&self.inv_view_proj, &inputs.inv_view_projection);
            },
        )?;
        Ok(())
    }
}
