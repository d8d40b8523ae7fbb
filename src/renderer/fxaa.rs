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
    core::{
        algebra::{Vector2, Vector4},
        math::Rect,
    },
    graphics::{
        error::FrameworkError,
        framebuffer::FrameBuffer,
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::SharedTexture,
        stats::RenderPassStatistics,
        DrawParameters, ElementRange,
    },
    renderer::{settings::FxaaSettings, shader::LoadContext},
};

struct FxaaShader {
    program: Box<dyn GpuProgram>,
    input: UniformLocation,
    inverse_screen_size: UniformLocation,
    fxaa_params: UniformLocation,
}

pub struct FxaaPass {
    shader: FxaaShader,
}

impl FxaaPass {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program("Fxaa", "screen_vs.glsl", "fxaa_fs.glsl")?;
        Ok(Self {
            shader: FxaaShader {
                input: program.uniform_location("s_input")?,
                inverse_screen_size: program.uniform_location("u_inverse_screen_size")?,
                fxaa_params: program.uniform_location("u_fxaa_params")?,
                program,
            },
        })
    }

    pub(crate) fn render(
        &self,
        framebuffer: &mut dyn FrameBuffer,
        quad: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        input: &SharedTexture,
        settings: &FxaaSettings,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        let shader = &self.shader;
        let inverse_screen_size = Vector2::new(
            1.0 / viewport.w().max(1) as f32,
            1.0 / viewport.h().max(1) as f32,
        );
        let params = Vector4::new(
            settings.edge_threshold,
            settings.edge_threshold_min,
            settings.subpixel_quality,
            0.0,
        );

        stats += framebuffer.draw(
            quad,
            viewport,
            &*shader.program,
            &DrawParameters::screen_pass(),
            ElementRange::Full,
            &mut |binding| {
                binding
                    .set_texture(&shader.input, input)
                    .set_vector2(&shader.inverse_screen_size, &inverse_screen_size)
                    .set_vector4(&shader.fxaa_params, &params);
            },
        )?;

        Ok(stats)
    }
}
