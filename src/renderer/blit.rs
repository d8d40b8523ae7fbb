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
    core::math::Rect,
    graphics::{
        error::FrameworkError,
        framebuffer::FrameBuffer,
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::SharedTexture,
        stats::RenderPassStatistics,
        DrawParameters, ElementRange,
    },
    renderer::shader::LoadContext,
};

/// Copies a texture into a frame buffer with a full-screen draw. Unlike a server blit, the source
/// may differ in size or format from the target.
pub struct BlitPass {
    program: Box<dyn GpuProgram>,
    input: UniformLocation,
}

impl BlitPass {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program("Blit", "screen_vs.glsl", "blit_fs.glsl")?;
        Ok(Self {
            input: program.uniform_location("s_input")?,
            program,
        })
    }

    pub(crate) fn render(
        &self,
        framebuffer: &mut dyn FrameBuffer,
        quad: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        input: &SharedTexture,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();
        stats += framebuffer.draw(
            quad,
            viewport,
            &*self.program,
            &DrawParameters::screen_pass(),
            ElementRange::Full,
            &mut |binding| {
                binding.set_texture(&self.input, input);
            },
        )?;
        Ok(stats)
    }
}
