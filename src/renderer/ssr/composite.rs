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
    graphics::{
        error::FrameworkError,
        framebuffer::FrameBuffer,
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::SharedTexture,
        stats::RenderPassStatistics,
        BlendParameters, DrawParameters, ElementRange,
    },
    renderer::shader::LoadContext,
};

/// Blends resolved reflections over the lit frame, weighted by the confidence stored in alpha.
pub struct SsrComposite {
    program: Box<dyn GpuProgram>,
    reflection: UniformLocation,
    normal: UniformLocation,
    depth: UniformLocation,
}

impl SsrComposite {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program("SsrComposite", "screen_vs.glsl", "ssr_composite_fs.glsl")?;
        Ok(Self {
            reflection: program.uniform_location("s_reflection")?,
            normal: program.uniform_location("s_normal")?,
            depth: program.uniform_location("s_depth")?,
            program,
        })
    }

    pub(crate) fn render(
        &self,
        framebuffer: &mut dyn FrameBuffer,
        quad: &dyn GeometryBuffer,
        reflection: &SharedTexture,
        normal: &SharedTexture,
        depth: &SharedTexture,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();
        let viewport = framebuffer.viewport();
        stats += framebuffer.draw(
            quad,
            viewport,
            &*self.program,
            &DrawParameters::screen_pass().with_blend(BlendParameters::alpha()),
            ElementRange::Full,
            &mut |binding| {
                binding
                    .set_texture(&self.reflection, reflection)
                    .set_texture(&self.normal, normal)
                    .set_texture(&self.depth, depth);
            },
        )?;
        Ok(stats)
    }
}
