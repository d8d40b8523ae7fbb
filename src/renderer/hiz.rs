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

//! Hierarchical depth buffer. The base level is produced from the scene depth, every next level
//! keeps the farthest depth of the texels it covers in the previous one. Screen-space reflections
//! use it to skip empty space while marching.

use crate::{
    core::algebra::Vector4,
    graphics::{
        error::FrameworkError,
        gpu_program::{GpuProgram, ImageAccess, UniformLocation},
        gpu_texture::{full_mip_count, mip_dimension, PixelKind, SharedTexture, TextureUsage},
        server::{thread_groups_8x8, GraphicsServer, ProgramScope},
    },
    renderer::{
        shader::LoadContext,
        view::{RenderView, TextureKey, TextureSpec},
    },
};

struct GenerateShader {
    program: Box<dyn GpuProgram>,
    depth: UniformLocation,
    output: UniformLocation,
    params: UniformLocation,
}

struct DownsampleShader {
    program: Box<dyn GpuProgram>,
    input: UniformLocation,
    output: UniformLocation,
    params: UniformLocation,
}

pub struct HiZBuilder {
    generate: GenerateShader,
    downsample: DownsampleShader,
}

impl HiZBuilder {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let generate = ctx.compute_program("HiZGenerate", "hiz_generate_cs.glsl")?;
        let downsample = ctx.compute_program("HiZDownsample", "hiz_downsample_cs.glsl")?;
        Ok(Self {
            generate: GenerateShader {
                depth: generate.uniform_location("s_depth")?,
                output: generate.uniform_location("u_output")?,
                params: generate.uniform_location("u_hiz_params")?,
                program: generate,
            },
            downsample: DownsampleShader {
                input: downsample.uniform_location("u_input")?,
                output: downsample.uniform_location("u_output")?,
                params: downsample.uniform_location("u_hiz_params")?,
                program: downsample,
            },
        })
    }

    /// Builds the pyramid from `depth` and returns it.
    pub fn build(
        &self,
        server: &dyn GraphicsServer,
        view: &mut RenderView,
        depth: &SharedTexture,
        width: usize,
        height: usize,
    ) -> Result<SharedTexture, FrameworkError> {
        let mip_count = full_mip_count(width, height);
        let hiz = view.get_or_create(
            server,
            TextureKey::HiZBuffer,
            &TextureSpec::render_target(width, height, PixelKind::R32F)
                .with_mip_count(mip_count)
                .with_usage(TextureUsage::COMPUTE_WRITE),
        )?;

        {
            let scope = ProgramScope::new(server, &*self.generate.program);
            let params = Vector4::new(width as f32, height as f32, 0.0, 0.0);
            scope.dispatch(thread_groups_8x8(width, height), &mut |binding| {
                binding
                    .set_texture(&self.generate.depth, depth)
                    .set_image(&self.generate.output, &hiz, 0, ImageAccess::Write)
                    .set_vector4(&self.generate.params, &params);
            })?;
        }

        // One bracket for the whole chain.
        let scope = ProgramScope::new(server, &*self.downsample.program);
        for mip in 1..mip_count {
            let (mw, mh) = (mip_dimension(width, mip), mip_dimension(height, mip));
            let params = Vector4::new(mw as f32, mh as f32, 2.0, mip as f32);
            scope.dispatch(thread_groups_8x8(mw, mh), &mut |binding| {
                binding
                    .set_image(&self.downsample.input, &hiz, mip - 1, ImageAccess::Read)
                    .set_image(&self.downsample.output, &hiz, mip, ImageAccess::Write)
                    .set_vector4(&self.downsample.params, &params);
            })?;
        }

        Ok(hiz)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graphics::headless::{Command, HeadlessGraphicsServer};
    use crate::renderer::shader::EmbeddedShaders;

    #[test]
    fn test_downsampling_shares_one_program_scope() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let builder = HiZBuilder::new(&ctx).unwrap();
        let mut view = RenderView::new();
        let depth = server
            .create_2d_render_target("Depth", PixelKind::D32F, 64, 32)
            .unwrap();

        let hiz = builder.build(&server, &mut view, &depth, 64, 32).unwrap();
        assert_eq!(hiz.borrow().mip_count(), 7);

        let generate = server.dispatches_with("HiZGenerate");
        assert_eq!(generate.len(), 1);
        assert_eq!(generate[0].groups, [8, 4, 1]);

        let downsample = server.dispatches_with("HiZDownsample");
        assert_eq!(downsample.len(), 6);
        assert!(downsample.iter().all(|d| d.scoped));
        assert_eq!(server.count_begin("HiZDownsample"), 1);
        assert_eq!(
            downsample[0].uniform("u_hiz_params").and_then(|v| v.as_vector4()),
            Some(Vector4::new(32.0, 16.0, 2.0, 1.0))
        );
        // The last level is a single texel.
        assert_eq!(downsample[5].groups, [1, 1, 1]);

        // Every dispatch happens between the begin and end of the program.
        let commands = server.commands();
        let begin = commands
            .iter()
            .position(|c| matches!(c, Command::BeginProgram(name) if name == "HiZDownsample"))
            .unwrap();
        let end = commands
            .iter()
            .position(|c| matches!(c, Command::EndProgram(name) if name == "HiZDownsample"))
            .unwrap();
        assert!(begin < end);
    }

    #[test]
    fn test_single_pixel_has_no_downsampling() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let builder = HiZBuilder::new(&ctx).unwrap();
        let mut view = RenderView::new();
        let depth = server
            .create_2d_render_target("Depth", PixelKind::D32F, 1, 1)
            .unwrap();
        builder.build(&server, &mut view, &depth, 1, 1).unwrap();
        assert!(server.dispatches_with("HiZDownsample").is_empty());
        assert_eq!(server.count_begin("HiZDownsample"), 1);
    }
}
