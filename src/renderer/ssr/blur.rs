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

//! Blurred color chain for cone traced reflections. Mip 0 is a copy of the lit frame, every next
//! mip is a downsampled gaussian blur of the previous one with a wider kernel. Rough surfaces
//! sample deeper mips.

use crate::{
    core::algebra::Vector4,
    graphics::{
        error::FrameworkError,
        gpu_program::{GpuProgram, ImageAccess, UniformLocation},
        gpu_texture::{full_mip_count, mip_dimension, SharedTexture, TextureUsage},
        server::{thread_groups_8x8, BlitRegion, GraphicsServer, ProgramScope},
    },
    renderer::{
        settings::ConeTracingSettings,
        shader::LoadContext,
        view::{RenderView, TextureKey, TextureSpec},
    },
};

pub struct SsrBlur {
    program: Box<dyn GpuProgram>,
    input: UniformLocation,
    output: UniformLocation,
    material: UniformLocation,
    blur_params: UniformLocation,
    roughness_multiplier: UniformLocation,
}

impl SsrBlur {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.compute_program("SsrBlur", "ssr_blur_cs.glsl")?;
        Ok(Self {
            input: program.uniform_location("u_input")?,
            output: program.uniform_location("u_output")?,
            material: program.uniform_location("s_material")?,
            blur_params: program.uniform_location("u_blur_params")?,
            roughness_multiplier: program.uniform_location("u_roughness_multiplier")?,
            program,
        })
    }

    /// Amount of mips in the blurred chain.
    pub fn chain_length(settings: &ConeTracingSettings, width: usize, height: usize) -> usize {
        (settings.max_mip as usize + 1).min(full_mip_count(width, height))
    }

    /// Rebuilds the chain from `color`, the blur radius grows with the roughness stored in the
    /// red channel of `material`. Returns the chain and whether it was just created, in which
    /// case it has no data from previous frames.
    pub fn build(
        &self,
        server: &dyn GraphicsServer,
        view: &mut RenderView,
        settings: &ConeTracingSettings,
        color: &SharedTexture,
        material: &SharedTexture,
    ) -> Result<(SharedTexture, bool), FrameworkError> {
        let (width, height, pixel_kind) = {
            let color = color.borrow();
            (color.kind().width(), color.kind().height(), color.pixel_kind())
        };
        let mip_count = Self::chain_length(settings, width, height);
        let (chain, created) = view.ensure(
            server,
            TextureKey::SsrBlurredColor,
            &TextureSpec::render_target(width, height, pixel_kind)
                .with_mip_count(mip_count)
                .with_usage(TextureUsage::COMPUTE_WRITE | TextureUsage::BLIT_DESTINATION),
        )?;

        server.blit(BlitRegion::base(color), BlitRegion::base(&chain))?;

        let scope = ProgramScope::new(server, &*self.program);
        for mip in 1..mip_count {
            let (mw, mh) = (mip_dimension(width, mip), mip_dimension(height, mip));
            let params = Vector4::new(mip as f32, settings.blur_base_sigma * mip as f32, 0.0, 0.0);
            scope.dispatch(thread_groups_8x8(mw, mh), &mut |binding| {
                binding
                    .set_image(&self.input, &chain, mip - 1, ImageAccess::Read)
                    .set_image(&self.output, &chain, mip, ImageAccess::Write)
                    .set_texture(&self.material, material)
                    .set_vector4(&self.blur_params, &params)
                    .set_f32(&self.roughness_multiplier, settings.roughness_multiplier);
            })?;
        }

        Ok((chain, created))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        graphics::{gpu_texture::PixelKind, headless::HeadlessGraphicsServer},
        renderer::shader::EmbeddedShaders,
    };

    #[test]
    fn test_blur_radius_grows_with_mip() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let blur = SsrBlur::new(&ctx).unwrap();
        let mut view = RenderView::new();
        let color = server
            .create_2d_render_target("Color", PixelKind::RGBA16F, 64, 64)
            .unwrap();
        let material = server
            .create_2d_render_target("Material", PixelKind::RGBA8, 64, 64)
            .unwrap();
        let settings = ConeTracingSettings {
            enabled: true,
            max_mip: 3,
            blur_base_sigma: 2.0,
            ..Default::default()
        };

        let (chain, created) = blur
            .build(&server, &mut view, &settings, &color, &material)
            .unwrap();
        assert!(created);
        assert_eq!(chain.borrow().mip_count(), 4);
        assert_eq!(server.blits().len(), 1);

        let dispatches = server.dispatches_with("SsrBlur");
        let sigmas = dispatches
            .iter()
            .filter_map(|d| d.uniform("u_blur_params").and_then(|v| v.as_vector4()))
            .map(|p| p.y)
            .collect::<Vec<_>>();
        assert_eq!(sigmas, vec![2.0, 4.0, 6.0]);

        let (_, created) = blur
            .build(&server, &mut view, &settings, &color, &material)
            .unwrap();
        assert!(!created);
    }
}
