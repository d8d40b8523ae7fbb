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

//! Diagnostic view of a single intermediate channel of the frame.

use crate::{
    core::algebra::Vector4,
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
    scene::camera::Camera,
};
use strum_macros::{AsRefStr, EnumString, VariantNames};

/// Channel shown by the debug pass. The discriminant is the index accepted by
/// [`super::DeferredPipeline::set_debug_pass`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, AsRefStr, EnumString, VariantNames)]
#[repr(u32)]
pub enum DebugChannel {
    Albedo = 0,
    Normal = 1,
    /// Roughness, metalness and ambient occlusion of materials.
    Material = 2,
    Emission = 3,
    /// Linearized depth.
    Depth = 4,
    Reflection = 5,
    /// Screen-space ambient occlusion stored in the alpha of the albedo.
    AmbientOcclusion = 6,
}

impl DebugChannel {
    pub const ALL: [Self; 7] = [
        Self::Albedo,
        Self::Normal,
        Self::Material,
        Self::Emission,
        Self::Depth,
        Self::Reflection,
        Self::AmbientOcclusion,
    ];

    /// Negative or unknown indices disable the debug pass.
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }
}

pub(crate) struct DebugRenderContext<'a> {
    pub framebuffer: &'a mut dyn FrameBuffer,
    pub quad: &'a dyn GeometryBuffer,
    pub camera: &'a Camera,
    pub channel: DebugChannel,
    /// Albedo, normal, material, emission, depth and reflection buffers.
    pub textures: [SharedTexture; 6],
}

pub struct DebugPass {
    program: Box<dyn GpuProgram>,
    textures: [UniformLocation; 6],
    params: UniformLocation,
}

impl DebugPass {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program(
            "GBufferVisualize",
            "screen_vs.glsl",
            "gbuffer_visualize_fs.glsl",
        )?;
        Ok(Self {
            textures: [
                program.uniform_location("s_tex0")?,
                program.uniform_location("s_tex1")?,
                program.uniform_location("s_tex2")?,
                program.uniform_location("s_tex3")?,
                program.uniform_location("s_tex4")?,
                program.uniform_location("s_tex5")?,
            ],
            params: program.uniform_location("u_params")?,
            program,
        })
    }

    pub(crate) fn render(
        &self,
        ctx: DebugRenderContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let DebugRenderContext {
            framebuffer,
            quad,
            camera,
            channel,
            textures,
        } = ctx;

        let mut stats = RenderPassStatistics::default();
        let params = Vector4::new(
            channel as u32 as f32,
            camera.z_near(),
            camera.z_far(),
            0.0,
        );
        stats += framebuffer.draw(
            quad,
            camera.viewport(),
            &*self.program,
            &DrawParameters::screen_pass(),
            ElementRange::Full,
            &mut |binding| {
                binding.set_vector4(&self.params, &params);
                for (location, texture) in self.textures.iter().zip(textures.iter()) {
                    binding.set_texture(location, texture);
                }
            },
        )?;
        Ok(stats)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_channel_from_index() {
        assert_eq!(DebugChannel::from_index(-1), None);
        assert_eq!(DebugChannel::from_index(0), Some(DebugChannel::Albedo));
        assert_eq!(
            DebugChannel::from_index(6),
            Some(DebugChannel::AmbientOcclusion)
        );
        assert_eq!(DebugChannel::from_index(7), None);
        assert_eq!(DebugChannel::Depth.as_ref(), "Depth");
    }
}
