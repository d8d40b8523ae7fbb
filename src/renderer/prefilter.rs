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

//! Cube map prefiltering for image based lighting. Each mip level of the destination cube map
//! stores the environment convolved with a GGX lobe of increasing roughness.

use crate::{
    core::algebra::Vector4,
    graphics::{
        error::FrameworkError,
        gpu_program::{GpuProgram, ImageAccess, UniformLocation},
        gpu_texture::{mip_dimension, CubeMapFace, SharedTexture},
        server::{thread_groups_8x8, BlitRegion, GraphicsServer, ProgramScope},
    },
    renderer::shader::LoadContext,
};

struct Shader {
    program: Box<dyn GpuProgram>,
    environment: UniformLocation,
    output: UniformLocation,
    data: UniformLocation,
}

pub struct PrefilterPass {
    shader: Shader,
}

impl PrefilterPass {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.compute_program("Prefilter", "prefilter_cs.glsl")?;
        Ok(Self {
            shader: Shader {
                environment: program.uniform_location("s_env")?,
                output: program.uniform_location("u_output")?,
                data: program.uniform_location("u_data")?,
                program,
            },
        })
    }

    /// Convolves `source` into every mip of `dest`. Faces are selected by the z coordinate of
    /// the thread group.
    pub fn prefilter(
        &self,
        server: &dyn GraphicsServer,
        source: &SharedTexture,
        dest: &SharedTexture,
    ) -> Result<(), FrameworkError> {
        let (size, mip_count) = {
            let dest = dest.borrow();
            (dest.kind().width(), dest.mip_count())
        };

        let scope = ProgramScope::new(server, &*self.shader.program);
        for mip in 0..mip_count {
            let dim = mip_dimension(size, mip);
            let mut groups = thread_groups_8x8(dim, dim);
            groups[2] = CubeMapFace::ALL.len() as u32;
            let data = Vector4::new(mip as f32, 0.0, size as f32, mip_count as f32);
            scope.dispatch(groups, &mut |binding| {
                binding
                    .set_texture(&self.shader.environment, source)
                    .set_image(&self.shader.output, dest, mip, ImageAccess::Write)
                    .set_vector4(&self.shader.data, &data);
            })?;
        }

        Ok(())
    }
}

/// Fallback for disabled prefiltering: copies the base level of every face as is.
pub fn copy_cube_faces(
    server: &dyn GraphicsServer,
    source: &SharedTexture,
    dest: &SharedTexture,
) -> Result<(), FrameworkError> {
    for face in CubeMapFace::ALL {
        server.blit(
            BlitRegion {
                texture: source.clone(),
                mip: 0,
                face: Some(face),
            },
            BlitRegion {
                texture: dest.clone(),
                mip: 0,
                face: Some(face),
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        graphics::{
            gpu_texture::{GpuTextureDescriptor, GpuTextureKind, PixelKind, TextureUsage},
            headless::{Command, HeadlessGraphicsServer},
        },
        renderer::shader::EmbeddedShaders,
    };

    fn cube(server: &HeadlessGraphicsServer, mip_count: usize) -> SharedTexture {
        server
            .create_texture(GpuTextureDescriptor {
                name: "Cube",
                kind: GpuTextureKind::Cube {
                    width: 32,
                    height: 32,
                },
                pixel_kind: PixelKind::RGBA8,
                mip_count,
                usage: TextureUsage::SAMPLED
                    | TextureUsage::COMPUTE_WRITE
                    | TextureUsage::BLIT_DESTINATION,
            })
            .unwrap()
    }

    #[test]
    fn test_every_mip_is_dispatched_once() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let pass = PrefilterPass::new(&ctx).unwrap();
        let source = cube(&server, 1);
        let dest = cube(&server, 6);

        pass.prefilter(&server, &source, &dest).unwrap();

        let dispatches = server.dispatches_with("Prefilter");
        assert_eq!(dispatches.len(), 6);
        assert!(dispatches.iter().all(|d| d.scoped));
        assert_eq!(dispatches[0].groups, [4, 4, 6]);
        assert_eq!(dispatches[5].groups, [1, 1, 6]);
        assert_eq!(
            dispatches[2].uniform("u_data").and_then(|v| v.as_vector4()),
            Some(Vector4::new(2.0, 0.0, 32.0, 6.0))
        );
        assert_eq!(server.count_begin("Prefilter"), 1);
    }

    #[test]
    fn test_copy_blits_every_face() {
        let server = HeadlessGraphicsServer::new();
        let source = cube(&server, 1);
        let dest = cube(&server, 6);
        copy_cube_faces(&server, &source, &dest).unwrap();
        let blits = server.blits();
        assert_eq!(blits.len(), 6);
        assert!(matches!(
            blits[5],
            Command::Blit {
                dest_face: Some(CubeMapFace::NegativeZ),
                ..
            }
        ));
    }
}
