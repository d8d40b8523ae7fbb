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

//! World-space overlays. Every text label is drawn as a flat-colored box over its bounds, depth
//! tested against the scene so labels are occluded by geometry in front of them.

use crate::{
    core::algebra::Matrix4,
    graphics::{
        error::FrameworkError,
        framebuffer::FrameBuffer,
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        stats::RenderPassStatistics,
        BlendParameters, CompareFunc, DrawParameters, ElementRange,
    },
    renderer::shader::LoadContext,
    scene::{camera::Camera, Scene},
};

pub(crate) struct UiRenderContext<'a> {
    /// Output color buffer with the scene depth attached.
    pub framebuffer: &'a mut dyn FrameBuffer,
    /// Unit cube.
    pub cube: &'a dyn GeometryBuffer,
    pub scene: &'a Scene,
    pub camera: &'a Camera,
}

pub struct UiPass {
    program: Box<dyn GpuProgram>,
    world_view_projection: UniformLocation,
    color: UniformLocation,
}

impl UiPass {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program("Text", "flat_vs.glsl", "text_fs.glsl")?;
        Ok(Self {
            world_view_projection: program.uniform_location("u_world_view_projection")?,
            color: program.uniform_location("u_color")?,
            program,
        })
    }

    pub(crate) fn render(
        &self,
        ctx: UiRenderContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let UiRenderContext {
            framebuffer,
            cube,
            scene,
            camera,
        } = ctx;

        let mut stats = RenderPassStatistics::default();
        let view_projection = camera.view_projection_matrix();
        let params = DrawParameters::screen_pass()
            .with_depth_test(CompareFunc::LessOrEqual)
            .with_blend(BlendParameters::alpha());

        for (_, entity, label) in scene.texts() {
            if !label.bounds.is_valid()
                || !camera.test_obb(&label.bounds, entity.global_transform())
            {
                continue;
            }

            let local = Matrix4::new_translation(&label.bounds.center())
                * Matrix4::new_nonuniform_scaling(&(label.bounds.half_extents() * 2.0));
            let world_view_projection = view_projection * entity.global_transform() * local;
            let color = label.color.as_frgba();

            stats += framebuffer.draw(
                cube,
                camera.viewport(),
                &*self.program,
                &params,
                ElementRange::Full,
                &mut |binding| {
                    binding
                        .set_matrix4(&self.world_view_projection, &world_view_projection)
                        .set_vector4(&self.color, &color);
                },
            )?;
        }

        Ok(stats)
    }
}
