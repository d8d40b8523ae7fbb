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

//! Reflection compositing. Captured probes are blended into the reflection buffer, which is later
//! consumed by the lighting pass as the indirect specular term.

use crate::{
    core::{
        algebra::{Matrix4, Vector3, Vector4},
        color::Color,
        math::{projected_sphere_rect, screen_rect_of_points, Matrix4Ext, Rect},
        pool::Handle,
    },
    graphics::{
        error::FrameworkError,
        framebuffer::FrameBuffer,
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::SharedTexture,
        BlendParameters, DrawParameters, ElementRange,
    },
    renderer::{probe::ProbeRenderer, shader::LoadContext, stats::FrameStatistics},
    scene::{
        camera::Camera,
        probe::{ProbeShape, ReflectMethod, ReflectionProbe},
        Entity, Scene,
    },
};
use std::cmp::Ordering;

struct Shader {
    program: Box<dyn GpuProgram>,
    data0: UniformLocation,
    data1: UniformLocation,
    data2: UniformLocation,
    inv_world: UniformLocation,
    camera_position: UniformLocation,
    inv_view_proj: UniformLocation,
    textures: [UniformLocation; 5],
    cubemap: UniformLocation,
}

impl Shader {
    fn new(ctx: &LoadContext, name: &str, defines: &[&str]) -> Result<Self, FrameworkError> {
        let program = ctx.program_with_defines(
            name,
            "screen_vs.glsl",
            "reflection_probe_fs.glsl",
            defines,
        )?;
        Ok(Self {
            data0: program.uniform_location("u_data0")?,
            data1: program.uniform_location("u_data1")?,
            data2: program.uniform_location("u_data2")?,
            inv_world: program.uniform_location("u_inv_world")?,
            camera_position: program.uniform_location("u_camera_position")?,
            inv_view_proj: program.uniform_location("u_inv_view_proj")?,
            textures: [
                program.uniform_location("s_tex0")?,
                program.uniform_location("s_tex1")?,
                program.uniform_location("s_tex2")?,
                program.uniform_location("s_tex3")?,
                program.uniform_location("s_tex4")?,
            ],
            cubemap: program.uniform_location("s_tex_cube")?,
            program,
        })
    }
}

/// Probe compositing order: static probes go before environment ones, larger probes go before
/// smaller ones, so small local probes overwrite large ones.
pub fn compare_probes(a: (ReflectMethod, f32), b: (ReflectMethod, f32)) -> Ordering {
    a.0.cmp(&b.0).then_with(|| b.1.total_cmp(&a.1))
}

/// Active probes of the scene in compositing order.
pub fn sorted_probes(scene: &Scene) -> Vec<(Handle<Entity>, &Entity, &ReflectionProbe)> {
    let mut probes = scene.probes().collect::<Vec<_>>();
    probes.sort_by(|(_, ea, a), (_, eb, b)| {
        compare_probes(
            (a.method(), a.max_range(ea.global_scale())),
            (b.method(), b.max_range(eb.global_scale())),
        )
    });
    probes
}

fn probe_scissor_rect(
    probe: &ReflectionProbe,
    entity: &Entity,
    camera: &Camera,
) -> Option<Rect<i32>> {
    if !camera.test_obb(&probe.local_bounds(), entity.global_transform()) {
        return None;
    }
    let viewport = camera.viewport();
    let view_projection = camera.view_projection_matrix();
    let rect = match probe.shape() {
        ProbeShape::Sphere { .. } => projected_sphere_rect(
            entity.global_position(),
            probe.max_range(entity.global_scale()),
            camera.position(),
            &view_projection,
            viewport,
        ),
        ProbeShape::Box { .. } => screen_rect_of_points(
            &probe
                .local_bounds()
                .oriented_corners(entity.global_transform()),
            &view_projection,
            viewport,
        ),
    };
    rect.filter(|r| !r.is_degenerate())
}

pub(crate) struct ReflectionRenderContext<'a> {
    pub framebuffer: &'a mut dyn FrameBuffer,
    pub quad: &'a dyn GeometryBuffer,
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    pub probes: &'a ProbeRenderer,
    /// Albedo, normal, material, emission and depth of the G-buffer.
    pub gbuffer: [SharedTexture; 5],
    pub stats: &'a mut FrameStatistics,
}

pub struct ReflectionPass {
    sphere: Shader,
    box_shape: Shader,
}

impl ReflectionPass {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        Ok(Self {
            sphere: Shader::new(ctx, "SphereReflectionProbe", &[])?,
            box_shape: Shader::new(ctx, "BoxReflectionProbe", &["BOX"])?,
        })
    }

    pub(crate) fn render(&self, ctx: ReflectionRenderContext) -> Result<(), FrameworkError> {
        let ReflectionRenderContext {
            framebuffer,
            quad,
            scene,
            camera,
            probes,
            gbuffer,
            stats,
        } = ctx;

        let viewport = camera.viewport();
        framebuffer.clear(viewport, Some(Color::TRANSPARENT), None, None);

        let camera_position = camera.position();
        let inv_view_proj = camera
            .view_projection_matrix()
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);

        for (handle, entity, probe) in sorted_probes(scene) {
            let Some(cubemap) = probes.cubemap(handle) else {
                continue;
            };
            let Some(scissor) = probe_scissor_rect(probe, entity, camera) else {
                continue;
            };

            let (shader, data2) = match *probe.shape() {
                ProbeShape::Sphere { .. } => (&self.sphere, Vector4::zeros()),
                ProbeShape::Box {
                    transition_distance,
                    ..
                } => {
                    let extents = probe.capture_extents(entity.global_scale());
                    (
                        &self.box_shape,
                        Vector4::new(extents.x, extents.y, extents.z, transition_distance),
                    )
                }
            };

            let world = entity.global_transform_without_scale();
            let inv_world = world.try_inverse().unwrap_or_else(Matrix4::identity);
            let position: Vector3<f32> = world.position();
            let data0 = Vector4::new(
                position.x,
                position.y,
                position.z,
                probe.max_range(entity.global_scale()),
            );
            let data1 = Vector4::new(
                cubemap.borrow().mip_count() as f32,
                probe.intensity(),
                0.0,
                0.0,
            );

            stats.probes += framebuffer.draw(
                quad,
                viewport,
                &*shader.program,
                &DrawParameters::screen_pass()
                    .with_blend(BlendParameters::alpha())
                    .with_scissor(scissor),
                ElementRange::Full,
                &mut |binding| {
                    binding
                        .set_vector4(&shader.data0, &data0)
                        .set_vector4(&shader.data1, &data1)
                        .set_vector4(&shader.data2, &data2)
                        .set_matrix4(&shader.inv_world, &inv_world)
                        .set_vector3(&shader.camera_position, &camera_position)
                        .set_matrix4(&shader.inv_view_proj, &inv_view_proj)
                        .set_texture(&shader.cubemap, cubemap);
                    for (location, texture) in shader.textures.iter().zip(gbuffer.iter()) {
                        binding.set_texture(location, texture);
                    }
                },
            )?;
            stats.probes_composited += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scene::EntityBuilder;

    #[test]
    fn test_probe_order() {
        let mut scene = Scene::new();
        let environment = EntityBuilder::new("Environment")
            .with_probe(ReflectionProbe::new(
                ReflectMethod::Environment,
                ProbeShape::Sphere { range: 10.0 },
            ))
            .build(&mut scene);
        let small = EntityBuilder::new("Small")
            .with_probe(ReflectionProbe::new(
                ReflectMethod::StaticOnly,
                ProbeShape::Sphere { range: 5.0 },
            ))
            .build(&mut scene);
        let large = EntityBuilder::new("Large")
            .with_probe(ReflectionProbe::new(
                ReflectMethod::StaticOnly,
                ProbeShape::Sphere { range: 20.0 },
            ))
            .build(&mut scene);

        let order = sorted_probes(&scene)
            .into_iter()
            .map(|(handle, _, _)| handle)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![large, small, environment]);
    }

    #[test]
    fn test_compare_probes() {
        assert_eq!(
            compare_probes(
                (ReflectMethod::Environment, 100.0),
                (ReflectMethod::StaticOnly, 1.0)
            ),
            Ordering::Greater
        );
        assert_eq!(
            compare_probes(
                (ReflectMethod::StaticOnly, 2.0),
                (ReflectMethod::StaticOnly, 1.0)
            ),
            Ordering::Less
        );
    }
}
