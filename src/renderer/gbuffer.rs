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

//! Geometry pass fills the G-buffer: albedo, normals, material parameters, emission and depth.
//! Models are drawn with the LOD selected by their screen coverage, a model in a LOD
//! transition is drawn twice with complementary dithering weights.

use crate::{
    core::{algebra::Vector3, color::Color, pool::Handle},
    graphics::{
        error::FrameworkError,
        framebuffer::FrameBuffer,
        gpu_program::{GpuProgram, GpuProgramBinding, UniformLocation},
        gpu_texture::{GpuTextureDescriptor, GpuTextureKind, PixelKind, SharedTexture},
        server::GraphicsServer,
        stats::RenderPassStatistics,
        DrawParameters, ElementRange,
    },
    renderer::{
        cache::geometry::GeometryCache,
        lod::{update_lod_data, LodState},
        shader::LoadContext,
    },
    scene::{
        camera::Camera,
        model::{Material, PbrMaterial, SurfaceData},
        Entity, Scene,
    },
};
use fxhash::FxHashMap;

struct Shader {
    program: Box<dyn GpuProgram>,
    world_view_projection: UniformLocation,
    world_matrix: UniformLocation,
    lod_blend: UniformLocation,
    base_color: UniformLocation,
    roughness: UniformLocation,
    metalness: UniformLocation,
    emission: UniformLocation,
    emission_strength: UniformLocation,
    tiling: UniformLocation,
    diffuse_texture: UniformLocation,
    normal_texture: UniformLocation,
}

impl Shader {
    fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program("GBuffer", "gbuffer_vs.glsl", "gbuffer_fs.glsl")?;
        Ok(Self {
            world_view_projection: program.uniform_location("u_world_view_projection")?,
            world_matrix: program.uniform_location("u_world_matrix")?,
            lod_blend: program.uniform_location("u_lod_blend")?,
            base_color: program.uniform_location("u_base_color")?,
            roughness: program.uniform_location("u_roughness")?,
            metalness: program.uniform_location("u_metalness")?,
            emission: program.uniform_location("u_emission")?,
            emission_strength: program.uniform_location("u_emission_strength")?,
            tiling: program.uniform_location("u_tiling")?,
            diffuse_texture: program.uniform_location("s_diffuse_texture")?,
            normal_texture: program.uniform_location("s_normal_texture")?,
            program,
        })
    }
}

pub struct GBufferPass {
    shader: Shader,
    white_dummy: SharedTexture,
    normal_dummy: SharedTexture,
}

pub(crate) struct GBufferRenderContext<'a> {
    pub server: &'a dyn GraphicsServer,
    pub framebuffer: &'a mut dyn FrameBuffer,
    pub geometry_cache: &'a mut GeometryCache,
    pub lod_states: &'a mut FxHashMap<Handle<Entity>, LodState>,
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    pub visible: &'a [Handle<Entity>],
    pub dt: f32,
}

impl GBufferPass {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let dummy = |name: &str| {
            ctx.server.create_texture(GpuTextureDescriptor {
                name,
                kind: GpuTextureKind::Rectangle {
                    width: 1,
                    height: 1,
                },
                pixel_kind: PixelKind::RGBA8,
                ..Default::default()
            })
        };

        Ok(Self {
            shader: Shader::new(ctx)?,
            white_dummy: dummy("WhiteDummy")?,
            normal_dummy: dummy("NormalDummy")?,
        })
    }

    fn bind_material(
        &self,
        material: &dyn Material,
        binding: &mut GpuProgramBinding,
    ) {
        let shader = &self.shader;
        if material.try_submit(&*shader.program, binding) {
            return;
        }

        let default = PbrMaterial::default();
        let pbr = material.pbr().unwrap_or(&default);
        binding
            .set_vector4(&shader.base_color, &pbr.base_color.srgb_to_linear_f32())
            .set_f32(&shader.roughness, pbr.roughness)
            .set_f32(&shader.metalness, pbr.metalness)
            .set_vector4(&shader.emission, &pbr.emission.srgb_to_linear_f32())
            .set_f32(&shader.emission_strength, pbr.emission_strength)
            .set_vector2(&shader.tiling, &pbr.tiling)
            .set_texture(&shader.diffuse_texture, &self.white_dummy)
            .set_texture(&shader.normal_texture, &self.normal_dummy);
    }

    fn submit(
        &self,
        ctx: &mut GBufferRenderContext,
        surface: &SurfaceData,
        entity: &Entity,
        material: &dyn Material,
        lod_blend: Vector3<f32>,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();
        let geometry = ctx.geometry_cache.get(ctx.server, surface)?;
        let world = *entity.global_transform();
        let world_view_projection = ctx.camera.view_projection_matrix() * world;
        let shader = &self.shader;
        stats += ctx.framebuffer.draw(
            geometry,
            ctx.camera.viewport(),
            &*shader.program,
            &DrawParameters::default(),
            ElementRange::Full,
            &mut |binding| {
                binding
                    .set_matrix4(&shader.world_view_projection, &world_view_projection)
                    .set_matrix4(&shader.world_matrix, &world)
                    .set_vector3(&shader.lod_blend, &lod_blend);
                self.bind_material(material, binding);
            },
        )?;
        Ok(stats)
    }

    pub(crate) fn render(
        &self,
        mut ctx: GBufferRenderContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        let (scene, camera, visible, dt) = (ctx.scene, ctx.camera, ctx.visible, ctx.dt);
        let viewport = camera.viewport();
        ctx.framebuffer
            .clear(viewport, Some(Color::TRANSPARENT), Some(1.0), Some(0));

        let view_projection = camera.view_projection_matrix();
        for &handle in visible {
            let Some(entity) = scene.try_get(handle) else {
                continue;
            };
            let Some(model) = entity.model() else {
                continue;
            };

            let (visible, state) = update_lod_data(
                model,
                ctx.lod_states.get_mut(&handle),
                entity.global_transform(),
                &view_projection,
                viewport,
                dt,
            );
            ctx.lod_states.insert(handle, state);
            if !visible {
                continue;
            }

            let transition_time = model.lod_transition_time();
            let material = &**model.material();
            if let Some(surface) = model.lod(state.current_lod()) {
                stats += self.submit(
                    &mut ctx,
                    surface,
                    entity,
                    material,
                    state.blend_out_params(transition_time),
                )?;
            }
            if let Some(blend_in) = state.blend_in_params(transition_time) {
                if let Some(surface) = model.lod(state.target_lod()) {
                    stats += self.submit(&mut ctx, surface, entity, material, blend_in)?;
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        core::algebra::{Matrix4, Vector2},
        graphics::{
            framebuffer::Attachment,
            headless::{HeadlessGraphicsServer, RecordedValue},
        },
        renderer::shader::EmbeddedShaders,
        scene::{
            model::{LodRange, Model},
            EntityBuilder,
        },
    };
    use std::sync::Arc;

    /// Binds only its own roughness and skips the default parameters.
    #[derive(Debug)]
    struct CustomMaterial;

    impl Material for CustomMaterial {
        fn try_submit(&self, program: &dyn GpuProgram, binding: &mut GpuProgramBinding) -> bool {
            match program.uniform_location("u_roughness") {
                Ok(roughness) => {
                    binding.set_f32(&roughness, 0.125);
                    true
                }
                Err(_) => false,
            }
        }
    }

    struct Fixture {
        server: HeadlessGraphicsServer,
        pass: GBufferPass,
        framebuffer: Box<dyn FrameBuffer>,
        cache: GeometryCache,
        lod_states: FxHashMap<Handle<Entity>, LodState>,
        camera: Camera,
    }

    impl Fixture {
        fn new() -> Self {
            let server = HeadlessGraphicsServer::new();
            let pass = GBufferPass::new(&LoadContext::new(&server, &EmbeddedShaders)).unwrap();
            let albedo = server
                .create_2d_render_target("Albedo", PixelKind::RGBA8, 100, 100)
                .unwrap();
            let depth = server
                .create_2d_render_target("Depth", PixelKind::D24S8, 100, 100)
                .unwrap();
            let framebuffer = server
                .create_frame_buffer(
                    Some(Attachment::depth(depth)),
                    vec![Attachment::color(albedo)],
                )
                .unwrap();
            Self {
                server,
                pass,
                framebuffer,
                cache: GeometryCache::default(),
                lod_states: Default::default(),
                camera: Camera::look_at(
                    Vector3::zeros(),
                    Vector3::new(0.0, 0.0, -1.0),
                    Vector3::y(),
                    1.0,
                    Vector2::new(100, 100),
                ),
            }
        }

        fn render(&mut self, scene: &Scene, visible: &[Handle<Entity>], dt: f32) {
            self.pass
                .render(GBufferRenderContext {
                    server: &self.server,
                    framebuffer: &mut *self.framebuffer,
                    geometry_cache: &mut self.cache,
                    lod_states: &mut self.lod_states,
                    scene,
                    camera: &self.camera,
                    visible,
                    dt,
                })
                .unwrap();
        }

        fn lod_blends(&self) -> Vec<Vector3<f32>> {
            self.server
                .draws_with("GBuffer")
                .iter()
                .filter_map(|d| match d.uniform("u_lod_blend") {
                    Some(RecordedValue::Vector3(v)) => Some(*v),
                    _ => None,
                })
                .collect()
        }
    }

    fn lod_model(material: Arc<dyn Material>) -> Model {
        let surface = Arc::new(SurfaceData::make_cube());
        Model::with_lods(
            vec![surface.clone(), surface],
            vec![LodRange::new(50, 100), LodRange::new(0, 49)],
            material,
        )
        .with_lod_transition_time(1.0)
    }

    #[test]
    fn test_lod_transition_draws_both_levels() {
        let mut fixture = Fixture::new();
        let mut scene = Scene::new();
        let cube = EntityBuilder::new("Cube")
            .with_position(Vector3::new(0.0, 0.0, -1.5))
            .with_model(lod_model(Arc::new(PbrMaterial::default())))
            .build(&mut scene);

        fixture.render(&scene, &[cube], 0.25);
        assert_eq!(fixture.lod_blends(), vec![Vector3::new(0.0, 0.0, 1.0)]);
        assert_eq!(fixture.lod_states[&cube].current_lod(), 0);

        // Far enough to select the second level, the switch blends over the transition time.
        scene.set_global_transform(
            cube,
            Matrix4::new_translation(&Vector3::new(0.0, 0.0, -20.0)),
        );
        fixture.render(&scene, &[cube], 0.25);
        let blends = fixture.lod_blends();
        assert_eq!(
            &blends[1..],
            &[Vector3::new(0.0, -1.0, 0.75), Vector3::new(1.0, 1.0, 0.25)]
        );
        let state = fixture.lod_states[&cube];
        assert_eq!((state.current_lod(), state.target_lod()), (0, 1));
    }

    #[test]
    fn test_tiny_models_are_not_drawn() {
        let mut fixture = Fixture::new();
        let mut scene = Scene::new();
        let cube = EntityBuilder::new("Cube")
            .with_position(Vector3::new(0.0, 0.0, -2000.0))
            .with_model(lod_model(Arc::new(PbrMaterial::default())))
            .build(&mut scene);

        fixture.render(&scene, &[cube], 0.25);
        assert!(fixture.server.draws_with("GBuffer").is_empty());
        assert!(fixture.lod_states.contains_key(&cube));
    }

    #[test]
    fn test_material_binding_paths() {
        let mut fixture = Fixture::new();
        let mut scene = Scene::new();
        let custom = EntityBuilder::new("Custom")
            .with_position(Vector3::new(0.0, 0.0, -3.0))
            .with_model(Model::new(
                Arc::new(SurfaceData::make_cube()),
                Arc::new(CustomMaterial),
            ))
            .build(&mut scene);
        let pbr = EntityBuilder::new("Pbr")
            .with_position(Vector3::new(0.0, 0.0, -3.0))
            .with_model(Model::new(
                Arc::new(SurfaceData::make_cube()),
                Arc::new(PbrMaterial {
                    roughness: 0.75,
                    ..Default::default()
                }),
            ))
            .build(&mut scene);

        fixture.render(&scene, &[custom, pbr], 0.1);
        let draws = fixture.server.draws_with("GBuffer");
        assert_eq!(draws.len(), 2);

        let roughness = |i: usize| draws[i].uniform("u_roughness").and_then(|v| v.as_float());
        assert_eq!(roughness(0), Some(0.125));
        assert!(draws[0].uniform("u_base_color").is_none());
        assert_eq!(roughness(1), Some(0.75));
        assert!(draws[1].uniform("u_base_color").is_some());
    }
}
