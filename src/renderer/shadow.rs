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

//! Shadow maps. Each light that casts shadows owns a shadow map which is regenerated only when
//! something that could change it has happened: the light itself changed, a shadow caster moved
//! inside of the light volume, or (for directional lights) the camera moved so much that the
//! fitted light projection changed.

use crate::{
    core::{
        algebra::{Isometry3, Matrix4, Point3, Vector3, Vector4},
        color::Color,
        math::{AxisAlignedBoundingBox, Matrix4Ext},
        pool::Handle,
    },
    graphics::{
        error::FrameworkError,
        framebuffer::{Attachment, FrameBuffer},
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::{
            CubeMapFace, GpuTextureDescriptor, GpuTextureKind, PixelKind, SharedTexture,
            TextureUsage,
        },
        server::GraphicsServer,
        stats::RenderPassStatistics,
        DrawParameters, ElementRange,
    },
    renderer::{
        cache::geometry::GeometryCache,
        shader::LoadContext,
        stats::FrameStatistics,
        visibility::{gather, VisibilityQuery, VisibilitySet},
    },
    scene::{
        camera::Camera,
        light::{Light, LightKind, ShadowDepthMode},
        Entity, EntityFlags, Scene,
    },
};
use fxhash::FxHashMap;

/// Distance the directional shadow volume is extended towards the light, so casters between the
/// light and the camera frustum still cast shadows.
const DIRECTIONAL_CASTER_MARGIN: f32 = 100.0;
const SHADOW_Z_NEAR: f32 = 0.01;

struct Shader {
    program: Box<dyn GpuProgram>,
    world_view_projection: UniformLocation,
    world_matrix: UniformLocation,
    light_position: UniformLocation,
    depth_params: UniformLocation,
}

impl Shader {
    fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let program = ctx.program("ShadowMap", "shadow_vs.glsl", "shadow_fs.glsl")?;
        Ok(Self {
            world_view_projection: program.uniform_location("u_world_view_projection")?,
            world_matrix: program.uniform_location("u_world_matrix")?,
            light_position: program.uniform_location("u_light_position")?,
            depth_params: program.uniform_location("u_depth_params")?,
            program,
        })
    }
}

/// Shadow map of a single light and its update bookkeeping.
pub struct ShadowMapState {
    last_update: Option<u64>,
    needs_rebuild: bool,
    generation_count: usize,
    light_matrix: Matrix4<f32>,
    kind_index: usize,
    resolution: usize,
    texture: SharedTexture,
    framebuffer: Box<dyn FrameBuffer>,
}

impl ShadowMapState {
    fn new(
        server: &dyn GraphicsServer,
        kind: &LightKind,
        resolution: usize,
    ) -> Result<Self, FrameworkError> {
        let resolution = resolution.max(1);
        let color_kind = if matches!(kind, LightKind::Point { .. }) {
            GpuTextureKind::Cube {
                width: resolution,
                height: resolution,
            }
        } else {
            GpuTextureKind::Rectangle {
                width: resolution,
                height: resolution,
            }
        };
        let texture = server.create_texture(GpuTextureDescriptor {
            name: "ShadowMap",
            kind: color_kind,
            pixel_kind: PixelKind::R32F,
            mip_count: 1,
            usage: TextureUsage::SAMPLED | TextureUsage::RENDER_TARGET,
        })?;
        let depth = server.create_texture(GpuTextureDescriptor {
            name: "ShadowMapDepth",
            kind: GpuTextureKind::Rectangle {
                width: resolution,
                height: resolution,
            },
            pixel_kind: PixelKind::D32F,
            mip_count: 1,
            usage: TextureUsage::RENDER_TARGET,
        })?;
        let framebuffer = server.create_frame_buffer(
            Some(Attachment::depth(depth)),
            vec![Attachment::color(texture.clone())],
        )?;
        Ok(Self {
            last_update: None,
            needs_rebuild: true,
            generation_count: 0,
            light_matrix: Matrix4::identity(),
            kind_index: kind.index(),
            resolution,
            texture,
            framebuffer,
        })
    }

    /// Shadow map texture, a cube map for point lights.
    pub fn texture(&self) -> &SharedTexture {
        &self.texture
    }

    /// World to light clip space matrix, translation to the light position for point lights.
    pub fn light_matrix(&self) -> Matrix4<f32> {
        self.light_matrix
    }

    /// How many times the map was regenerated.
    pub fn generation_count(&self) -> usize {
        self.generation_count
    }

    pub fn last_update(&self) -> Option<u64> {
        self.last_update
    }
}

fn light_view(position: Vector3<f32>, direction: Vector3<f32>) -> Matrix4<f32> {
    let up = if direction.y.abs() > 0.99 {
        Vector3::z()
    } else {
        Vector3::y()
    };
    Isometry3::look_at_rh(
        &Point3::from(position),
        &Point3::from(position + direction),
        &up,
    )
    .to_homogeneous()
}

/// Orthographic projection that encloses the camera frustum, as seen from the light.
fn fit_directional(camera: &Camera, direction: Vector3<f32>) -> Matrix4<f32> {
    let Some(frustum) = camera.frustum() else {
        return Matrix4::identity();
    };
    let view = light_view(Vector3::zeros(), direction);
    let mut bounds = AxisAlignedBoundingBox::default();
    for corner in frustum.corners() {
        bounds.add_point(view.transform_point(&Point3::from(*corner)).coords);
    }
    Matrix4::new_orthographic(
        bounds.min.x,
        bounds.max.x,
        bounds.min.y,
        bounds.max.y,
        -bounds.max.z - DIRECTIONAL_CASTER_MARGIN,
        -bounds.min.z,
    ) * view
}

fn compute_light_matrix(light: &Light, entity: &Entity, camera: &Camera) -> Matrix4<f32> {
    let transform = entity.global_transform_without_scale();
    let position = transform.position();
    let direction = Light::direction(&transform);
    match *light.kind() {
        LightKind::Directional => fit_directional(camera, direction),
        LightKind::Spot {
            range, outer_angle, ..
        } => {
            Matrix4::new_perspective(1.0, outer_angle.max(0.01), SHADOW_Z_NEAR, range.max(0.02))
                * light_view(position, direction)
        }
        LightKind::Point { .. } => Matrix4::new_translation(&position),
    }
}

pub struct ShadowRenderer {
    shader: Shader,
    states: FxHashMap<Handle<Entity>, ShadowMapState>,
}

impl ShadowRenderer {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        Ok(Self {
            shader: Shader::new(ctx)?,
            states: Default::default(),
        })
    }

    pub fn shadow_map(&self, light: Handle<Entity>) -> Option<&ShadowMapState> {
        self.states.get(&light)
    }

    /// Removes shadow maps of lights that no longer exist or stopped casting shadows.
    pub fn cleanup(&mut self, scene: &Scene) {
        self.states.retain(|handle, _| {
            scene
                .try_get(*handle)
                .and_then(|entity| entity.light())
                .is_some_and(|light| light.casts_shadows())
        });
    }

    /// Updates shadow maps of every light that needs it.
    pub(crate) fn build_shadows(
        &mut self,
        server: &dyn GraphicsServer,
        geometry_cache: &mut GeometryCache,
        scene: &Scene,
        camera: &Camera,
        stats: &mut FrameStatistics,
    ) -> Result<(), FrameworkError> {
        let frame = server.render_frame();
        let mut dirty_casters: Option<VisibilitySet> = None;

        for (handle, entity, light) in scene.lights() {
            if !light.casts_shadows() {
                self.states.remove(&handle);
                continue;
            }

            let kind_index = light.kind().index();
            let resolution = light.shadow_params().resolution.max(1);
            let needs_new_state = self
                .states
                .get(&handle)
                .map_or(true, |s| s.kind_index != kind_index || s.resolution != resolution);
            if needs_new_state {
                self.states
                    .insert(handle, ShadowMapState::new(server, light.kind(), resolution)?);
            }
            let Some(state) = self.states.get_mut(&handle) else {
                continue;
            };

            // Changes are remembered even while the light is off-screen.
            let light_bounds = light.world_bounds(entity.global_transform());
            if entity.has_flags(EntityFlags::DIRTY)
                || dirty_casters
                    .get_or_insert_with(|| {
                        gather(scene, None, VisibilityQuery::DIRTY | VisibilityQuery::SHADOW_CASTER)
                    })
                    .iter()
                    .filter_map(|h| scene.try_get(*h))
                    .any(|caster| caster.world_bounding_box().is_intersects_aabb(&light_bounds))
            {
                state.needs_rebuild = true;
            }

            let directional = light.is_directional();
            if !directional && state.last_update == Some(frame) {
                continue;
            }
            if !camera.test_obb(&light.local_bounds(), entity.global_transform()) {
                continue;
            }
            state.last_update = Some(frame);

            let light_matrix = compute_light_matrix(light, entity, camera);
            let rebuild = state.generation_count == 0
                || state.needs_rebuild
                || (directional && state.light_matrix != light_matrix);
            state.light_matrix = light_matrix;

            if rebuild {
                stats.geometry += Self::generate(
                    &self.shader,
                    state,
                    server,
                    geometry_cache,
                    scene,
                    light,
                    entity,
                    &light_bounds,
                )?;
                state.generation_count += 1;
                state.needs_rebuild = false;
                stats.lights.shadow_maps_rendered += 1;
            }
        }

        Ok(())
    }

    fn generate(
        shader: &Shader,
        state: &mut ShadowMapState,
        server: &dyn GraphicsServer,
        geometry_cache: &mut GeometryCache,
        scene: &Scene,
        light: &Light,
        entity: &Entity,
        light_bounds: &AxisAlignedBoundingBox,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();
        let casters = gather(scene, None, VisibilityQuery::SHADOW_CASTER)
            .into_iter()
            .filter(|h| {
                scene
                    .try_get(*h)
                    .is_some_and(|c| c.world_bounding_box().is_intersects_aabb(light_bounds))
            })
            .collect::<Vec<_>>();

        let position = entity.global_position();
        let params = light.shadow_params();
        let z_far = match *light.kind() {
            LightKind::Point { range, .. } | LightKind::Spot { range, .. } => range,
            LightKind::Directional => DIRECTIONAL_CASTER_MARGIN,
        };
        let depth_params = Vector4::new(
            (params.depth_mode == ShadowDepthMode::Linear) as u32 as f32,
            SHADOW_Z_NEAR,
            z_far,
            params.bias,
        );

        let passes: Vec<(Option<CubeMapFace>, Matrix4<f32>)> = match light.kind() {
            LightKind::Point { range, .. } => {
                let world = Matrix4::new_translation(&position);
                CubeMapFace::ALL
                    .iter()
                    .map(|face| {
                        let camera = Camera::cube_face(
                            *face,
                            &world,
                            SHADOW_Z_NEAR,
                            range.max(0.02),
                            state.resolution,
                        );
                        (Some(*face), camera.view_projection_matrix())
                    })
                    .collect()
            }
            _ => vec![(None, state.light_matrix)],
        };

        let viewport = state.framebuffer.viewport();
        for (face, view_projection) in passes {
            if let Some(face) = face {
                state.framebuffer.set_cubemap_face(0, face, 0);
            }
            state
                .framebuffer
                .clear(viewport, Some(Color::WHITE), Some(1.0), None);

            for &handle in casters.iter() {
                let Some(caster) = scene.try_get(handle) else {
                    continue;
                };
                let Some(surface) = caster.model().and_then(|m| m.lod(0)) else {
                    continue;
                };
                let geometry = geometry_cache.get(server, surface)?;
                let world = *caster.global_transform();
                let world_view_projection = view_projection * world;
                stats += state.framebuffer.draw(
                    geometry,
                    viewport,
                    &*shader.program,
                    &DrawParameters::default(),
                    ElementRange::Full,
                    &mut |binding| {
                        binding
                            .set_matrix4(&shader.world_view_projection, &world_view_projection)
                            .set_matrix4(&shader.world_matrix, &world)
                            .set_vector3(&shader.light_position, &position)
                            .set_vector4(&shader.depth_params, &depth_params);
                    },
                )?;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        core::algebra::Vector2,
        graphics::headless::HeadlessGraphicsServer,
        renderer::shader::EmbeddedShaders,
        scene::{
            model::{Model, PbrMaterial, SurfaceData},
            EntityBuilder,
        },
    };
    use std::sync::Arc;

    fn cube(scene: &mut Scene, position: Vector3<f32>) -> Handle<Entity> {
        EntityBuilder::new("Cube")
            .with_position(position)
            .with_model(Model::new(
                Arc::new(SurfaceData::make_cube()),
                Arc::new(PbrMaterial::default()),
            ))
            .build(scene)
    }

    fn camera() -> Camera {
        Camera::look_at(
            Vector3::new(0.0, 0.0, 10.0),
            Vector3::zeros(),
            Vector3::y(),
            1.0,
            Vector2::new(64, 64),
        )
    }

    #[test]
    fn test_shadow_rebuild_gating() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut renderer = ShadowRenderer::new(&ctx).unwrap();
        let mut cache = GeometryCache::default();
        let mut stats = FrameStatistics::default();

        let mut scene = Scene::new();
        let light = EntityBuilder::new("Light")
            .with_light(Light::new(LightKind::point(5.0)))
            .build(&mut scene);
        let near = cube(&mut scene, Vector3::new(1.0, 0.0, 0.0));
        let far = cube(&mut scene, Vector3::new(100.0, 0.0, 0.0));
        let camera = camera();

        renderer
            .build_shadows(&server, &mut cache, &scene, &camera, &mut stats)
            .unwrap();
        assert_eq!(renderer.shadow_map(light).unwrap().generation_count(), 1);
        // Only the cube inside of the light volume was drawn, on each face.
        assert_eq!(server.draws_with("ShadowMap").len(), 6);
        scene.clear_dirty_flags();

        // Moving a model outside of the light volume must not trigger regeneration.
        for i in 0..3 {
            server.end_frame();
            scene.set_global_transform(
                far,
                Matrix4::new_translation(&Vector3::new(100.0 + i as f32, 0.0, 0.0)),
            );
            renderer
                .build_shadows(&server, &mut cache, &scene, &camera, &mut stats)
                .unwrap();
            scene.clear_dirty_flags();
        }
        assert_eq!(renderer.shadow_map(light).unwrap().generation_count(), 1);

        // Already updated this frame.
        scene.set_global_transform(near, Matrix4::new_translation(&Vector3::new(0.5, 0.0, 0.0)));
        renderer
            .build_shadows(&server, &mut cache, &scene, &camera, &mut stats)
            .unwrap();
        assert_eq!(renderer.shadow_map(light).unwrap().generation_count(), 1);

        server.end_frame();
        renderer
            .build_shadows(&server, &mut cache, &scene, &camera, &mut stats)
            .unwrap();
        assert_eq!(renderer.shadow_map(light).unwrap().generation_count(), 2);
        assert_eq!(stats.lights.shadow_maps_rendered, 2);
    }

    #[test]
    fn test_moved_light_is_regenerated() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut renderer = ShadowRenderer::new(&ctx).unwrap();
        let mut cache = GeometryCache::default();
        let mut stats = FrameStatistics::default();

        let mut scene = Scene::new();
        let light = EntityBuilder::new("Light")
            .with_light(Light::new(LightKind::spot(10.0, 0.5, 1.0)))
            .build(&mut scene);
        let camera = camera();

        renderer
            .build_shadows(&server, &mut cache, &scene, &camera, &mut stats)
            .unwrap();
        server.end_frame();
        scene.set_global_transform(light, Matrix4::new_translation(&Vector3::new(0.0, 1.0, 0.0)));
        renderer
            .build_shadows(&server, &mut cache, &scene, &camera, &mut stats)
            .unwrap();
        assert_eq!(renderer.shadow_map(light).unwrap().generation_count(), 2);
    }

    #[test]
    fn test_lights_without_shadows_are_skipped() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut renderer = ShadowRenderer::new(&ctx).unwrap();
        let mut cache = GeometryCache::default();
        let mut stats = FrameStatistics::default();

        let mut scene = Scene::new();
        let light = EntityBuilder::new("Light")
            .with_light(Light::new(LightKind::point(5.0)).with_casts_shadows(false))
            .build(&mut scene);
        cube(&mut scene, Vector3::zeros());

        let allocations = server.texture_allocations();
        renderer
            .build_shadows(&server, &mut cache, &scene, &camera(), &mut stats)
            .unwrap();
        assert!(renderer.shadow_map(light).is_none());
        assert_eq!(server.texture_allocations(), allocations);
        assert!(server.draws_with("ShadowMap").is_empty());
    }

    #[test]
    fn test_shadow_map_is_released_when_light_stops_casting() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut renderer = ShadowRenderer::new(&ctx).unwrap();
        let mut cache = GeometryCache::default();
        let mut stats = FrameStatistics::default();

        let mut scene = Scene::new();
        let light = EntityBuilder::new("Light")
            .with_light(Light::new(LightKind::spot(10.0, 0.5, 1.0)))
            .build(&mut scene);
        let live = server.live_textures();

        renderer
            .build_shadows(&server, &mut cache, &scene, &camera(), &mut stats)
            .unwrap();
        assert!(renderer.shadow_map(light).is_some());
        assert_eq!(server.live_textures(), live + 2);

        server.end_frame();
        scene
            .try_get_mut(light)
            .and_then(|e| e.light_mut())
            .unwrap()
            .set_casts_shadows(false);
        renderer
            .build_shadows(&server, &mut cache, &scene, &camera(), &mut stats)
            .unwrap();
        assert!(renderer.shadow_map(light).is_none());
        assert_eq!(server.live_textures(), live);
    }

    #[test]
    fn test_light_moved_off_screen_is_regenerated_when_visible_again() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut renderer = ShadowRenderer::new(&ctx).unwrap();
        let mut cache = GeometryCache::default();
        let mut stats = FrameStatistics::default();

        let mut scene = Scene::new();
        let light = EntityBuilder::new("Light")
            .with_light(Light::new(LightKind::point(5.0)))
            .build(&mut scene);
        cube(&mut scene, Vector3::new(1.0, 0.0, 0.0));
        let looking_at_light = camera();
        let looking_away = Camera::look_at(
            Vector3::new(0.0, 0.0, 10.0),
            Vector3::new(0.0, 0.0, 20.0),
            Vector3::y(),
            1.0,
            Vector2::new(64, 64),
        );

        renderer
            .build_shadows(&server, &mut cache, &scene, &looking_at_light, &mut stats)
            .unwrap();
        scene.clear_dirty_flags();
        assert_eq!(renderer.shadow_map(light).unwrap().generation_count(), 1);

        // The light moves while nobody sees it.
        server.end_frame();
        scene.set_global_transform(light, Matrix4::new_translation(&Vector3::new(0.0, 1.0, 0.0)));
        renderer
            .build_shadows(&server, &mut cache, &scene, &looking_away, &mut stats)
            .unwrap();
        scene.clear_dirty_flags();
        assert_eq!(renderer.shadow_map(light).unwrap().generation_count(), 1);

        server.end_frame();
        renderer
            .build_shadows(&server, &mut cache, &scene, &looking_at_light, &mut stats)
            .unwrap();
        assert_eq!(renderer.shadow_map(light).unwrap().generation_count(), 2);

        // Nothing changed since, the map is reused.
        scene.clear_dirty_flags();
        server.end_frame();
        renderer
            .build_shadows(&server, &mut cache, &scene, &looking_at_light, &mut stats)
            .unwrap();
        assert_eq!(renderer.shadow_map(light).unwrap().generation_count(), 2);
    }
}
