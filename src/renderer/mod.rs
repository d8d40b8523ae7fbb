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

//! Deferred renderer. The pipeline renders a scene from a camera into a set of render targets
//! owned by a [`view::RenderView`], pass by pass:
//!
//! - shadow maps and reflection probes are brought up to date;
//! - the G-buffer is filled, ambient occlusion is applied to it;
//! - probes are composited into the reflection buffer, lights are accumulated into the light
//!   buffer, the sky is drawn behind everything;
//! - screen-space reflections are traced against the lit frame;
//! - tone mapping, anti-aliasing and overlays produce the output buffer.
//!
//! Every pass reads the render targets written by the previous ones, targets are (re)created
//! lazily whenever the viewport or the settings require a different size or format.

pub mod atmosphere;
pub mod blit;
pub mod cache;
pub mod debug;
pub mod fxaa;
pub mod gbuffer;
pub mod hdr;
pub mod hiz;
pub mod light;
pub mod lod;
pub mod prefilter;
pub mod probe;
pub mod reflection;
pub mod settings;
pub mod shader;
pub mod shadow;
pub mod ssao;
pub mod ssr;
pub mod stats;
pub mod ui;
pub mod view;
pub mod visibility;

use crate::{
    core::{color::Color, info, pool::Handle},
    graphics::{
        error::FrameworkError,
        framebuffer::FrameBuffer,
        geometry_buffer::{GeometryBuffer, GeometryBufferDescriptor},
        gpu_texture::{PixelKind, SharedTexture},
        server::GraphicsServer,
    },
    renderer::{
        atmosphere::{AtmospherePass, AtmosphereRenderContext},
        blit::BlitPass,
        cache::geometry::GeometryCache,
        debug::{DebugChannel, DebugPass, DebugRenderContext},
        fxaa::FxaaPass,
        gbuffer::{GBufferPass, GBufferRenderContext},
        hdr::ToneMapPass,
        hiz::HiZBuilder,
        light::{LightingPass, LightingRenderContext},
        probe::ProbeRenderer,
        reflection::{ReflectionPass, ReflectionRenderContext},
        settings::RunParams,
        shader::LoadContext,
        shadow::ShadowRenderer,
        ssao::{AssaoPass, AssaoRenderContext},
        ssr::{SsrPipeline, SsrRenderContext},
        stats::FrameStatistics,
        ui::{UiPass, UiRenderContext},
        view::{DetachedFrameBuffer, FrameBufferKey, RenderView, TextureKey, TextureSpec},
        visibility::gather,
    },
    scene::{camera::Camera, model::SurfaceData, Entity, Scene},
};
use bitflags::bitflags;

bitflags! {
    /// Parts of the pipeline executed by a run.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct PipelineSteps: u32 {
        /// Models are drawn into the G-buffer, otherwise it is only cleared.
        const GEOMETRY = 1 << 1;
        /// Shadow maps are updated.
        const SHADOW = 1 << 2;
        /// Reflection probes are captured and screen-space reflections are traced.
        const REFLECTION_PROBE = 1 << 3;
        /// Reflections are composited and lights are accumulated.
        const LIGHTING = 1 << 4;
        /// The sky is drawn.
        const ATMOSPHERIC = 1 << 5;
        /// Everything, used for cameras.
        const FULL = Self::GEOMETRY.bits()
            | Self::SHADOW.bits()
            | Self::REFLECTION_PROBE.bits()
            | Self::LIGHTING.bits()
            | Self::ATMOSPHERIC.bits();
        /// Minimal set used by reflection probe captures.
        const PROBE = Self::LIGHTING.bits() | Self::ATMOSPHERIC.bits();
    }
}

fn detach(
    view: &mut RenderView,
    key: FrameBufferKey,
) -> Result<DetachedFrameBuffer, FrameworkError> {
    view.take_framebuffer(key)
        .ok_or_else(|| FrameworkError::FailedToConstructFBO(key.as_ref().to_owned()))
}

fn create_geometry(
    server: &dyn GraphicsServer,
    name: &str,
    data: &SurfaceData,
) -> Result<Box<dyn GeometryBuffer>, FrameworkError> {
    server.create_geometry_buffer(GeometryBufferDescriptor {
        name,
        vertices: &data.vertices,
        triangles: &data.triangles,
    })
}

/// See module docs.
pub struct DeferredPipeline {
    quad: Box<dyn GeometryBuffer>,
    cube: Box<dyn GeometryBuffer>,
    geometry_cache: GeometryCache,
    gbuffer: GBufferPass,
    shadows: ShadowRenderer,
    probes: ProbeRenderer,
    reflections: ReflectionPass,
    lighting: LightingPass,
    atmosphere: AtmospherePass,
    assao: AssaoPass,
    /// Requires compute shaders, screen-space reflections are disabled without it.
    hiz: Option<HiZBuilder>,
    ssr: SsrPipeline,
    tonemap: ToneMapPass,
    fxaa: FxaaPass,
    debug: DebugPass,
    ui: UiPass,
    blit: BlitPass,
    debug_channel: Option<DebugChannel>,
    skybox: Option<SharedTexture>,
    statistics: FrameStatistics,
}

impl DeferredPipeline {
    /// Compiles every program of the pipeline. Fails on the first program that cannot be
    /// compiled or that lacks a uniform required by its pass.
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        let server = ctx.server;
        let quad = create_geometry(server, "Quad", &SurfaceData::make_quad())?;
        let cube = create_geometry(server, "Cube", &SurfaceData::make_cube())?;

        let pipeline = Self {
            gbuffer: GBufferPass::new(ctx)?,
            shadows: ShadowRenderer::new(ctx)?,
            probes: ProbeRenderer::new(ctx)?,
            reflections: ReflectionPass::new(ctx)?,
            lighting: LightingPass::new(ctx, &*quad)?,
            atmosphere: AtmospherePass::new(ctx)?,
            assao: AssaoPass::new(ctx)?,
            hiz: if ctx.supports_compute() {
                Some(HiZBuilder::new(ctx)?)
            } else {
                None
            },
            ssr: SsrPipeline::new(ctx)?,
            tonemap: ToneMapPass::new(ctx)?,
            fxaa: FxaaPass::new(ctx)?,
            debug: DebugPass::new(ctx)?,
            ui: UiPass::new(ctx)?,
            blit: BlitPass::new(ctx)?,
            geometry_cache: Default::default(),
            debug_channel: None,
            skybox: None,
            statistics: Default::default(),
            quad,
            cube,
        };

        info!(
            "Deferred pipeline is initialized: {} programs compiled, compute shaders are {}.",
            ctx.programs_compiled(),
            if ctx.supports_compute() {
                "supported"
            } else {
                "not supported"
            }
        );

        Ok(pipeline)
    }

    /// Selects a channel shown instead of the final image, a negative index disables the debug
    /// view. See [`DebugChannel`] for the indices.
    pub fn set_debug_pass(&mut self, index: i32) {
        self.debug_channel = DebugChannel::from_index(index);
    }

    /// Currently shown debug channel.
    pub fn debug_pass(&self) -> Option<DebugChannel> {
        self.debug_channel
    }

    /// Cube map used by skylights in the sky box mode.
    pub fn set_skybox(&mut self, skybox: Option<SharedTexture>) {
        self.skybox = skybox;
    }

    /// Statistics of the last run, including probe captures it triggered.
    pub fn statistics(&self) -> FrameStatistics {
        self.statistics
    }

    /// How many times the shadow map of a light was regenerated.
    pub fn shadow_generation_count(&self, light: Handle<Entity>) -> Option<usize> {
        self.shadows
            .shadow_map(light)
            .map(|state| state.generation_count())
    }

    /// Reflection probe states.
    pub fn probes(&self) -> &ProbeRenderer {
        &self.probes
    }

    /// Renders the scene and returns the output buffer of the view. The texture stays valid
    /// until the next run with the same view.
    pub fn run_pipeline(
        &mut self,
        server: &dyn GraphicsServer,
        scene: &Scene,
        camera: &Camera,
        view: &mut RenderView,
        dt: f32,
        params: &RunParams,
    ) -> Result<SharedTexture, FrameworkError> {
        self.geometry_cache.update(dt);
        self.shadows.cleanup(scene);
        self.probes.cleanup(scene);

        let mut statistics = FrameStatistics::default();
        let result = self.run_pipeline_impl(
            server,
            scene,
            camera,
            view,
            dt,
            params,
            PipelineSteps::FULL,
            &mut statistics,
        );
        self.statistics = statistics;
        result
    }

    /// Same as [`Self::run_pipeline`], but copies the result into the given frame buffer.
    pub fn run_pipeline_into(
        &mut self,
        server: &dyn GraphicsServer,
        output: &mut dyn FrameBuffer,
        scene: &Scene,
        camera: &Camera,
        view: &mut RenderView,
        dt: f32,
        params: &RunParams,
    ) -> Result<(), FrameworkError> {
        let result = self.run_pipeline(server, scene, camera, view, dt, params)?;
        self.statistics.post +=
            self.blit
                .render(output, &*self.quad, camera.viewport(), &result)?;
        Ok(())
    }

    pub(crate) fn run_pipeline_impl(
        &mut self,
        server: &dyn GraphicsServer,
        scene: &Scene,
        camera: &Camera,
        view: &mut RenderView,
        dt: f32,
        params: &RunParams,
        steps: PipelineSteps,
        stats: &mut FrameStatistics,
    ) -> Result<SharedTexture, FrameworkError> {
        if steps.contains(PipelineSteps::SHADOW) {
            self.shadows.build_shadows(
                server,
                &mut self.geometry_cache,
                scene,
                camera,
                stats,
            )?;
        }

        if steps.contains(PipelineSteps::REFLECTION_PROBE) {
            self.build_reflections(server, scene, camera, dt, stats)?;
        }

        let viewport = camera.viewport();
        let size = camera.viewport_size();
        let (width, height) = (size.x, size.y);
        let target = |pixel_kind| TextureSpec::render_target(width, height, pixel_kind);

        let depth = view.get_or_create(server, TextureKey::Depth, &target(PixelKind::D24S8))?;
        let albedo =
            view.get_or_create(server, TextureKey::GBufferAlbedo, &target(PixelKind::RGBA8))?;
        let normal =
            view.get_or_create(server, TextureKey::GBufferNormal, &target(PixelKind::RGBA8))?;
        let material =
            view.get_or_create(server, TextureKey::GBufferMaterial, &target(PixelKind::RGBA8))?;
        let emission = view.get_or_create(
            server,
            TextureKey::GBufferEmissive,
            &target(PixelKind::RGBA16F),
        )?;
        let light_format = if params.is_hdr() {
            PixelKind::RGBA16F
        } else {
            PixelKind::RGBA8
        };
        let lbuffer = view.get_or_create(server, TextureKey::LBuffer, &target(light_format))?;
        let rbuffer =
            view.get_or_create(server, TextureKey::RBuffer, &target(PixelKind::RGBA16F))?;
        let obuffer = view.get_or_create(server, TextureKey::OBuffer, &target(PixelKind::RGBA8))?;

        let gbuffer = [
            albedo.clone(),
            normal.clone(),
            material.clone(),
            emission.clone(),
            depth.clone(),
        ];

        // Geometry.
        view.framebuffer(
            server,
            FrameBufferKey::GBuffer,
            Some(&depth),
            &gbuffer[..4],
        )?;
        if steps.contains(PipelineSteps::GEOMETRY) {
            let visible = gather(scene, camera.frustum().as_ref(), params.visibility);
            let mut detached = detach(view, FrameBufferKey::GBuffer)?;
            let result = self.gbuffer.render(GBufferRenderContext {
                server,
                framebuffer: detached.framebuffer(),
                geometry_cache: &mut self.geometry_cache,
                lod_states: view.lod_states_mut(),
                scene,
                camera,
                visible: &visible,
                dt,
            });
            view.restore_framebuffer(detached);
            stats.geometry += result?;
        } else {
            view.framebuffer(server, FrameBufferKey::GBuffer, Some(&depth), &gbuffer[..4])?
                .clear(viewport, Some(Color::TRANSPARENT), Some(1.0), Some(0));
        }

        if let Some(settings) = params.assao.as_ref() {
            stats.post += self.assao.render(AssaoRenderContext {
                server,
                view: &mut *view,
                quad: &*self.quad,
                camera,
                settings,
                depth: depth.clone(),
                normal: normal.clone(),
                albedo: albedo.clone(),
            })?;
        }

        // Lighting.
        if steps.contains(PipelineSteps::LIGHTING) {
            self.reflections.render(ReflectionRenderContext {
                framebuffer: view.framebuffer(
                    server,
                    FrameBufferKey::RBuffer,
                    None,
                    &[rbuffer.clone()],
                )?,
                quad: &*self.quad,
                scene,
                camera,
                probes: &self.probes,
                gbuffer: gbuffer.clone(),
                stats: &mut *stats,
            })?;
            self.lighting.render(LightingRenderContext {
                framebuffer: view.framebuffer(
                    server,
                    FrameBufferKey::LBuffer,
                    None,
                    &[lbuffer.clone()],
                )?,
                quad: &*self.quad,
                scene,
                camera,
                gbuffer: gbuffer.clone(),
                reflections: rbuffer.clone(),
                shadows: steps
                    .contains(PipelineSteps::SHADOW)
                    .then_some(&self.shadows),
                stats: &mut *stats,
            })?;
        } else {
            view.framebuffer(server, FrameBufferKey::RBuffer, None, &[rbuffer.clone()])?
                .clear(viewport, Some(Color::TRANSPARENT), None, None);
            view.framebuffer(server, FrameBufferKey::LBuffer, None, &[lbuffer.clone()])?
                .clear(viewport, Some(Color::BLACK), None, None);
        }

        if steps.contains(PipelineSteps::ATMOSPHERIC) {
            stats.lighting += self.atmosphere.render(AtmosphereRenderContext {
                framebuffer: view.framebuffer(
                    server,
                    FrameBufferKey::LBufferDepth,
                    Some(&depth),
                    &[lbuffer.clone()],
                )?,
                quad: &*self.quad,
                cube: &*self.cube,
                scene,
                camera,
                skybox: self.skybox.as_ref(),
            })?;
        }

        // Screen-space reflections.
        if let (true, Some(settings), Some(hiz_builder)) = (
            steps.contains(PipelineSteps::REFLECTION_PROBE),
            params.ssr.as_ref(),
            self.hiz.as_ref(),
        ) {
            let hiz = hiz_builder.build(server, view, &depth, width, height)?;
            let view_projection = camera.view_projection_matrix();
            let prev_view_projection = view.prev_view_projection().unwrap_or(view_projection);
            self.ssr.render(SsrRenderContext {
                server,
                view: &mut *view,
                quad: &*self.quad,
                settings,
                color: lbuffer.clone(),
                normal: normal.clone(),
                material: material.clone(),
                depth: depth.clone(),
                hiz,
                view_projection,
                prev_view_projection,
                camera_position: camera.position(),
                frame: server.render_frame(),
                stats: &mut *stats,
            })?;
        }

        // Post-processing, the output buffer must be written by exactly one of these.
        let mut color = lbuffer.clone();
        if let Some(settings) = params.hdr.as_ref() {
            let (key, tonemapped) = if params.fxaa.is_some() {
                (
                    FrameBufferKey::ToneMapOutput,
                    view.get_or_create(
                        server,
                        TextureKey::ToneMapOutput,
                        &target(PixelKind::RGBA8),
                    )?,
                )
            } else {
                (FrameBufferKey::OBuffer, obuffer.clone())
            };
            let framebuffer = view.framebuffer(server, key, None, &[tonemapped.clone()])?;
            stats.post += self
                .tonemap
                .render(framebuffer, &*self.quad, viewport, &lbuffer, settings)?;
            color = tonemapped;
        }

        let framebuffer =
            view.framebuffer(server, FrameBufferKey::OBuffer, None, &[obuffer.clone()])?;
        if let Some(settings) = params.fxaa.as_ref() {
            stats.post += self
                .fxaa
                .render(framebuffer, &*self.quad, viewport, &color, settings)?;
        } else if params.hdr.is_none() {
            stats.post += self
                .blit
                .render(framebuffer, &*self.quad, viewport, &lbuffer)?;
        }

        if steps == PipelineSteps::FULL {
            if let Some(channel) = self.debug_channel {
                stats.post += self.debug.render(DebugRenderContext {
                    framebuffer: view.framebuffer(
                        server,
                        FrameBufferKey::OBuffer,
                        None,
                        &[obuffer.clone()],
                    )?,
                    quad: &*self.quad,
                    camera,
                    channel,
                    textures: [albedo, normal, material, emission, depth.clone(), rbuffer],
                })?;
            }

            stats.post += self.ui.render(UiRenderContext {
                framebuffer: view.framebuffer(
                    server,
                    FrameBufferKey::OBufferDepth,
                    Some(&depth),
                    &[obuffer.clone()],
                )?,
                cube: &*self.cube,
                scene,
                camera,
            })?;
        }

        view.set_prev_view_projection(camera.view_projection_matrix());

        Ok(obuffer)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        core::algebra::{Matrix4, Vector2, Vector3},
        graphics::{
            framebuffer::Attachment,
            gpu_texture::{full_mip_count, GpuTextureDescriptor, GpuTextureKind, TextureUsage},
            headless::{Command, HeadlessGraphicsServer},
        },
        renderer::{
            settings::{ToneMapMethod, ToneMapSettings},
            shader::EmbeddedShaders,
            visibility::VisibilityQuery,
        },
        scene::{
            light::{Light, LightKind},
            model::{Model, PbrMaterial},
            probe::{ProbeShape, ReflectMethod, ReflectionProbe},
            EntityBuilder,
        },
    };
    use std::sync::Arc;

    fn camera() -> Camera {
        Camera::look_at(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::y(),
            1.0,
            Vector2::new(64, 64),
        )
    }

    fn cube(scene: &mut Scene, position: Vector3<f32>) -> Handle<Entity> {
        EntityBuilder::new("Cube")
            .with_position(position)
            .with_model(Model::new(
                Arc::new(SurfaceData::make_cube()),
                Arc::new(PbrMaterial::default()),
            ))
            .build(scene)
    }

    fn scenario_scene() -> Scene {
        let mut scene = Scene::new();
        cube(&mut scene, Vector3::new(0.0, 0.0, -5.0));
        EntityBuilder::new("Sun")
            .with_light(Light::new(LightKind::directional()))
            .build(&mut scene);
        scene
    }

    fn passthrough_params() -> RunParams {
        RunParams {
            visibility: VisibilityQuery::NOT_SPECIFIED,
            assao: None,
            hdr: Some(ToneMapSettings {
                exposure: 1.0,
                method: ToneMapMethod::None,
            }),
            fxaa: None,
            ssr: None,
        }
    }

    fn id(texture: &SharedTexture) -> u64 {
        texture.borrow().id()
    }

    #[test]
    fn test_init_fails_on_broken_program() {
        let server = HeadlessGraphicsServer::new();
        server.fail_program("Fxaa");
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        assert!(DeferredPipeline::new(&ctx).is_err());
    }

    #[test]
    fn test_scenario_single_light_passthrough() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut pipeline = DeferredPipeline::new(&ctx).unwrap();
        let scene = scenario_scene();
        let mut view = RenderView::new();

        let output = pipeline
            .run_pipeline(
                &server,
                &scene,
                &camera(),
                &mut view,
                0.016,
                &passthrough_params(),
            )
            .unwrap();

        assert_eq!(server.draws_with("GBuffer").len(), 1);
        assert_eq!(server.draws_with_prefix("DirectionalLight").len(), 1);

        let tonemap = server.draws_with("ToneMap");
        assert_eq!(tonemap.len(), 1);
        let lbuffer = view.texture(TextureKey::LBuffer).unwrap();
        assert_eq!(
            tonemap[0].uniform("s_input").and_then(|v| v.as_texture()),
            Some(id(&lbuffer))
        );
        assert_eq!(
            tonemap[0]
                .uniform("u_tonemapping")
                .and_then(|v| v.as_vector4())
                .map(|v| v.y),
            Some(0.0)
        );
        assert_eq!(tonemap[0].color_targets, vec![id(&output)]);
        assert_eq!(
            id(&output),
            id(&view.texture(TextureKey::OBuffer).unwrap())
        );

        assert!(server.draws_with("Fxaa").is_empty());
        assert!(server.draws_with("Blit").is_empty());
        assert!(server.draws_with("SsrTrace").is_empty());

        let stats = pipeline.statistics();
        assert_eq!(stats.lights.directional_lights_rendered, 1);
        assert_eq!(
            stats.geometry.draw_calls,
            server.draws_with("GBuffer").len() + server.draws_with("ShadowMap").len()
        );
    }

    #[test]
    fn test_output_falls_back_to_blit() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut pipeline = DeferredPipeline::new(&ctx).unwrap();
        let scene = scenario_scene();
        let mut view = RenderView::new();
        let params = RunParams {
            hdr: None,
            ..passthrough_params()
        };

        let output = pipeline
            .run_pipeline(&server, &scene, &camera(), &mut view, 0.016, &params)
            .unwrap();

        assert!(server.draws_with("ToneMap").is_empty());
        let blits = server.draws_with("Blit");
        assert_eq!(blits.len(), 1);
        let lbuffer = view.texture(TextureKey::LBuffer).unwrap();
        assert_eq!(lbuffer.borrow().pixel_kind(), PixelKind::RGBA8);
        assert_eq!(
            blits[0].uniform("s_input").and_then(|v| v.as_texture()),
            Some(id(&lbuffer))
        );
        assert_eq!(blits[0].color_targets, vec![id(&output)]);
    }

    #[test]
    fn test_run_into_external_frame_buffer() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut pipeline = DeferredPipeline::new(&ctx).unwrap();
        let scene = scenario_scene();
        let mut view = RenderView::new();

        let target = server
            .create_texture(GpuTextureDescriptor {
                name: "Window",
                kind: GpuTextureKind::Rectangle {
                    width: 64,
                    height: 64,
                },
                pixel_kind: PixelKind::RGBA8,
                mip_count: 1,
                usage: TextureUsage::RENDER_TARGET,
            })
            .unwrap();
        let mut output = server
            .create_frame_buffer(None, vec![Attachment::color(target.clone())])
            .unwrap();

        pipeline
            .run_pipeline_into(
                &server,
                &mut *output,
                &scene,
                &camera(),
                &mut view,
                0.016,
                &RunParams::low(),
            )
            .unwrap();

        let last = server.draws().pop().unwrap();
        assert_eq!(last.program, "Blit");
        assert_eq!(last.color_targets, vec![id(&target)]);
        assert_eq!(
            last.uniform("s_input").and_then(|v| v.as_texture()),
            view.texture(TextureKey::OBuffer).map(|t| id(&t))
        );
    }

    #[test]
    fn test_high_preset_over_two_frames() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut pipeline = DeferredPipeline::new(&ctx).unwrap();
        let mut scene = scenario_scene();
        let mut view = RenderView::new();
        let params = RunParams::high();

        for _ in 0..2 {
            pipeline
                .run_pipeline(&server, &scene, &camera(), &mut view, 0.016, &params)
                .unwrap();
            scene.clear_dirty_flags();
            server.end_frame();
        }

        assert_eq!(server.draws_with("Assao").len(), 2);
        assert_eq!(server.draws_with("SsrTrace").len(), 2);
        assert_eq!(server.draws_with("SsrComposite").len(), 2);
        // No history on the first frame.
        assert_eq!(server.draws_with("SsrTemporal").len(), 1);
        assert_eq!(server.dispatches_with("HiZGenerate").len(), 2);
        assert_eq!(server.draws_with("Fxaa").len(), 2);
        assert_eq!(pipeline.statistics().ssr_history_fallbacks, 0);
        let sun = scene.lights().map(|(handle, _, _)| handle).next().unwrap();
        assert!(pipeline
            .shadow_generation_count(sun)
            .is_some_and(|count| count >= 1));
    }

    #[test]
    fn test_runs_without_compute() {
        let server = HeadlessGraphicsServer::without_compute();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut pipeline = DeferredPipeline::new(&ctx).unwrap();
        let scene = scenario_scene();
        let mut view = RenderView::new();

        pipeline
            .run_pipeline(
                &server,
                &scene,
                &camera(),
                &mut view,
                0.016,
                &RunParams::high(),
            )
            .unwrap();

        assert!(!server
            .commands()
            .iter()
            .any(|c| matches!(c, Command::Dispatch(_))));
        assert!(server.draws_with("SsrTrace").is_empty());
        assert_eq!(server.draws_with("Fxaa").len(), 1);
    }

    #[test]
    fn test_probe_is_captured_once_until_invalidated() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut pipeline = DeferredPipeline::new(&ctx).unwrap();
        let mut scene = scenario_scene();
        let probe = EntityBuilder::new("Probe")
            .with_probe(
                ReflectionProbe::new(ReflectMethod::StaticOnly, ProbeShape::Sphere { range: 10.0 })
                    .with_resolution(16),
            )
            .build(&mut scene);
        let mut view = RenderView::new();
        let params = passthrough_params();

        pipeline
            .run_pipeline(&server, &scene, &camera(), &mut view, 0.016, &params)
            .unwrap();
        let stats = pipeline.statistics();
        assert_eq!(stats.probe_faces_captured, 6);
        assert_eq!(stats.probes_composited, 1);
        assert!(stats.probes.draw_calls > 0);
        assert!(pipeline.probes().state(probe).unwrap().is_complete());
        assert_eq!(
            server.dispatches_with("Prefilter").len(),
            full_mip_count(16, 16)
        );
        // Every face is tone mapped into the output of the probe and copied into the cube map.
        let face_blits = server
            .blits()
            .into_iter()
            .filter(|b| matches!(b, Command::Blit { dest_face: Some(_), .. }))
            .count();
        assert_eq!(face_blits, 6);

        scene.clear_dirty_flags();
        server.end_frame();
        pipeline
            .run_pipeline(&server, &scene, &camera(), &mut view, 0.016, &params)
            .unwrap();
        assert_eq!(pipeline.statistics().probe_faces_captured, 0);
        assert_eq!(pipeline.probes().captures(), 1);

        scene.invalidate(probe);
        server.end_frame();
        pipeline
            .run_pipeline(&server, &scene, &camera(), &mut view, 0.016, &params)
            .unwrap();
        assert_eq!(pipeline.statistics().probe_faces_captured, 6);
        assert_eq!(pipeline.probes().captures(), 2);
    }

    #[test]
    fn test_probe_changed_off_screen_is_recaptured_when_visible_again() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        let mut pipeline = DeferredPipeline::new(&ctx).unwrap();
        let mut scene = scenario_scene();
        let probe = EntityBuilder::new("Probe")
            .with_position(Vector3::new(0.0, 0.0, -20.0))
            .with_probe(
                ReflectionProbe::new(ReflectMethod::Environment, ProbeShape::Sphere { range: 5.0 })
                    .with_resolution(8),
            )
            .build(&mut scene);
        let looking_away = Camera::look_at(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::y(),
            1.0,
            Vector2::new(64, 64),
        );
        let mut view = RenderView::new();
        let params = passthrough_params();

        pipeline
            .run_pipeline(&server, &scene, &camera(), &mut view, 0.016, &params)
            .unwrap();
        assert_eq!(pipeline.probes().captures(), 1);
        scene.clear_dirty_flags();

        server.end_frame();
        scene.set_global_transform(
            probe,
            Matrix4::new_translation(&Vector3::new(0.0, 1.0, -20.0)),
        );
        pipeline
            .run_pipeline(&server, &scene, &looking_away, &mut view, 0.016, &params)
            .unwrap();
        scene.clear_dirty_flags();
        assert_eq!(pipeline.probes().captures(), 1);
        assert!(!pipeline.probes().state(probe).unwrap().is_complete());

        server.end_frame();
        pipeline
            .run_pipeline(&server, &scene, &camera(), &mut view, 0.016, &params)
            .unwrap();
        assert_eq!(pipeline.statistics().probe_faces_captured, 6);
        assert_eq!(pipeline.probes().captures(), 2);
    }
}
