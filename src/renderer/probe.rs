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

//! Reflection probe capturing. Every probe owns a render view and captures the scene into a
//! cube map face by face, running a reduced pipeline for each face. Captured faces are kept until
//! the probe or a reflection caster near it changes.

use crate::{
    core::pool::Handle,
    graphics::{
        error::FrameworkError,
        gpu_texture::{
            full_mip_count, CubeMapFace, GpuTextureDescriptor, GpuTextureKind, PixelKind,
            SharedTexture, TextureUsage,
        },
        server::{BlitRegion, GraphicsServer},
    },
    renderer::{
        prefilter::{copy_cube_faces, PrefilterPass},
        settings::RunParams,
        shader::LoadContext,
        stats::FrameStatistics,
        view::RenderView,
        visibility::{gather, VisibilityQuery, VisibilitySet},
        DeferredPipeline, PipelineSteps,
    },
    scene::{
        camera::Camera,
        probe::{ReflectMethod, ReflectionProbe},
        Entity, EntityFlags, Scene,
    },
};
use fxhash::FxHashMap;

/// Near clipping plane of face cameras.
pub const PROBE_Z_NEAR: f32 = 0.025;

/// GPU state of a single probe.
pub struct ProbeState {
    face_frames: [Option<u64>; 6],
    resolution: usize,
    /// Raw captured faces.
    capture: SharedTexture,
    /// Faces after prefiltering, every mip is filled.
    cubemap: SharedTexture,
    view: RenderView,
}

impl ProbeState {
    fn new(server: &dyn GraphicsServer, resolution: usize) -> Result<Self, FrameworkError> {
        let kind = GpuTextureKind::Cube {
            width: resolution,
            height: resolution,
        };
        let capture = server.create_texture(GpuTextureDescriptor {
            name: "ProbeCapture",
            kind,
            pixel_kind: PixelKind::RGBA8,
            mip_count: 1,
            usage: TextureUsage::SAMPLED | TextureUsage::BLIT_DESTINATION,
        })?;
        let cubemap = server.create_texture(GpuTextureDescriptor {
            name: "ProbeCubeMap",
            kind,
            pixel_kind: PixelKind::RGBA8,
            mip_count: full_mip_count(resolution, resolution),
            usage: TextureUsage::SAMPLED
                | TextureUsage::COMPUTE_WRITE
                | TextureUsage::BLIT_DESTINATION,
        })?;
        Ok(Self {
            face_frames: Default::default(),
            resolution,
            capture,
            cubemap,
            view: RenderView::new(),
        })
    }

    /// All six faces are captured and filtered.
    pub fn is_complete(&self) -> bool {
        self.face_frames.iter().all(Option::is_some)
    }

    /// Frame at which a face was captured.
    pub fn face_frame(&self, face: CubeMapFace) -> Option<u64> {
        self.face_frames[face as usize]
    }

    pub fn cubemap(&self) -> &SharedTexture {
        &self.cubemap
    }

    fn invalidate(&mut self) {
        self.face_frames = Default::default();
    }
}

pub struct ProbeRenderer {
    states: FxHashMap<Handle<Entity>, ProbeState>,
    prefilter: Option<PrefilterPass>,
    captures: usize,
}

impl ProbeRenderer {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        Ok(Self {
            states: Default::default(),
            prefilter: if ctx.supports_compute() {
                Some(PrefilterPass::new(ctx)?)
            } else {
                None
            },
            captures: 0,
        })
    }

    /// Cube map of a completely captured probe.
    pub fn cubemap(&self, probe: Handle<Entity>) -> Option<&SharedTexture> {
        self.states
            .get(&probe)
            .filter(|s| s.is_complete())
            .map(|s| s.cubemap())
    }

    pub fn state(&self, probe: Handle<Entity>) -> Option<&ProbeState> {
        self.states.get(&probe)
    }

    /// How many times any probe was captured completely.
    pub fn captures(&self) -> usize {
        self.captures
    }

    /// Drops states of probes that no longer exist.
    pub fn cleanup(&mut self, scene: &Scene) {
        self.states
            .retain(|handle, _| scene.try_get(*handle).is_some_and(|e| e.probe().is_some()));
    }

    fn filter(
        &self,
        server: &dyn GraphicsServer,
        probe: &ReflectionProbe,
        state: &ProbeState,
    ) -> Result<(), FrameworkError> {
        match self.prefilter.as_ref() {
            Some(prefilter) if probe.apply_prefilter() => {
                prefilter.prefilter(server, &state.capture, &state.cubemap)
            }
            _ => copy_cube_faces(server, &state.capture, &state.cubemap),
        }
    }
}

fn intersects_dirty_caster(
    scene: &Scene,
    dirty_casters: &VisibilitySet,
    probe: &ReflectionProbe,
    entity: &Entity,
) -> bool {
    let bounds = probe.world_bounds(entity.global_transform());
    dirty_casters.iter().any(|handle| {
        scene
            .try_get(*handle)
            .is_some_and(|caster| caster.world_bounding_box().is_intersects_aabb(&bounds))
    })
}

impl DeferredPipeline {
    /// Captures every visible probe that is not captured yet.
    pub(super) fn build_reflections(
        &mut self,
        server: &dyn GraphicsServer,
        scene: &Scene,
        camera: &Camera,
        dt: f32,
        stats: &mut FrameStatistics,
    ) -> Result<(), FrameworkError> {
        let mut dirty_casters: Option<VisibilitySet> = None;

        for (handle, entity, probe) in scene.probes() {
            // Faces are dropped even while the probe is off-screen, so it is recaptured once seen.
            if let Some(state) = self
                .probes
                .states
                .get_mut(&handle)
                .filter(|s| s.is_complete())
            {
                let dirty_casters = dirty_casters.get_or_insert_with(|| {
                    gather(
                        scene,
                        None,
                        VisibilityQuery::DIRTY | VisibilityQuery::REFLECTION_CASTER,
                    )
                });
                if entity.has_flags(EntityFlags::DIRTY)
                    || intersects_dirty_caster(scene, dirty_casters, probe, entity)
                {
                    state.invalidate();
                }
            }

            if !camera.test_obb(&probe.local_bounds(), entity.global_transform()) {
                continue;
            }

            // The state is detached while capturing, so the probe never reflects itself.
            let mut state = match self.probes.states.remove(&handle) {
                Some(state) if state.resolution == probe.resolution() => state,
                _ => ProbeState::new(server, probe.resolution())?,
            };

            let result = if state.is_complete() {
                Ok(())
            } else {
                self.capture_probe(server, scene, entity, probe, &mut state, dt, stats)
            };
            self.probes.states.insert(handle, state);
            result?;
        }

        Ok(())
    }

    fn capture_probe(
        &mut self,
        server: &dyn GraphicsServer,
        scene: &Scene,
        entity: &Entity,
        probe: &ReflectionProbe,
        state: &mut ProbeState,
        dt: f32,
        stats: &mut FrameStatistics,
    ) -> Result<(), FrameworkError> {
        let frame = server.render_frame();

        let mut params = RunParams::probe();
        let steps = match probe.method() {
            ReflectMethod::Environment => PipelineSteps::PROBE,
            ReflectMethod::StaticOnly => {
                params.visibility |= VisibilityQuery::STATIC;
                PipelineSteps::PROBE | PipelineSteps::GEOMETRY
            }
        };
        let z_far = probe.max_range(entity.global_scale()).max(PROBE_Z_NEAR * 2.0);

        for face in CubeMapFace::ALL {
            if state.face_frames[face as usize].is_some() {
                continue;
            }

            let face_camera = Camera::cube_face(
                face,
                entity.global_transform(),
                PROBE_Z_NEAR,
                z_far,
                state.resolution,
            );
            let mut face_stats = FrameStatistics::default();
            let output = self.run_pipeline_impl(
                server,
                scene,
                &face_camera,
                &mut state.view,
                dt,
                &params,
                steps,
                &mut face_stats,
            )?;
            server.blit(
                BlitRegion::base(&output),
                BlitRegion {
                    texture: state.capture.clone(),
                    mip: 0,
                    face: Some(face),
                },
            )?;

            stats.probes += face_stats.geometry;
            stats.probes += face_stats.lighting;
            stats.probes += face_stats.post;
            stats.probes += face_stats.probes;
            stats.probe_faces_captured += 1;
            state.face_frames[face as usize] = Some(frame);
        }

        self.probes.filter(server, probe, state)?;
        self.probes.captures += 1;

        Ok(())
    }
}
