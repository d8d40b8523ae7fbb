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

//! Screen-space reflections. The frame is traced against the Hi-Z pyramid, the trace is
//! temporally accumulated with reprojected history and finally blended over the lit frame.
//!
//! The history texture is never read and written by the same draw: the resolve goes into a
//! temporary target that is copied into the history afterwards. When the resolve can't be done
//! (no history yet, accumulation disabled) the raw trace is composited instead and copied into
//! the history, so the next frame always starts from consistent data.

pub mod blur;
pub mod composite;
pub mod temporal;
pub mod trace;

use crate::{
    core::algebra::{Matrix4, Vector3},
    graphics::{
        error::FrameworkError,
        geometry_buffer::GeometryBuffer,
        gpu_texture::{PixelKind, SharedTexture, TextureUsage},
        server::{BlitRegion, GraphicsServer},
    },
    renderer::{
        settings::SsrSettings,
        shader::LoadContext,
        ssr::{
            blur::SsrBlur,
            composite::SsrComposite,
            temporal::{ResolveInputs, SsrTemporal},
            trace::{SsrTrace, TraceInputs},
        },
        stats::FrameStatistics,
        view::{FrameBufferKey, RenderView, TextureKey, TextureSpec},
    },
};

pub(crate) struct SsrRenderContext<'a> {
    pub server: &'a dyn GraphicsServer,
    pub view: &'a mut RenderView,
    pub quad: &'a dyn GeometryBuffer,
    pub settings: &'a SsrSettings,
    /// Lit frame, reflections are composited into it.
    pub color: SharedTexture,
    pub normal: SharedTexture,
    pub material: SharedTexture,
    pub depth: SharedTexture,
    pub hiz: SharedTexture,
    pub view_projection: Matrix4<f32>,
    pub prev_view_projection: Matrix4<f32>,
    pub camera_position: Vector3<f32>,
    pub frame: u64,
    pub stats: &'a mut FrameStatistics,
}

pub struct SsrPipeline {
    trace: SsrTrace,
    temporal: SsrTemporal,
    composite: SsrComposite,
    /// Requires compute shaders, cone tracing is unavailable without it.
    blur: Option<SsrBlur>,
}

impl SsrPipeline {
    pub fn new(ctx: &LoadContext) -> Result<Self, FrameworkError> {
        Ok(Self {
            trace: SsrTrace::new(ctx)?,
            temporal: SsrTemporal::new(ctx)?,
            composite: SsrComposite::new(ctx)?,
            blur: if ctx.supports_compute() {
                Some(SsrBlur::new(ctx)?)
            } else {
                None
            },
        })
    }

    /// Runs every stage and returns the texture that was composited over the frame.
    pub(crate) fn render(&self, ctx: SsrRenderContext) -> Result<SharedTexture, FrameworkError> {
        let SsrRenderContext {
            server,
            view,
            quad,
            settings,
            color,
            normal,
            material,
            depth,
            hiz,
            view_projection,
            prev_view_projection,
            camera_position,
            frame,
            stats,
        } = ctx;

        let cone_tracing = settings.cone_tracing.enabled && self.blur.is_some();
        let color_blurred = if cone_tracing {
            view.texture(TextureKey::SsrBlurredColor)
        } else {
            None
        };

        let current = self.trace.render(
            server,
            view,
            quad,
            settings,
            &TraceInputs {
                color: &color,
                normal: &normal,
                material: &material,
                depth: &depth,
                hiz: &hiz,
                color_blurred: color_blurred.as_ref(),
                view_projection,
                prev_view_projection,
                camera_position,
                frame,
            },
            &mut stats.post,
        )?;

        let size = current.borrow().kind().size();
        let spec = TextureSpec::render_target(size.x, size.y, PixelKind::RGBA16F);
        let (history, history_created) = view.ensure(
            server,
            TextureKey::SsrHistory,
            &spec.with_usage(TextureUsage::BLIT_DESTINATION),
        )?;

        let resolved = if settings.temporal.enabled && !history_created && self.temporal.is_valid()
        {
            let temp = view.get_or_create(server, TextureKey::SsrHistoryTemp, &spec)?;
            self.temporal.render(
                server,
                view,
                quad,
                settings,
                &ResolveInputs {
                    current: &current,
                    history: &history,
                    temp: &temp,
                    normal: &normal,
                    material: &material,
                    depth: &depth,
                    prev_view_projection,
                    inv_view_projection: view_projection
                        .try_inverse()
                        .unwrap_or_else(Matrix4::identity),
                },
                &mut stats.post,
            )?;
            server.blit(BlitRegion::base(&temp), BlitRegion::base(&history))?;
            history
        } else {
            if settings.temporal.enabled {
                stats.ssr_history_fallbacks += 1;
            }
            server.blit(BlitRegion::base(&current), BlitRegion::base(&history))?;
            current
        };

        let framebuffer =
            view.framebuffer(server, FrameBufferKey::LBuffer, None, &[color.clone()])?;
        stats.post += self
            .composite
            .render(framebuffer, quad, &resolved, &normal, &depth)?;

        // The chain is sampled by the next frame.
        if let (true, Some(blur)) = (cone_tracing, self.blur.as_ref()) {
            blur.build(server, view, &settings.cone_tracing, &color, &material)?;
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        graphics::{
            geometry_buffer::GeometryBufferDescriptor,
            headless::{Command, HeadlessGraphicsServer},
        },
        core::algebra::Vector4,
        renderer::{settings::TemporalSettings, shader::EmbeddedShaders},
        scene::model::SurfaceData,
    };

    struct Fixture {
        server: HeadlessGraphicsServer,
        quad: Box<dyn GeometryBuffer>,
        color: SharedTexture,
        normal: SharedTexture,
        material: SharedTexture,
        depth: SharedTexture,
    }

    impl Fixture {
        fn new(server: HeadlessGraphicsServer) -> Self {
            let quad_data = SurfaceData::make_quad();
            let quad = server
                .create_geometry_buffer(GeometryBufferDescriptor {
                    name: "Quad",
                    vertices: &quad_data.vertices,
                    triangles: &quad_data.triangles,
                })
                .unwrap();
            Self {
                color: server
                    .create_2d_render_target("Color", PixelKind::RGBA16F, 32, 32)
                    .unwrap(),
                normal: server
                    .create_2d_render_target("Normal", PixelKind::RGBA8, 32, 32)
                    .unwrap(),
                material: server
                    .create_2d_render_target("Material", PixelKind::RGBA8, 32, 32)
                    .unwrap(),
                depth: server
                    .create_2d_render_target("Depth", PixelKind::D24S8, 32, 32)
                    .unwrap(),
                quad,
                server,
            }
        }

        fn run(
            &self,
            ssr: &SsrPipeline,
            view: &mut RenderView,
            settings: &SsrSettings,
            stats: &mut FrameStatistics,
        ) -> SharedTexture {
            let hiz = view
                .get_or_create(
                    &self.server,
                    TextureKey::HiZBuffer,
                    &TextureSpec::render_target(32, 32, PixelKind::R32F).with_mip_count(6),
                )
                .unwrap();
            let resolved = ssr
                .render(SsrRenderContext {
                    server: &self.server,
                    view,
                    quad: &*self.quad,
                    settings,
                    color: self.color.clone(),
                    normal: self.normal.clone(),
                    material: self.material.clone(),
                    depth: self.depth.clone(),
                    hiz,
                    view_projection: Matrix4::identity(),
                    prev_view_projection: Matrix4::identity(),
                    camera_position: Vector3::zeros(),
                    frame: self.server.render_frame(),
                    stats,
                })
                .unwrap();
            self.server.end_frame();
            resolved
        }

        fn composited(&self) -> Vec<u64> {
            self.server
                .draws_with("SsrComposite")
                .iter()
                .filter_map(|d| d.uniform("s_reflection").and_then(|v| v.as_texture()))
                .collect()
        }
    }

    fn id_of(texture: &SharedTexture) -> u64 {
        texture.borrow().id()
    }

    #[test]
    fn test_without_temporal_the_trace_is_composited() {
        let fixture = Fixture::new(HeadlessGraphicsServer::new());
        let ctx = LoadContext::new(&fixture.server, &EmbeddedShaders);
        let ssr = SsrPipeline::new(&ctx).unwrap();
        let mut view = RenderView::new();
        let mut stats = FrameStatistics::default();
        let settings = SsrSettings {
            temporal: TemporalSettings {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };

        fixture.run(&ssr, &mut view, &settings, &mut stats);
        fixture.run(&ssr, &mut view, &settings, &mut stats);

        let current = id_of(&view.texture(TextureKey::SsrCurr).unwrap());
        assert_eq!(fixture.composited(), vec![current, current]);
        assert!(fixture.server.draws_with("SsrTemporal").is_empty());
        assert_eq!(stats.ssr_history_fallbacks, 0);
    }

    #[test]
    fn test_history_is_used_from_the_second_frame() {
        let fixture = Fixture::new(HeadlessGraphicsServer::new());
        let ctx = LoadContext::new(&fixture.server, &EmbeddedShaders);
        let ssr = SsrPipeline::new(&ctx).unwrap();
        let mut view = RenderView::new();
        let mut stats = FrameStatistics::default();
        let settings = SsrSettings::default();

        fixture.run(&ssr, &mut view, &settings, &mut stats);
        assert_eq!(stats.ssr_history_fallbacks, 1);
        fixture.run(&ssr, &mut view, &settings, &mut stats);
        assert_eq!(stats.ssr_history_fallbacks, 1);

        let current = id_of(&view.texture(TextureKey::SsrCurr).unwrap());
        let history = id_of(&view.texture(TextureKey::SsrHistory).unwrap());
        let temp = id_of(&view.texture(TextureKey::SsrHistoryTemp).unwrap());
        assert_eq!(fixture.composited(), vec![current, history]);

        // The resolve writes the temporary target, which is then copied into the history.
        let temporal = fixture.server.draws_with("SsrTemporal");
        assert_eq!(temporal.len(), 1);
        assert_eq!(temporal[0].color_targets, vec![temp]);
        let blits = fixture
            .server
            .blits()
            .into_iter()
            .filter_map(|b| match b {
                Command::Blit { source, dest, .. } => Some((source, dest)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(blits, vec![(current, history), (temp, history)]);
    }

    #[test]
    fn test_cone_tracing_samples_previous_chain() {
        let fixture = Fixture::new(HeadlessGraphicsServer::new());
        let ctx = LoadContext::new(&fixture.server, &EmbeddedShaders);
        let ssr = SsrPipeline::new(&ctx).unwrap();
        let mut view = RenderView::new();
        let mut stats = FrameStatistics::default();
        let mut settings = SsrSettings::default();
        settings.cone_tracing.enabled = true;

        fixture.run(&ssr, &mut view, &settings, &mut stats);
        fixture.run(&ssr, &mut view, &settings, &mut stats);

        let chain = id_of(&view.texture(TextureKey::SsrBlurredColor).unwrap());
        let traces = fixture.server.draws_with("SsrTrace");
        let enabled = traces
            .iter()
            .map(|d| d.uniform("u_cone_params").and_then(|v| v.as_vector4()).unwrap().w)
            .collect::<Vec<_>>();
        assert_eq!(enabled, vec![0.0, 1.0]);
        assert_eq!(
            traces[1].uniform("s_color_blurred").and_then(|v| v.as_texture()),
            Some(chain)
        );
    }

    #[test]
    fn test_cone_tracing_is_off_without_compute() {
        let fixture = Fixture::new(HeadlessGraphicsServer::without_compute());
        let ctx = LoadContext::new(&fixture.server, &EmbeddedShaders);
        let ssr = SsrPipeline::new(&ctx).unwrap();
        let mut view = RenderView::new();
        let mut stats = FrameStatistics::default();
        let mut settings = SsrSettings::default();
        settings.cone_tracing.enabled = true;

        fixture.run(&ssr, &mut view, &settings, &mut stats);
        assert!(view.texture(TextureKey::SsrBlurredColor).is_none());
    }

    #[test]
    fn test_resolve_parameters_and_roughness_inputs() {
        let fixture = Fixture::new(HeadlessGraphicsServer::new());
        let ctx = LoadContext::new(&fixture.server, &EmbeddedShaders);
        let ssr = SsrPipeline::new(&ctx).unwrap();
        let mut view = RenderView::new();
        let mut stats = FrameStatistics::default();
        let mut settings = SsrSettings {
            half_resolution: true,
            temporal: TemporalSettings {
                enabled: true,
                strength: 0.8,
                depth_threshold: 0.02,
                roughness_sensitivity: 0.5,
                motion_scale: 64.0,
                normal_dot_threshold: 0.9,
                max_accumulation_frames: 16,
            },
            ..Default::default()
        };
        settings.cone_tracing.enabled = true;

        fixture.run(&ssr, &mut view, &settings, &mut stats);
        fixture.run(&ssr, &mut view, &settings, &mut stats);

        let temporal = fixture.server.draws_with("SsrTemporal");
        assert_eq!(temporal.len(), 1);
        let vector = |name: &str| temporal[0].uniform(name).and_then(|v| v.as_vector4());
        assert_eq!(
            vector("u_temporal_params"),
            Some(Vector4::new(1.0, 0.8, 0.02, 0.5))
        );
        assert_eq!(
            vector("u_motion_params"),
            Some(Vector4::new(64.0, 0.9, 16.0, 0.0))
        );
        assert_eq!(vector("u_fade_params").map(|p| p.z), Some(0.5));

        // Roughness comes from the material channel in every stage.
        let material = Some(id_of(&fixture.material));
        assert_eq!(
            temporal[0].uniform("s_material").and_then(|v| v.as_texture()),
            material
        );
        for trace in fixture.server.draws_with("SsrTrace") {
            assert_eq!(trace.uniform("s_material").and_then(|v| v.as_texture()), material);
        }
        let blur = fixture.server.dispatches_with("SsrBlur");
        assert!(!blur.is_empty());
        for dispatch in blur {
            assert_eq!(dispatch.uniform("s_material").and_then(|v| v.as_texture()), material);
        }
    }
}
