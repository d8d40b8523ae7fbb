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

//! Render view owns every render target of a camera. Targets are created lazily when a pass asks
//! for them and recreated when the requested size or format changes, so resizing the viewport
//! never needs an explicit notification.

use crate::{
    core::{algebra::Matrix4, info, pool::Handle},
    graphics::{
        error::FrameworkError,
        framebuffer::{Attachment, FrameBuffer},
        gpu_texture::{
            GpuTexture, GpuTextureDescriptor, GpuTextureKind, PixelKind, SharedTexture,
            TextureUsage,
        },
        server::GraphicsServer,
    },
    renderer::lod::LodState,
    scene::Entity,
};
use fxhash::FxHashMap;
use strum_macros::{AsRefStr, EnumString, VariantNames};

/// Names of textures owned by a render view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, AsRefStr, EnumString, VariantNames)]
pub enum TextureKey {
    #[strum(serialize = "DEPTH")]
    Depth,
    #[strum(serialize = "GBUFFER_ALBEDO")]
    GBufferAlbedo,
    #[strum(serialize = "GBUFFER_NORMAL")]
    GBufferNormal,
    #[strum(serialize = "GBUFFER_MATERIAL")]
    GBufferMaterial,
    #[strum(serialize = "GBUFFER_EMISSIVE")]
    GBufferEmissive,
    #[strum(serialize = "LBUFFER")]
    LBuffer,
    #[strum(serialize = "RBUFFER")]
    RBuffer,
    #[strum(serialize = "HIZBUFFER")]
    HiZBuffer,
    #[strum(serialize = "SSR_CURR")]
    SsrCurr,
    #[strum(serialize = "SSR_HISTORY")]
    SsrHistory,
    #[strum(serialize = "SSR_HISTORY_TEMP")]
    SsrHistoryTemp,
    #[strum(serialize = "SSR_BLURRED_COLOR")]
    SsrBlurredColor,
    #[strum(serialize = "AO")]
    Ao,
    #[strum(serialize = "AO_BLUR")]
    AoBlur,
    #[strum(serialize = "TONEMAP_OUTPUT")]
    ToneMapOutput,
    #[strum(serialize = "OBUFFER")]
    OBuffer,
}

/// Names of frame buffers owned by a render view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, AsRefStr, EnumString, VariantNames)]
pub enum FrameBufferKey {
    #[strum(serialize = "GBUFFER")]
    GBuffer,
    #[strum(serialize = "LBUFFER")]
    LBuffer,
    #[strum(serialize = "LBUFFER_DEPTH")]
    LBufferDepth,
    #[strum(serialize = "RBUFFER")]
    RBuffer,
    #[strum(serialize = "SSR_CURR")]
    SsrCurr,
    #[strum(serialize = "SSR_HISTORY_TEMP")]
    SsrHistoryTemp,
    #[strum(serialize = "AO")]
    Ao,
    #[strum(serialize = "AO_BLUR")]
    AoBlur,
    #[strum(serialize = "AO_APPLY")]
    AoApply,
    #[strum(serialize = "TONEMAP_OUTPUT")]
    ToneMapOutput,
    #[strum(serialize = "OBUFFER")]
    OBuffer,
    #[strum(serialize = "OBUFFER_DEPTH")]
    OBufferDepth,
}

/// Requirements a pass has for a texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureSpec {
    pub width: usize,
    pub height: usize,
    pub pixel_kind: PixelKind,
    pub mip_count: usize,
    pub usage: TextureUsage,
}

impl TextureSpec {
    /// Single-mip render target that can be sampled.
    pub fn render_target(width: usize, height: usize, pixel_kind: PixelKind) -> Self {
        Self {
            width,
            height,
            pixel_kind,
            mip_count: 1,
            usage: TextureUsage::SAMPLED | TextureUsage::RENDER_TARGET,
        }
    }

    pub fn with_mip_count(mut self, mip_count: usize) -> Self {
        self.mip_count = mip_count.max(1);
        self
    }

    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage |= usage;
        self
    }

    fn matches(&self, texture: &dyn GpuTexture) -> bool {
        texture.kind()
            == GpuTextureKind::Rectangle {
                width: self.width,
                height: self.height,
            }
            && texture.pixel_kind() == self.pixel_kind
            && texture.mip_count() == self.mip_count
    }
}

struct CachedFrameBuffer {
    framebuffer: Box<dyn FrameBuffer>,
    attachments: Vec<u64>,
}

/// A frame buffer temporarily taken out of a render view, see [`RenderView::take_framebuffer`].
pub struct DetachedFrameBuffer {
    key: FrameBufferKey,
    inner: CachedFrameBuffer,
}

impl DetachedFrameBuffer {
    pub fn framebuffer(&mut self) -> &mut dyn FrameBuffer {
        &mut *self.inner.framebuffer
    }
}

/// Per-camera set of render targets and temporal state. Must not be shared between cameras.
#[derive(Default)]
pub struct RenderView {
    textures: FxHashMap<TextureKey, SharedTexture>,
    framebuffers: FxHashMap<FrameBufferKey, CachedFrameBuffer>,
    lod_states: FxHashMap<Handle<Entity>, LodState>,
    prev_view_projection: Option<Matrix4<f32>>,
    texture_recreations: usize,
}

impl RenderView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a texture that matches the given description. An existing texture is reused when
    /// its size, format and mip count match, otherwise it is replaced by a new one.
    pub fn get_or_create(
        &mut self,
        server: &dyn GraphicsServer,
        key: TextureKey,
        spec: &TextureSpec,
    ) -> Result<SharedTexture, FrameworkError> {
        self.ensure(server, key, spec).map(|(texture, _)| texture)
    }

    /// Same as [`Self::get_or_create`], but also tells whether the texture was (re)created.
    pub fn ensure(
        &mut self,
        server: &dyn GraphicsServer,
        key: TextureKey,
        spec: &TextureSpec,
    ) -> Result<(SharedTexture, bool), FrameworkError> {
        if let Some(existing) = self.textures.get(&key) {
            if spec.matches(&*existing.borrow()) {
                return Ok((existing.clone(), false));
            }
            info!(
                "Recreating {} render target: {}x{} {:?}, {} mip(s).",
                key.as_ref(),
                spec.width,
                spec.height,
                spec.pixel_kind,
                spec.mip_count
            );
            self.texture_recreations += 1;
        }

        let texture = server.create_texture(GpuTextureDescriptor {
            name: key.as_ref(),
            kind: GpuTextureKind::Rectangle {
                width: spec.width,
                height: spec.height,
            },
            pixel_kind: spec.pixel_kind,
            mip_count: spec.mip_count,
            usage: spec.usage,
        })?;
        self.textures.insert(key, texture.clone());
        Ok((texture, true))
    }

    /// Returns previously created texture.
    pub fn texture(&self, key: TextureKey) -> Option<SharedTexture> {
        self.textures.get(&key).cloned()
    }

    /// Returns a frame buffer with the given attachments. The frame buffer is rebuilt whenever
    /// any of its attachments was replaced.
    pub fn framebuffer(
        &mut self,
        server: &dyn GraphicsServer,
        key: FrameBufferKey,
        depth: Option<&SharedTexture>,
        colors: &[SharedTexture],
    ) -> Result<&mut dyn FrameBuffer, FrameworkError> {
        let ids = colors
            .iter()
            .chain(depth)
            .map(|t| t.borrow().id())
            .collect::<Vec<_>>();

        let up_to_date = self
            .framebuffers
            .get(&key)
            .is_some_and(|cached| cached.attachments == ids);
        if !up_to_date {
            let framebuffer = server.create_frame_buffer(
                depth.map(|d| Attachment::depth(d.clone())),
                colors.iter().map(|c| Attachment::color(c.clone())).collect(),
            )?;
            self.framebuffers.insert(
                key,
                CachedFrameBuffer {
                    framebuffer,
                    attachments: ids,
                },
            );
        }

        match self.framebuffers.get_mut(&key) {
            Some(cached) => Ok(&mut *cached.framebuffer),
            None => Err(FrameworkError::FailedToConstructFBO(key.as_ref().to_owned())),
        }
    }

    /// Removes a frame buffer from the view, so it can be used while the view is borrowed
    /// mutably. Put it back with [`Self::restore_framebuffer`].
    pub fn take_framebuffer(&mut self, key: FrameBufferKey) -> Option<DetachedFrameBuffer> {
        self.framebuffers
            .remove(&key)
            .map(|inner| DetachedFrameBuffer { key, inner })
    }

    pub fn restore_framebuffer(&mut self, detached: DetachedFrameBuffer) {
        self.framebuffers.insert(detached.key, detached.inner);
    }

    pub fn lod_state(&self, entity: Handle<Entity>) -> Option<&LodState> {
        self.lod_states.get(&entity)
    }

    pub(crate) fn lod_states_mut(&mut self) -> &mut FxHashMap<Handle<Entity>, LodState> {
        &mut self.lod_states
    }

    /// View-projection matrix of the camera at the end of the previous run.
    pub fn prev_view_projection(&self) -> Option<Matrix4<f32>> {
        self.prev_view_projection
    }

    pub(crate) fn set_prev_view_projection(&mut self, matrix: Matrix4<f32>) {
        self.prev_view_projection = Some(matrix);
    }

    /// How many times a texture had to be replaced because its size, format or mip count changed.
    pub fn texture_recreations(&self) -> usize {
        self.texture_recreations
    }

    /// Releases every GPU resource and temporal state of the view.
    pub fn clear(&mut self) {
        self.textures.clear();
        self.framebuffers.clear();
        self.lod_states.clear();
        self.prev_view_projection = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graphics::headless::HeadlessGraphicsServer;
    use std::rc::Rc;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let server = HeadlessGraphicsServer::new();
        let mut view = RenderView::new();
        let spec = TextureSpec::render_target(64, 32, PixelKind::RGBA8);
        let a = view.get_or_create(&server, TextureKey::LBuffer, &spec).unwrap();
        let b = view.get_or_create(&server, TextureKey::LBuffer, &spec).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(server.texture_allocations(), 1);
        assert_eq!(view.texture_recreations(), 0);
    }

    #[test]
    fn test_mismatch_recreates_texture() {
        let server = HeadlessGraphicsServer::new();
        let mut view = RenderView::new();
        let spec = TextureSpec::render_target(64, 32, PixelKind::RGBA8);
        let (a, created) = view.ensure(&server, TextureKey::LBuffer, &spec).unwrap();
        assert!(created);
        drop(a);

        let resized = TextureSpec::render_target(128, 32, PixelKind::RGBA8);
        let (b, created) = view.ensure(&server, TextureKey::LBuffer, &resized).unwrap();
        assert!(created);
        assert_eq!(b.borrow().kind().width(), 128);

        let reformatted = resized.with_mip_count(3);
        view.get_or_create(&server, TextureKey::LBuffer, &reformatted)
            .unwrap();
        drop(b);

        assert_eq!(server.texture_allocations(), 3);
        assert_eq!(view.texture_recreations(), 2);
        // Old textures are released once nothing references them.
        assert_eq!(server.live_textures(), 1);
    }

    #[test]
    fn test_framebuffer_follows_attachments() {
        let server = HeadlessGraphicsServer::new();
        let mut view = RenderView::new();
        let spec = TextureSpec::render_target(16, 16, PixelKind::RGBA8);
        let texture = view.get_or_create(&server, TextureKey::OBuffer, &spec).unwrap();
        let first = view
            .framebuffer(&server, FrameBufferKey::OBuffer, None, &[texture.clone()])
            .unwrap()
            .id();
        let second = view
            .framebuffer(&server, FrameBufferKey::OBuffer, None, &[texture])
            .unwrap()
            .id();
        assert_eq!(first, second);

        let resized = TextureSpec::render_target(32, 16, PixelKind::RGBA8);
        let texture = view.get_or_create(&server, TextureKey::OBuffer, &resized).unwrap();
        let third = view
            .framebuffer(&server, FrameBufferKey::OBuffer, None, &[texture])
            .unwrap()
            .id();
        assert_ne!(first, third);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(TextureKey::HiZBuffer.as_ref(), "HIZBUFFER");
        assert_eq!(FrameBufferKey::GBuffer.as_ref(), "GBUFFER");
    }
}
