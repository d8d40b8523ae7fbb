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

use crate::{
    core::{algebra::Vector2, color::Color, math::Rect},
    error::FrameworkError,
    geometry_buffer::GeometryBuffer,
    gpu_program::{GpuProgram, GpuProgramBinding},
    gpu_texture::{CubeMapFace, GpuTexture},
    stats::DrawCallStatistics,
    DrawParameters, ElementRange,
};
use std::{any::Any, cell::RefCell, rc::Rc};

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Eq)]
pub enum AttachmentKind {
    Color,
    DepthStencil,
    Depth,
}

#[derive(Clone)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub texture: Rc<RefCell<dyn GpuTexture>>,
}

impl Attachment {
    pub fn color(texture: Rc<RefCell<dyn GpuTexture>>) -> Self {
        Self {
            kind: AttachmentKind::Color,
            texture,
        }
    }

    pub fn depth(texture: Rc<RefCell<dyn GpuTexture>>) -> Self {
        Self {
            kind: AttachmentKind::Depth,
            texture,
        }
    }
}

pub trait FrameBuffer: Any {
    fn as_any(&self) -> &dyn Any;
    fn id(&self) -> u64;
    fn color_attachments(&self) -> &[Attachment];
    fn depth_attachment(&self) -> Option<&Attachment>;
    /// Redirects rendering of the given color attachment into a face (and mip) of a cube map.
    fn set_cubemap_face(&mut self, attachment_index: usize, face: CubeMapFace, mip: usize);
    fn clear(
        &mut self,
        viewport: Rect<i32>,
        color: Option<Color>,
        depth: Option<f32>,
        stencil: Option<i32>,
    );
    fn draw(
        &mut self,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        element_range: ElementRange,
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<DrawCallStatistics, FrameworkError>;

    /// Size of the first attachment, zero if there are no attachments at all.
    fn size(&self) -> Vector2<usize> {
        self.color_attachments()
            .first()
            .or(self.depth_attachment())
            .map(|a| a.texture.borrow().kind().size())
            .unwrap_or_default()
    }

    /// Full-size viewport of the frame buffer.
    fn viewport(&self) -> Rect<i32> {
        let size = self.size();
        Rect::new(0, 0, size.x as i32, size.y as i32)
    }
}
