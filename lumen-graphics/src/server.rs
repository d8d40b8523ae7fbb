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

#![warn(missing_docs)]

//! Graphics server is an abstraction layer over various graphics APIs used on different platforms
//! supported by the renderer.

use crate::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    geometry_buffer::{GeometryBuffer, GeometryBufferDescriptor},
    gpu_program::{GpuProgram, GpuProgramBinding},
    gpu_texture::{
        CubeMapFace, GpuTexture, GpuTextureDescriptor, GpuTextureKind, PixelKind, TextureUsage,
    },
};
use std::{any::Any, cell::RefCell, rc::Rc};

/// Graphics server capabilities.
#[derive(Debug, Clone)]
pub struct ServerCapabilities {
    /// Whether the server is able to run compute shaders.
    pub compute_shaders: bool,
    /// The maximum width or height of a texture.
    pub max_texture_size: usize,
}

/// A shared reference to a graphics server.
pub type SharedGraphicsServer = Rc<dyn GraphicsServer>;

/// A source or destination of a blit operation.
#[derive(Clone)]
pub struct BlitRegion {
    /// Texture to copy from or to.
    pub texture: Rc<RefCell<dyn GpuTexture>>,
    /// Mip level of the texture.
    pub mip: usize,
    /// Face of a cube map texture, must be `None` for rectangle textures.
    pub face: Option<CubeMapFace>,
}

impl BlitRegion {
    /// Base mip level of a rectangle texture.
    pub fn base(texture: &Rc<RefCell<dyn GpuTexture>>) -> Self {
        Self {
            texture: texture.clone(),
            mip: 0,
            face: None,
        }
    }
}

/// Graphics server is an abstraction layer over various graphics APIs used on different platforms
/// supported by the renderer. Such abstraction layer tries to provide more or less high-level and
/// unified interface, that can be used to build graphics pipelines quickly and more or less
/// efficiently.
///
/// Every call is issued from a single render thread, in program order.
pub trait GraphicsServer: Any {
    /// Casts the server to [`Any`], useful to get access to backend-specific functionality.
    fn as_any(&self) -> &dyn Any;

    /// Creates a new GPU texture using the given descriptor.
    fn create_texture(
        &self,
        desc: GpuTextureDescriptor,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError>;

    /// Creates a new frame buffer using the given depth and color attachments.
    fn create_frame_buffer(
        &self,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Box<dyn FrameBuffer>, FrameworkError>;

    /// Creates a new named GPU program using a pair of vertex and fragment shaders. The name could
    /// be used for debugging purposes.
    fn create_program(
        &self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError>;

    /// Creates a new named compute program.
    fn create_compute_program(
        &self,
        name: &str,
        compute_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError>;

    /// Creates a new geometry buffer from the given vertices and triangles.
    fn create_geometry_buffer(
        &self,
        desc: GeometryBufferDescriptor,
    ) -> Result<Box<dyn GeometryBuffer>, FrameworkError>;

    /// Makes the program current. Prefer [`ProgramScope`] which guarantees a matching
    /// [`Self::end_program`] call.
    fn begin_program(&self, program: &dyn GpuProgram);

    /// Releases the program made current by [`Self::begin_program`].
    fn end_program(&self, program: &dyn GpuProgram);

    /// Runs a compute program with the given amount of thread groups.
    fn dispatch(
        &self,
        program: &dyn GpuProgram,
        groups: [u32; 3],
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<(), FrameworkError>;

    /// Copies the contents of one texture region into another. Regions must have the same size and
    /// pixel format.
    fn blit(&self, source: BlitRegion, dest: BlitRegion) -> Result<(), FrameworkError>;

    /// Returns the index of the frame that is currently being rendered.
    fn render_frame(&self) -> u64;

    /// Finishes the current frame and advances the frame counter.
    fn end_frame(&self);

    /// Returns current capabilities of the graphics server. See [`ServerCapabilities`] for more
    /// info.
    fn capabilities(&self) -> ServerCapabilities;

    /// A shortcut for [`Self::create_texture`], that creates a rectangular render target with the
    /// given size and pixel kind.
    fn create_2d_render_target(
        &self,
        name: &str,
        pixel_kind: PixelKind,
        width: usize,
        height: usize,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        self.create_texture(GpuTextureDescriptor {
            name,
            kind: GpuTextureKind::Rectangle { width, height },
            pixel_kind,
            mip_count: 1,
            usage: TextureUsage::SAMPLED | TextureUsage::RENDER_TARGET,
        })
    }
}

/// Scoped program activation. The program is made current on creation and released when the
/// scope is dropped, on every exit path.
pub struct ProgramScope<'a> {
    server: &'a dyn GraphicsServer,
    program: &'a dyn GpuProgram,
}

impl<'a> ProgramScope<'a> {
    /// Begins the program and returns a guard that ends it.
    pub fn new(server: &'a dyn GraphicsServer, program: &'a dyn GpuProgram) -> Self {
        server.begin_program(program);
        Self { server, program }
    }

    /// Dispatches the scoped compute program.
    pub fn dispatch(
        &self,
        groups: [u32; 3],
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<(), FrameworkError> {
        self.server.dispatch(self.program, groups, apply_uniforms)
    }

    /// The program this scope was created for.
    pub fn program(&self) -> &'a dyn GpuProgram {
        self.program
    }
}

impl Drop for ProgramScope<'_> {
    fn drop(&mut self) {
        self.server.end_program(self.program);
    }
}

/// Amount of 8x8 thread groups required to cover the given size.
#[inline]
pub fn thread_groups_8x8(width: usize, height: usize) -> [u32; 3] {
    [width.div_ceil(8) as u32, height.div_ceil(8) as u32, 1]
}
