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

//! Headless graphics server. It does not talk to any GPU, instead it validates every call and
//! records it into a command list. It is used to run the renderer without a window (for example
//! on CI servers) and to inspect which passes were executed in a frame.

use crate::{
    core::{
        algebra::{Matrix4, Vector2, Vector3, Vector4},
        color::Color,
        math::Rect,
    },
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    geometry_buffer::{GeometryBuffer, GeometryBufferDescriptor},
    gpu_program::{
        GpuProgram, GpuProgramBinding, ImageAccess, ProgramKind, UniformLocation, UniformValue,
    },
    gpu_texture::{
        CubeMapFace, GpuTexture, GpuTextureDescriptor, GpuTextureKind, PixelKind, TextureUsage,
    },
    server::{BlitRegion, GraphicsServer, ServerCapabilities},
    stats::DrawCallStatistics,
    DrawParameters, ElementRange,
};
use fxhash::{FxHashMap, FxHashSet};
use regex::Regex;
use std::{
    any::Any,
    cell::{Cell, RefCell},
    rc::Rc,
    sync::LazyLock,
};

static UNIFORM_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"uniform\s+[^;{]*?(\w+)\s*(?:\[\s*\w*\s*\])?\s*;").ok());

/// Extracts names of all uniforms declared in a shader source.
pub fn declared_uniforms(source: &str) -> Vec<String> {
    let Some(regex) = UNIFORM_REGEX.as_ref() else {
        return Vec::new();
    };
    regex
        .captures_iter(source)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_owned()))
        .collect()
}

/// A copy of a uniform value that does not hold GPU resources alive.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector2(Vector2<f32>),
    Vector3(Vector3<f32>),
    Vector4(Vector4<f32>),
    Matrix4(Matrix4<f32>),
    Color(Color),
    Texture(u64),
    Image {
        texture: u64,
        mip: usize,
        access: ImageAccess,
    },
}

impl RecordedValue {
    fn from_value(value: &UniformValue) -> Self {
        match value {
            UniformValue::Bool(v) => Self::Bool(*v),
            UniformValue::Int(v) => Self::Int(*v),
            UniformValue::Float(v) => Self::Float(*v),
            UniformValue::Vector2(v) => Self::Vector2(*v),
            UniformValue::Vector3(v) => Self::Vector3(*v),
            UniformValue::Vector4(v) => Self::Vector4(*v),
            UniformValue::Matrix4(v) => Self::Matrix4(*v),
            UniformValue::Color(v) => Self::Color(*v),
            UniformValue::Texture(t) => Self::Texture(t.borrow().id()),
            UniformValue::Image {
                texture,
                mip,
                access,
            } => Self::Image {
                texture: texture.borrow().id(),
                mip: *mip,
                access: *access,
            },
        }
    }

    pub fn as_texture(&self) -> Option<u64> {
        match self {
            Self::Texture(id) => Some(*id),
            Self::Image { texture, .. } => Some(*texture),
            _ => None,
        }
    }

    pub fn as_vector4(&self) -> Option<Vector4<f32>> {
        match self {
            Self::Vector4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommand {
    pub framebuffer: u64,
    pub color_targets: Vec<u64>,
    pub cube_face: Option<(CubeMapFace, usize)>,
    pub program: String,
    pub geometry: String,
    pub triangles: usize,
    pub viewport: Rect<i32>,
    pub params: DrawParameters,
    pub uniforms: Vec<(String, RecordedValue)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DispatchCommand {
    pub program: String,
    pub groups: [u32; 3],
    /// `true` if the dispatch happened inside a begin/end bracket of the same program.
    pub scoped: bool,
    pub uniforms: Vec<(String, RecordedValue)>,
}

fn find_uniform<'a>(
    uniforms: &'a [(String, RecordedValue)],
    name: &str,
) -> Option<&'a RecordedValue> {
    uniforms.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

impl DrawCommand {
    pub fn uniform(&self, name: &str) -> Option<&RecordedValue> {
        find_uniform(&self.uniforms, name)
    }
}

impl DispatchCommand {
    pub fn uniform(&self, name: &str) -> Option<&RecordedValue> {
        find_uniform(&self.uniforms, name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateTexture {
        id: u64,
        name: String,
        width: usize,
        height: usize,
        pixel_kind: PixelKind,
        mip_count: usize,
    },
    Clear {
        framebuffer: u64,
        color: Option<Color>,
        depth: Option<f32>,
    },
    Draw(DrawCommand),
    BeginProgram(String),
    EndProgram(String),
    Dispatch(DispatchCommand),
    Blit {
        source: u64,
        source_mip: usize,
        dest: u64,
        dest_mip: usize,
        dest_face: Option<CubeMapFace>,
    },
    EndFrame(u64),
}

#[derive(Default)]
struct HeadlessState {
    next_id: u64,
    frame: u64,
    commands: Vec<Command>,
    failing_programs: FxHashSet<String>,
    texture_names: FxHashMap<u64, String>,
    texture_allocations: usize,
    active_programs: Vec<String>,
    no_compute: bool,
}

impl HeadlessState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct HeadlessTexture {
    id: u64,
    name: String,
    kind: GpuTextureKind,
    pixel_kind: PixelKind,
    mip_count: usize,
    usage: TextureUsage,
    live_counter: Rc<Cell<usize>>,
}

impl Drop for HeadlessTexture {
    fn drop(&mut self) {
        self.live_counter.set(self.live_counter.get().saturating_sub(1));
    }
}

impl GpuTexture for HeadlessTexture {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> GpuTextureKind {
        self.kind
    }

    fn pixel_kind(&self) -> PixelKind {
        self.pixel_kind
    }

    fn mip_count(&self) -> usize {
        self.mip_count
    }

    fn usage(&self) -> TextureUsage {
        self.usage
    }
}

pub struct HeadlessProgram {
    name: String,
    kind: ProgramKind,
    uniforms: Vec<String>,
}

impl HeadlessProgram {
    fn uniform_name(&self, location: &UniformLocation) -> String {
        self.uniforms
            .get(location.id)
            .cloned()
            .unwrap_or_else(|| format!("#{}", location.id))
    }

    fn record(&self, binding: GpuProgramBinding) -> Vec<(String, RecordedValue)> {
        binding
            .values()
            .iter()
            .map(|(location, value)| {
                (self.uniform_name(location), RecordedValue::from_value(value))
            })
            .collect()
    }
}

impl GpuProgram for HeadlessProgram {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProgramKind {
        self.kind
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn uniform_location(&self, name: &str) -> Result<UniformLocation, FrameworkError> {
        self.uniforms
            .iter()
            .position(|u| u == name)
            .map(UniformLocation::new)
            .ok_or_else(|| {
                FrameworkError::UnableToFindShaderUniform(format!("{} in {}", name, self.name))
            })
    }
}

pub struct HeadlessGeometryBuffer {
    id: u64,
    name: String,
    triangles: usize,
}

impl GeometryBuffer for HeadlessGeometryBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn triangle_count(&self) -> usize {
        self.triangles
    }
}

pub struct HeadlessFrameBuffer {
    id: u64,
    state: Rc<RefCell<HeadlessState>>,
    color_attachments: Vec<Attachment>,
    depth_attachment: Option<Attachment>,
    cube_face: Option<(CubeMapFace, usize)>,
}

fn downcast_program(program: &dyn GpuProgram) -> Result<&HeadlessProgram, FrameworkError> {
    program
        .as_any()
        .downcast_ref::<HeadlessProgram>()
        .ok_or_else(|| {
            FrameworkError::Custom(format!("{} is not a headless program", program.name()))
        })
}

impl FrameBuffer for HeadlessFrameBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn color_attachments(&self) -> &[Attachment] {
        &self.color_attachments
    }

    fn depth_attachment(&self) -> Option<&Attachment> {
        self.depth_attachment.as_ref()
    }

    fn set_cubemap_face(&mut self, _attachment_index: usize, face: CubeMapFace, mip: usize) {
        self.cube_face = Some((face, mip));
    }

    fn clear(
        &mut self,
        _viewport: Rect<i32>,
        color: Option<Color>,
        depth: Option<f32>,
        _stencil: Option<i32>,
    ) {
        self.state.borrow_mut().commands.push(Command::Clear {
            framebuffer: self.id,
            color,
            depth,
        });
    }

    fn draw(
        &mut self,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        element_range: ElementRange,
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<DrawCallStatistics, FrameworkError> {
        let headless_program = downcast_program(program)?;
        if headless_program.kind != ProgramKind::Graphics {
            return Err(FrameworkError::Custom(format!(
                "Compute program {} cannot be used for drawing",
                program.name()
            )));
        }

        let triangles = geometry.triangles_in_range(element_range)?;

        let mut binding = GpuProgramBinding::default();
        apply_uniforms(&mut binding);

        let command = DrawCommand {
            framebuffer: self.id,
            color_targets: self
                .color_attachments
                .iter()
                .map(|a| a.texture.borrow().id())
                .collect(),
            cube_face: self.cube_face,
            program: program.name().to_owned(),
            geometry: geometry.name().to_owned(),
            triangles,
            viewport,
            params: params.clone(),
            uniforms: headless_program.record(binding),
        };
        self.state.borrow_mut().commands.push(Command::Draw(command));

        Ok(DrawCallStatistics { triangles })
    }
}

/// See module docs.
#[derive(Clone, Default)]
pub struct HeadlessGraphicsServer {
    state: Rc<RefCell<HeadlessState>>,
    live_textures: Rc<Cell<usize>>,
}

impl HeadlessGraphicsServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a server that reports no compute shader support.
    pub fn without_compute() -> Self {
        let server = Self::default();
        server.state.borrow_mut().no_compute = true;
        server
    }

    /// Every subsequent attempt to create a program with the given name will fail with a
    /// compilation error.
    pub fn fail_program(&self, name: &str) {
        self.state.borrow_mut().failing_programs.insert(name.to_owned());
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state.borrow().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    pub fn draws(&self) -> Vec<DrawCommand> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw(draw) => Some(draw.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn draws_with(&self, program: &str) -> Vec<DrawCommand> {
        self.draws()
            .into_iter()
            .filter(|d| d.program == program)
            .collect()
    }

    /// Draws with any program whose name starts with the given prefix.
    pub fn draws_with_prefix(&self, prefix: &str) -> Vec<DrawCommand> {
        self.draws()
            .into_iter()
            .filter(|d| d.program.starts_with(prefix))
            .collect()
    }

    pub fn dispatches_with(&self, program: &str) -> Vec<DispatchCommand> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Dispatch(dispatch) if dispatch.program == program => {
                    Some(dispatch.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn count_begin(&self, program: &str) -> usize {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|c| matches!(c, Command::BeginProgram(p) if p == program))
            .count()
    }

    pub fn blits(&self) -> Vec<Command> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|c| matches!(c, Command::Blit { .. }))
            .cloned()
            .collect()
    }

    /// Total amount of textures created so far.
    pub fn texture_allocations(&self) -> usize {
        self.state.borrow().texture_allocations
    }

    /// Amount of textures that are still alive.
    pub fn live_textures(&self) -> usize {
        self.live_textures.get()
    }

    pub fn texture_name(&self, id: u64) -> Option<String> {
        self.state.borrow().texture_names.get(&id).cloned()
    }

    fn make_program(
        &self,
        name: &str,
        kind: ProgramKind,
        sources: &[&str],
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        let state = self.state.borrow();
        if state.failing_programs.contains(name) {
            return Err(FrameworkError::ShaderCompilationFailed {
                shader_name: name.to_owned(),
                error_message: "compilation was rejected by the headless server".to_owned(),
            });
        }
        if kind == ProgramKind::Compute && state.no_compute {
            return Err(FrameworkError::ComputeNotSupported);
        }

        let mut uniforms = Vec::new();
        for source in sources {
            for uniform in declared_uniforms(source) {
                if !uniforms.contains(&uniform) {
                    uniforms.push(uniform);
                }
            }
        }

        Ok(Box::new(HeadlessProgram {
            name: name.to_owned(),
            kind,
            uniforms,
        }))
    }
}

fn region_size(region: &BlitRegion) -> Vector2<usize> {
    region.texture.borrow().kind().mip_size(region.mip)
}

impl GraphicsServer for HeadlessGraphicsServer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_texture(
        &self,
        desc: GpuTextureDescriptor,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        let (width, height) = (desc.kind.width(), desc.kind.height());
        if width == 0 || height == 0 {
            return Err(FrameworkError::InvalidTextureSize { width, height });
        }

        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.texture_allocations += 1;
        state.texture_names.insert(id, desc.name.to_owned());
        state.commands.push(Command::CreateTexture {
            id,
            name: desc.name.to_owned(),
            width,
            height,
            pixel_kind: desc.pixel_kind,
            mip_count: desc.mip_count,
        });
        self.live_textures.set(self.live_textures.get() + 1);

        Ok(Rc::new(RefCell::new(HeadlessTexture {
            id,
            name: desc.name.to_owned(),
            kind: desc.kind,
            pixel_kind: desc.pixel_kind,
            mip_count: desc.mip_count.max(1),
            usage: desc.usage,
            live_counter: self.live_textures.clone(),
        })))
    }

    fn create_frame_buffer(
        &self,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Box<dyn FrameBuffer>, FrameworkError> {
        if depth_attachment.is_none() && color_attachments.is_empty() {
            return Err(FrameworkError::FailedToConstructFBO(
                "a frame buffer must have at least one attachment".to_owned(),
            ));
        }

        let mut sizes = color_attachments
            .iter()
            .chain(depth_attachment.iter())
            .map(|a| a.texture.borrow().kind().size());
        if let Some(first) = sizes.next() {
            if sizes.any(|s| s != first) {
                return Err(FrameworkError::FailedToConstructFBO(
                    "all attachments must have the same size".to_owned(),
                ));
            }
        }

        if let Some(depth) = depth_attachment.as_ref() {
            if !depth.texture.borrow().pixel_kind().is_depth() {
                return Err(FrameworkError::FailedToConstructFBO(
                    "depth attachment must have a depth pixel format".to_owned(),
                ));
            }
        }

        let id = self.state.borrow_mut().next_id();
        Ok(Box::new(HeadlessFrameBuffer {
            id,
            state: self.state.clone(),
            color_attachments,
            depth_attachment,
            cube_face: None,
        }))
    }

    fn create_program(
        &self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        self.make_program(name, ProgramKind::Graphics, &[vertex_source, fragment_source])
    }

    fn create_compute_program(
        &self,
        name: &str,
        compute_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        self.make_program(name, ProgramKind::Compute, &[compute_source])
    }

    fn create_geometry_buffer(
        &self,
        desc: GeometryBufferDescriptor,
    ) -> Result<Box<dyn GeometryBuffer>, FrameworkError> {
        desc.validate()?;
        let id = self.state.borrow_mut().next_id();
        Ok(Box::new(HeadlessGeometryBuffer {
            id,
            name: desc.name.to_owned(),
            triangles: desc.triangles.len(),
        }))
    }

    fn begin_program(&self, program: &dyn GpuProgram) {
        let mut state = self.state.borrow_mut();
        state.active_programs.push(program.name().to_owned());
        state
            .commands
            .push(Command::BeginProgram(program.name().to_owned()));
    }

    fn end_program(&self, program: &dyn GpuProgram) {
        let mut state = self.state.borrow_mut();
        if let Some(position) = state
            .active_programs
            .iter()
            .rposition(|p| p == program.name())
        {
            state.active_programs.remove(position);
        }
        state
            .commands
            .push(Command::EndProgram(program.name().to_owned()));
    }

    fn dispatch(
        &self,
        program: &dyn GpuProgram,
        groups: [u32; 3],
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<(), FrameworkError> {
        let headless_program = downcast_program(program)?;
        if headless_program.kind != ProgramKind::Compute {
            return Err(FrameworkError::Custom(format!(
                "{} is not a compute program",
                program.name()
            )));
        }
        if groups.iter().any(|g| *g == 0) {
            return Err(FrameworkError::Custom(format!(
                "Dispatch of {} has an empty thread group count {groups:?}",
                program.name()
            )));
        }

        let mut binding = GpuProgramBinding::default();
        apply_uniforms(&mut binding);

        let mut state = self.state.borrow_mut();
        let scoped = state.active_programs.iter().any(|p| p == program.name());
        state.commands.push(Command::Dispatch(DispatchCommand {
            program: program.name().to_owned(),
            groups,
            scoped,
            uniforms: headless_program.record(binding),
        }));

        Ok(())
    }

    fn blit(&self, source: BlitRegion, dest: BlitRegion) -> Result<(), FrameworkError> {
        let source_size = region_size(&source);
        let dest_size = region_size(&dest);
        if source_size != dest_size {
            return Err(FrameworkError::Custom(format!(
                "Blit size mismatch: {}x{} -> {}x{}",
                source_size.x, source_size.y, dest_size.x, dest_size.y
            )));
        }
        let source_kind = source.texture.borrow().pixel_kind();
        let dest_kind = dest.texture.borrow().pixel_kind();
        if source_kind != dest_kind {
            return Err(FrameworkError::Custom(format!(
                "Blit pixel format mismatch: {source_kind:?} -> {dest_kind:?}"
            )));
        }

        let command = Command::Blit {
            source: source.texture.borrow().id(),
            source_mip: source.mip,
            dest: dest.texture.borrow().id(),
            dest_mip: dest.mip,
            dest_face: dest.face,
        };
        self.state.borrow_mut().commands.push(command);
        Ok(())
    }

    fn render_frame(&self) -> u64 {
        self.state.borrow().frame
    }

    fn end_frame(&self) {
        let mut state = self.state.borrow_mut();
        let frame = state.frame;
        state.commands.push(Command::EndFrame(frame));
        state.frame += 1;
    }

    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            compute_shaders: !self.state.borrow().no_compute,
            max_texture_size: 16384,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::server::ProgramScope;

    #[test]
    fn test_declared_uniforms() {
        let source = r#"
            uniform sampler2D s_input;
            uniform vec4 u_params ;
            layout(binding = 1, r32f) uniform writeonly image2D u_output;
            uniform mat4 u_matrices[4];
            uniform Block { vec4 x; };
        "#;
        assert_eq!(
            declared_uniforms(source),
            vec!["s_input", "u_params", "u_output", "u_matrices"]
        );
    }

    #[test]
    fn test_failing_program() {
        let server = HeadlessGraphicsServer::new();
        server.fail_program("Broken");
        assert!(server.create_program("Broken", "", "").is_err());
        assert!(server.create_program("Fine", "", "").is_ok());
    }

    #[test]
    fn test_program_scope_brackets_dispatches() {
        let server = HeadlessGraphicsServer::new();
        let program = server
            .create_compute_program("Reduce", "uniform vec4 u_params;")
            .unwrap();
        let params = program.uniform_location("u_params").unwrap();
        {
            let scope = ProgramScope::new(&server, &*program);
            for mip in 1..3 {
                scope
                    .dispatch([1, 1, 1], &mut |binding| {
                        binding.set_vector4(&params, &Vector4::new(mip as f32, 0.0, 0.0, 0.0));
                    })
                    .unwrap();
            }
        }
        let dispatches = server.dispatches_with("Reduce");
        assert_eq!(dispatches.len(), 2);
        assert!(dispatches.iter().all(|d| d.scoped));
        assert_eq!(server.count_begin("Reduce"), 1);
        assert_eq!(
            server.commands().last(),
            Some(&Command::EndProgram("Reduce".to_owned()))
        );
    }

    #[test]
    fn test_texture_lifetime_tracking() {
        let server = HeadlessGraphicsServer::new();
        let texture = server
            .create_2d_render_target("Target", PixelKind::RGBA8, 4, 4)
            .unwrap();
        assert_eq!(server.live_textures(), 1);
        drop(texture);
        assert_eq!(server.live_textures(), 0);
        assert_eq!(server.texture_allocations(), 1);
        assert!(server
            .create_2d_render_target("Empty", PixelKind::RGBA8, 0, 4)
            .is_err());
    }

    #[test]
    fn test_blit_validation() {
        let server = HeadlessGraphicsServer::new();
        let a = server.create_2d_render_target("A", PixelKind::RGBA8, 4, 4).unwrap();
        let b = server.create_2d_render_target("B", PixelKind::RGBA8, 4, 4).unwrap();
        let c = server.create_2d_render_target("C", PixelKind::RGBA8, 8, 4).unwrap();
        assert!(server.blit(BlitRegion::base(&a), BlitRegion::base(&b)).is_ok());
        assert!(server.blit(BlitRegion::base(&a), BlitRegion::base(&c)).is_err());
    }
}
