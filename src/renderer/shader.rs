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

//! Shader loading. The pipeline asks for a fixed set of shader sources by name when it is
//! created, a [`ShaderSource`] resolves the names. Programs are compiled through a
//! [`LoadContext`] which is passed explicitly to every pass constructor.

use crate::graphics::{error::FrameworkError, gpu_program::GpuProgram, server::GraphicsServer};
use std::{borrow::Cow, cell::Cell};

const GLSL_VERSION: &str = "#version 330 core";
const GLSL_COMPUTE_VERSION: &str = "#version 430 core";

/// Resolves shader names to GLSL sources.
pub trait ShaderSource {
    fn load(&self, name: &str) -> Result<Cow<'static, str>, FrameworkError>;
}

macro_rules! embedded {
    ($($name:literal),* $(,)?) => {
        &[$(($name, include_str!(concat!("shaders/", $name)))),*]
    };
}

static EMBEDDED: &[(&str, &str)] = embedded![
    "screen_vs.glsl",
    "flat_vs.glsl",
    "sky_vs.glsl",
    "skybox_vs.glsl",
    "gbuffer_vs.glsl",
    "shadow_vs.glsl",
    "gbuffer_fs.glsl",
    "shadow_fs.glsl",
    "light_fs.glsl",
    "brdf_lut_fs.glsl",
    "reflection_probe_fs.glsl",
    "sky_standard_fs.glsl",
    "sky_perez_fs.glsl",
    "skybox_fs.glsl",
    "hiz_generate_cs.glsl",
    "hiz_downsample_cs.glsl",
    "prefilter_cs.glsl",
    "ssr_trace_fs.glsl",
    "ssr_blur_cs.glsl",
    "ssr_temporal_fs.glsl",
    "ssr_composite_fs.glsl",
    "assao_fs.glsl",
    "assao_blur_fs.glsl",
    "assao_apply_fs.glsl",
    "tonemap_fs.glsl",
    "fxaa_fs.glsl",
    "gbuffer_visualize_fs.glsl",
    "text_fs.glsl",
    "blit_fs.glsl",
];

/// Shaders that are compiled into the crate.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbeddedShaders;

impl EmbeddedShaders {
    pub fn names() -> impl Iterator<Item = &'static str> {
        EMBEDDED.iter().map(|(name, _)| *name)
    }
}

impl ShaderSource for EmbeddedShaders {
    fn load(&self, name: &str) -> Result<Cow<'static, str>, FrameworkError> {
        EMBEDDED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, source)| Cow::Borrowed(*source))
            .ok_or_else(|| FrameworkError::Custom(format!("There is no shader named {name}")))
    }
}

/// Prepends the version line and the defines to a shader source.
fn assemble(version: &str, defines: &[&str], source: &str) -> String {
    let mut result = String::with_capacity(source.len() + 64);
    result.push_str(version);
    result.push('\n');
    for define in defines {
        result.push_str("#define ");
        result.push_str(define);
        result.push('\n');
    }
    result.push_str(source);
    result
}

/// Everything a pass needs to create its GPU programs.
pub struct LoadContext<'a> {
    pub server: &'a dyn GraphicsServer,
    pub shaders: &'a dyn ShaderSource,
    compiled: Cell<usize>,
}

impl<'a> LoadContext<'a> {
    pub fn new(server: &'a dyn GraphicsServer, shaders: &'a dyn ShaderSource) -> Self {
        Self {
            server,
            shaders,
            compiled: Cell::new(0),
        }
    }

    /// Amount of programs compiled through this context.
    pub fn programs_compiled(&self) -> usize {
        self.compiled.get()
    }

    pub fn program(
        &self,
        name: &str,
        vertex_shader: &str,
        fragment_shader: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        self.program_with_defines(name, vertex_shader, fragment_shader, &[])
    }

    /// Compiles a variant of a program. Both shaders get the same defines.
    pub fn program_with_defines(
        &self,
        name: &str,
        vertex_shader: &str,
        fragment_shader: &str,
        defines: &[&str],
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        let vertex_source = assemble(GLSL_VERSION, defines, &self.shaders.load(vertex_shader)?);
        let fragment_source =
            assemble(GLSL_VERSION, defines, &self.shaders.load(fragment_shader)?);
        let program = self
            .server
            .create_program(name, &vertex_source, &fragment_source)?;
        self.compiled.set(self.compiled.get() + 1);
        Ok(program)
    }

    pub fn compute_program(
        &self,
        name: &str,
        compute_shader: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        let source = assemble(GLSL_COMPUTE_VERSION, &[], &self.shaders.load(compute_shader)?);
        let program = self.server.create_compute_program(name, &source)?;
        self.compiled.set(self.compiled.get() + 1);
        Ok(program)
    }

    /// Whether compute programs can be created at all.
    pub fn supports_compute(&self) -> bool {
        self.server.capabilities().compute_shaders
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graphics::headless::HeadlessGraphicsServer;

    #[test]
    fn test_every_embedded_shader_has_a_main() {
        for name in EmbeddedShaders::names() {
            let source = EmbeddedShaders.load(name).unwrap();
            assert!(source.contains("void main()"), "{name} has no entry point");
            assert!(!source.contains("#version"), "{name} must not declare a version");
        }
    }

    #[test]
    fn test_tone_map_cases_are_distinct() {
        let source = EmbeddedShaders.load("tonemap_fs.glsl").unwrap();
        let body = |index: u32| {
            let start = source.find(&format!("case {index}:")).unwrap();
            let rest = &source[start..];
            let end = rest[1..].find("case ").map_or(rest.len(), |p| p + 1);
            rest[rest.find(':').unwrap() + 1..end].trim().to_owned()
        };
        let bodies = (1..=8).map(body).collect::<Vec<_>>();
        for (i, a) in bodies.iter().enumerate() {
            for b in &bodies[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(bodies[4].contains("duiker"));
    }

    #[test]
    fn test_unknown_shader() {
        assert!(EmbeddedShaders.load("missing.glsl").is_err());
    }

    #[test]
    fn test_defines_go_after_version() {
        let source = assemble(GLSL_VERSION, &["POINT", "SHADOWS"], "void main() {}");
        let mut lines = source.lines();
        assert_eq!(lines.next(), Some(GLSL_VERSION));
        assert_eq!(lines.next(), Some("#define POINT"));
        assert_eq!(lines.next(), Some("#define SHADOWS"));
    }

    #[test]
    fn test_programs_are_counted() {
        let server = HeadlessGraphicsServer::new();
        let ctx = LoadContext::new(&server, &EmbeddedShaders);
        ctx.program("Blit", "screen_vs.glsl", "blit_fs.glsl").unwrap();
        assert_eq!(ctx.programs_compiled(), 1);
        let program = ctx.program("Blit", "screen_vs.glsl", "blit_fs.glsl").unwrap();
        assert!(program.uniform_location("s_input").is_ok());
    }
}
