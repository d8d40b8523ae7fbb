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
    core::{
        algebra::{Matrix4, Vector2, Vector3, Vector4},
        color::Color,
    },
    error::FrameworkError,
    gpu_texture::GpuTexture,
};
use std::{any::Any, cell::RefCell, marker::PhantomData, rc::Rc};

/// Kind of a GPU program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Vertex + fragment shader pair.
    Graphics,
    /// A single compute shader.
    Compute,
}

pub trait GpuProgram: Any {
    fn as_any(&self) -> &dyn Any;
    fn name(&self) -> &str;
    fn kind(&self) -> ProgramKind;
    /// Returns `false` if the program was not linked properly and must not be used.
    fn is_valid(&self) -> bool;
    fn uniform_location(&self, name: &str) -> Result<UniformLocation, FrameworkError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub id: usize,
    // Force compiler to not implement Send and Sync, because graphics contexts are not thread-safe.
    pub thread_mark: PhantomData<*const u8>,
}

impl UniformLocation {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            thread_mark: PhantomData,
        }
    }
}

/// How a compute shader accesses a bound image.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageAccess {
    Read,
    Write,
    ReadWrite,
}

#[derive(Clone)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector2(Vector2<f32>),
    Vector3(Vector3<f32>),
    Vector4(Vector4<f32>),
    Matrix4(Matrix4<f32>),
    Color(Color),
    Texture(Rc<RefCell<dyn GpuTexture>>),
    Image {
        texture: Rc<RefCell<dyn GpuTexture>>,
        mip: usize,
        access: ImageAccess,
    },
}

/// A set of uniform values applied to a program right before a draw call or a dispatch.
#[derive(Default)]
pub struct GpuProgramBinding {
    values: Vec<(UniformLocation, UniformValue)>,
}

impl GpuProgramBinding {
    pub fn values(&self) -> &[(UniformLocation, UniformValue)] {
        &self.values
    }

    pub fn into_values(self) -> Vec<(UniformLocation, UniformValue)> {
        self.values
    }

    #[inline]
    fn set(&mut self, location: &UniformLocation, value: UniformValue) -> &mut Self {
        if let Some(existing) = self.values.iter_mut().find(|(l, _)| l == location) {
            existing.1 = value;
        } else {
            self.values.push((location.clone(), value));
        }
        self
    }

    #[inline]
    pub fn set_bool(&mut self, location: &UniformLocation, value: bool) -> &mut Self {
        self.set(location, UniformValue::Bool(value))
    }

    #[inline]
    pub fn set_i32(&mut self, location: &UniformLocation, value: i32) -> &mut Self {
        self.set(location, UniformValue::Int(value))
    }

    #[inline]
    pub fn set_f32(&mut self, location: &UniformLocation, value: f32) -> &mut Self {
        self.set(location, UniformValue::Float(value))
    }

    #[inline]
    pub fn set_vector2(&mut self, location: &UniformLocation, value: &Vector2<f32>) -> &mut Self {
        self.set(location, UniformValue::Vector2(*value))
    }

    #[inline]
    pub fn set_vector3(&mut self, location: &UniformLocation, value: &Vector3<f32>) -> &mut Self {
        self.set(location, UniformValue::Vector3(*value))
    }

    #[inline]
    pub fn set_vector4(&mut self, location: &UniformLocation, value: &Vector4<f32>) -> &mut Self {
        self.set(location, UniformValue::Vector4(*value))
    }

    #[inline]
    pub fn set_matrix4(&mut self, location: &UniformLocation, value: &Matrix4<f32>) -> &mut Self {
        self.set(location, UniformValue::Matrix4(*value))
    }

    #[inline]
    pub fn set_srgb_color(&mut self, location: &UniformLocation, value: &Color) -> &mut Self {
        self.set(location, UniformValue::Color(*value))
    }

    #[inline]
    pub fn set_texture(
        &mut self,
        location: &UniformLocation,
        texture: &Rc<RefCell<dyn GpuTexture>>,
    ) -> &mut Self {
        self.set(location, UniformValue::Texture(texture.clone()))
    }

    #[inline]
    pub fn set_image(
        &mut self,
        location: &UniformLocation,
        texture: &Rc<RefCell<dyn GpuTexture>>,
        mip: usize,
        access: ImageAccess,
    ) -> &mut Self {
        self.set(
            location,
            UniformValue::Image {
                texture: texture.clone(),
                mip,
                access,
            },
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_binding_overwrites_same_location() {
        let location = UniformLocation::new(3);
        let mut binding = GpuProgramBinding::default();
        binding.set_f32(&location, 1.0).set_f32(&location, 2.0);
        assert_eq!(binding.values().len(), 1);
        assert!(matches!(binding.values()[0].1, UniformValue::Float(v) if v == 2.0));
    }
}
