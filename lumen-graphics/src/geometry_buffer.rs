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

use crate::{core::algebra::Vector3, error::FrameworkError, ElementRange};
use bytemuck::{Pod, Zeroable};
use std::any::Any;

/// Standard vertex layout used by every mesh of the renderer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct StaticVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl StaticVertex {
    pub fn new(position: Vector3<f32>, normal: Vector3<f32>, tex_coord: [f32; 2]) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
            tex_coord,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct TriangleDefinition(pub [u32; 3]);

pub struct GeometryBufferDescriptor<'a> {
    pub name: &'a str,
    pub vertices: &'a [StaticVertex],
    pub triangles: &'a [TriangleDefinition],
}

impl GeometryBufferDescriptor<'_> {
    /// Checks that every triangle references existing vertices.
    pub fn validate(&self) -> Result<(), FrameworkError> {
        let vertex_count = self.vertices.len() as u32;
        for triangle in self.triangles {
            if triangle.0.iter().any(|&i| i >= vertex_count) {
                return Err(FrameworkError::Custom(format!(
                    "Geometry buffer {} has a triangle {:?} that references a vertex \
                    out of bounds. Vertex count is {vertex_count}",
                    self.name, triangle.0
                )));
            }
        }
        Ok(())
    }

    /// Raw bytes of the vertex data, ready for uploading.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.vertices)
    }
}

pub trait GeometryBuffer: Any {
    fn as_any(&self) -> &dyn Any;
    fn id(&self) -> u64;
    fn name(&self) -> &str;
    fn triangle_count(&self) -> usize;

    /// Returns amount of triangles that will be drawn for the given range.
    fn triangles_in_range(&self, range: ElementRange) -> Result<usize, FrameworkError> {
        match range {
            ElementRange::Full => Ok(self.triangle_count()),
            ElementRange::Specific { offset, count } => {
                let end = offset + count;
                if end > self.triangle_count() {
                    Err(FrameworkError::InvalidElementRange {
                        start: offset,
                        end,
                        total: self.triangle_count(),
                    })
                } else {
                    Ok(count)
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_descriptor_validation() {
        let vertices = [StaticVertex::default(); 3];
        let good = [TriangleDefinition([0, 1, 2])];
        let bad = [TriangleDefinition([0, 1, 3])];
        let desc = GeometryBufferDescriptor {
            name: "Test",
            vertices: &vertices,
            triangles: &good,
        };
        assert!(desc.validate().is_ok());
        assert_eq!(desc.vertex_bytes().len(), 3 * 32);
        let desc = GeometryBufferDescriptor {
            name: "Test",
            vertices: &vertices,
            triangles: &bad,
        };
        assert!(desc.validate().is_err());
    }
}
