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

//! Renderable models: a set of LOD surfaces sharing one material.

use crate::{
    core::{
        algebra::{Vector2, Vector3},
        color::Color,
        math::AxisAlignedBoundingBox,
    },
    graphics::{
        geometry_buffer::{StaticVertex, TriangleDefinition},
        gpu_program::{GpuProgram, GpuProgramBinding},
    },
};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

static SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// CPU-side mesh data. The renderer uploads it lazily and caches the GPU copy by [`Self::id`].
#[derive(Debug)]
pub struct SurfaceData {
    pub vertices: Vec<StaticVertex>,
    pub triangles: Vec<TriangleDefinition>,
    bounds: AxisAlignedBoundingBox,
    id: u64,
}

impl SurfaceData {
    pub fn new(vertices: Vec<StaticVertex>, triangles: Vec<TriangleDefinition>) -> Self {
        let mut bounds = AxisAlignedBoundingBox::default();
        for vertex in vertices.iter() {
            bounds.add_point(Vector3::from(vertex.position));
        }
        Self {
            vertices,
            triangles,
            bounds,
            id: SURFACE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Unique id of the surface, never reused.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bounds(&self) -> AxisAlignedBoundingBox {
        self.bounds
    }

    /// Unit cube centered at origin, each face has its own vertices to keep normals sharp.
    pub fn make_cube() -> Self {
        let faces = [
            (Vector3::x(), Vector3::y()),
            (-Vector3::x(), Vector3::y()),
            (Vector3::y(), Vector3::z()),
            (-Vector3::y(), Vector3::z()),
            (Vector3::z(), Vector3::y()),
            (-Vector3::z(), Vector3::y()),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut triangles = Vec::with_capacity(12);
        for (normal, up) in faces {
            let side = up.cross(&normal);
            let base = vertices.len() as u32;
            for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let position = normal * 0.5 + side * (u - 0.5) + up * (v - 0.5);
                vertices.push(StaticVertex::new(position, normal, [u, v]));
            }
            triangles.push(TriangleDefinition([base, base + 1, base + 2]));
            triangles.push(TriangleDefinition([base, base + 2, base + 3]));
        }

        Self::new(vertices, triangles)
    }

    /// Quad in XY plane covering `[-1; 1]` range, used by every full-screen pass.
    pub fn make_quad() -> Self {
        let normal = Vector3::z();
        Self::new(
            vec![
                StaticVertex::new(Vector3::new(-1.0, -1.0, 0.0), normal, [0.0, 0.0]),
                StaticVertex::new(Vector3::new(1.0, -1.0, 0.0), normal, [1.0, 0.0]),
                StaticVertex::new(Vector3::new(1.0, 1.0, 0.0), normal, [1.0, 1.0]),
                StaticVertex::new(Vector3::new(-1.0, 1.0, 0.0), normal, [0.0, 1.0]),
            ],
            vec![
                TriangleDefinition([0, 1, 2]),
                TriangleDefinition([0, 2, 3]),
            ],
        )
    }
}

/// Screen coverage range of a LOD level in percents, both ends are inclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodRange {
    pub begin: u32,
    pub end: u32,
}

impl LodRange {
    pub fn new(begin: u32, end: u32) -> Self {
        Self { begin, end }
    }

    pub fn contains(&self, percent: u32) -> bool {
        percent >= self.begin && percent <= self.end
    }
}

/// Material defines how a surface looks. Custom materials bind their own uniforms in
/// [`Material::try_submit`], every other material is rendered with the built-in PBR path using
/// the parameters returned by [`Material::pbr`].
pub trait Material: Send + Sync + Debug {
    /// Binds material-specific uniforms. Returns `false` if the material does not know how to
    /// bind itself, in this case the renderer falls back to the default path.
    fn try_submit(&self, _program: &dyn GpuProgram, _binding: &mut GpuProgramBinding) -> bool {
        false
    }

    /// Parameters for the default PBR path. `None` means default parameters.
    fn pbr(&self) -> Option<&PbrMaterial> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PbrMaterial {
    pub base_color: Color,
    pub roughness: f32,
    pub metalness: f32,
    pub emission: Color,
    pub emission_strength: f32,
    pub tiling: Vector2<f32>,
}

impl Default for PbrMaterial {
    fn default() -> Self {
        Self {
            base_color: Color::WHITE,
            roughness: 0.5,
            metalness: 0.0,
            emission: Color::BLACK,
            emission_strength: 0.0,
            tiling: Vector2::new(1.0, 1.0),
        }
    }
}

impl Material for PbrMaterial {
    fn pbr(&self) -> Option<&PbrMaterial> {
        Some(self)
    }
}

#[derive(Clone, Debug)]
pub struct Model {
    lods: Vec<Arc<SurfaceData>>,
    lod_ranges: Vec<LodRange>,
    material: Arc<dyn Material>,
    lod_transition_time: f32,
}

impl Model {
    /// Single-LOD model.
    pub fn new(surface: Arc<SurfaceData>, material: Arc<dyn Material>) -> Self {
        Self {
            lods: vec![surface],
            lod_ranges: vec![LodRange::new(0, 100)],
            material,
            lod_transition_time: 0.25,
        }
    }

    /// Multi-LOD model, `lods[i]` is used when the screen coverage falls into `ranges[i]`.
    pub fn with_lods(
        lods: Vec<Arc<SurfaceData>>,
        ranges: Vec<LodRange>,
        material: Arc<dyn Material>,
    ) -> Self {
        Self {
            lods,
            lod_ranges: ranges,
            material,
            lod_transition_time: 0.25,
        }
    }

    pub fn with_lod_transition_time(mut self, time: f32) -> Self {
        self.lod_transition_time = time;
        self
    }

    pub fn lods(&self) -> &[Arc<SurfaceData>] {
        &self.lods
    }

    pub fn lod(&self, index: usize) -> Option<&Arc<SurfaceData>> {
        self.lods.get(index)
    }

    pub fn lod_count(&self) -> usize {
        self.lods.len()
    }

    pub fn lod_ranges(&self) -> &[LodRange] {
        &self.lod_ranges
    }

    pub fn material(&self) -> &Arc<dyn Material> {
        &self.material
    }

    pub fn set_material(&mut self, material: Arc<dyn Material>) {
        self.material = material;
    }

    pub fn lod_transition_time(&self) -> f32 {
        self.lod_transition_time
    }

    /// Bounds enclosing every LOD level, in local space.
    pub fn local_bounds(&self) -> AxisAlignedBoundingBox {
        let mut bounds = AxisAlignedBoundingBox::default();
        for lod in self.lods.iter() {
            bounds.add_box(lod.bounds());
        }
        if bounds.is_valid() {
            bounds
        } else {
            AxisAlignedBoundingBox::collapsed()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cube_is_unit() {
        let cube = SurfaceData::make_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangles.len(), 12);
        assert_eq!(cube.bounds(), AxisAlignedBoundingBox::unit());
    }

    #[test]
    fn test_surface_ids_are_unique() {
        assert_ne!(SurfaceData::make_quad().id(), SurfaceData::make_quad().id());
    }

    #[test]
    fn test_lod_range_is_inclusive() {
        let range = LodRange::new(10, 20);
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(21));
    }

    #[test]
    fn test_model_bounds() {
        let model = Model::new(
            Arc::new(SurfaceData::make_cube()),
            Arc::new(PbrMaterial::default()),
        );
        assert_eq!(model.local_bounds(), AxisAlignedBoundingBox::unit());
        assert_eq!(model.lod_count(), 1);
    }
}
