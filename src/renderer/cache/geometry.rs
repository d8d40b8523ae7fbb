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

//! GPU copies of surfaces, keyed by the unique id of a surface.

use crate::{
    graphics::{
        error::FrameworkError,
        geometry_buffer::{GeometryBuffer, GeometryBufferDescriptor},
        server::GraphicsServer,
    },
    renderer::cache::{CacheEntry, DEFAULT_RESOURCE_LIFETIME},
    scene::model::SurfaceData,
};
use fxhash::FxHashMap;
use std::collections::hash_map::Entry;

#[derive(Default)]
pub struct GeometryCache {
    buffer: FxHashMap<u64, CacheEntry<Box<dyn GeometryBuffer>>>,
}

impl GeometryCache {
    /// Returns the GPU copy of the surface, uploading it on first request.
    pub fn get<'a>(
        &'a mut self,
        server: &dyn GraphicsServer,
        data: &SurfaceData,
    ) -> Result<&'a dyn GeometryBuffer, FrameworkError> {
        let entry = match self.buffer.entry(data.id()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let name = format!("Surface{}", data.id());
                let geometry_buffer = server.create_geometry_buffer(GeometryBufferDescriptor {
                    name: &name,
                    vertices: &data.vertices,
                    triangles: &data.triangles,
                })?;
                entry.insert(CacheEntry {
                    value: geometry_buffer,
                    time_to_live: DEFAULT_RESOURCE_LIFETIME,
                })
            }
        };
        entry.time_to_live = DEFAULT_RESOURCE_LIFETIME;
        Ok(&*entry.value)
    }

    /// Ages every entry and destroys the ones that were not requested for a while.
    pub fn update(&mut self, dt: f32) {
        self.buffer.retain(|_, entry| {
            entry.time_to_live -= dt;
            entry.time_to_live > 0.0
        });
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graphics::headless::HeadlessGraphicsServer;

    #[test]
    fn test_surface_is_uploaded_once() {
        let server = HeadlessGraphicsServer::new();
        let mut cache = GeometryCache::default();
        let cube = SurfaceData::make_cube();
        let first = cache.get(&server, &cube).unwrap().id();
        let second = cache.get(&server, &cube).unwrap().id();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unused_entries_expire() {
        let server = HeadlessGraphicsServer::new();
        let mut cache = GeometryCache::default();
        cache.get(&server, &SurfaceData::make_quad()).unwrap();
        cache.update(DEFAULT_RESOURCE_LIFETIME * 0.5);
        assert_eq!(cache.len(), 1);
        cache.update(DEFAULT_RESOURCE_LIFETIME);
        assert!(cache.is_empty());
    }
}
