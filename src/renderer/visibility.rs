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

//! Parallel visibility gathering.

use crate::{
    core::{math::Frustum, pool::Handle},
    scene::{Entity, EntityFlags, Scene},
};
use bitflags::bitflags;
use rayon::prelude::*;

bitflags! {
    /// Additional requirements an entity must satisfy to be gathered.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct VisibilityQuery: u32 {
        /// No extra requirements.
        const NOT_SPECIFIED = 1 << 0;
        /// Only entities that changed since the dirty flags were cleared.
        const DIRTY = 1 << 1;
        /// Only static entities.
        const STATIC = 1 << 2;
        /// Only entities that cast shadows.
        const SHADOW_CASTER = 1 << 3;
        /// Only entities that are visible in reflection probes.
        const REFLECTION_CASTER = 1 << 4;
    }
}

impl Default for VisibilityQuery {
    fn default() -> Self {
        Self::NOT_SPECIFIED
    }
}

/// Handles of renderable entities in the order of their position in the scene.
pub type VisibilitySet = Vec<Handle<Entity>>;

fn satisfies(entity: &Entity, query: VisibilityQuery) -> bool {
    if !entity.has_flags(EntityFlags::ACTIVE | EntityFlags::ENABLED) {
        return false;
    }
    let requirements = [
        (VisibilityQuery::DIRTY, EntityFlags::DIRTY),
        (VisibilityQuery::STATIC, EntityFlags::STATIC),
        (VisibilityQuery::SHADOW_CASTER, EntityFlags::CASTS_SHADOW),
        (VisibilityQuery::REFLECTION_CASTER, EntityFlags::CASTS_REFLECTION),
    ];
    requirements
        .iter()
        .all(|(required, flag)| !query.contains(*required) || entity.has_flags(*flag))
}

/// Collects every renderable entity that matches the query. When `frustum` is given, entities
/// whose oriented bounds are outside of it are skipped, otherwise no spatial culling is done.
///
/// Entities are tested in parallel, the scene must not be modified meanwhile (which is
/// guaranteed by the shared borrow).
pub fn gather(scene: &Scene, frustum: Option<&Frustum>, query: VisibilityQuery) -> VisibilitySet {
    let pool = scene.entities();
    pool.records()
        .par_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let entity = record.payload()?;
            let model = entity.model()?;
            if !satisfies(entity, query) {
                return None;
            }
            if let Some(frustum) = frustum {
                if !frustum.is_intersects_obb(&model.local_bounds(), entity.global_transform()) {
                    return None;
                }
            }
            Some(pool.handle_of(index))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        core::algebra::{Isometry3, Matrix4, Point3, Vector3},
        scene::{
            model::{Model, PbrMaterial, SurfaceData},
            EntityBuilder,
        },
    };
    use std::{collections::HashSet, sync::Arc};

    fn frustum() -> Frustum {
        let view = Isometry3::look_at_rh(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(0.0, 0.0, -1.0),
            &Vector3::y(),
        )
        .to_homogeneous();
        Frustum::from_view_projection_matrix(Matrix4::new_perspective(1.0, 1.0, 0.1, 100.0) * view)
            .unwrap()
    }

    fn cube(scene: &mut Scene, position: Vector3<f32>, flags: EntityFlags) -> Handle<Entity> {
        EntityBuilder::new("Cube")
            .with_position(position)
            .with_flags(flags)
            .with_model(Model::new(
                Arc::new(SurfaceData::make_cube()),
                Arc::new(PbrMaterial::default()),
            ))
            .build(scene)
    }

    #[test]
    fn test_frustum_culling() {
        let mut scene = Scene::new();
        let inside = (0..8)
            .map(|i| cube(&mut scene, Vector3::new(0.0, 0.0, -5.0 - i as f32), Default::default()))
            .collect::<HashSet<_>>();
        for i in 0..8 {
            cube(&mut scene, Vector3::new(0.0, 0.0, 5.0 + i as f32), Default::default());
        }

        let frustum = frustum();
        let visible = gather(&scene, Some(&frustum), VisibilityQuery::NOT_SPECIFIED);
        assert_eq!(visible.iter().copied().collect::<HashSet<_>>(), inside);

        let everything = gather(&scene, None, VisibilityQuery::NOT_SPECIFIED);
        assert_eq!(everything.len(), 16);
    }

    #[test]
    fn test_nothing_in_frustum() {
        let mut scene = Scene::new();
        for i in 0..4 {
            cube(&mut scene, Vector3::new(0.0, 0.0, 10.0 + i as f32), Default::default());
        }
        assert!(gather(&scene, Some(&frustum()), VisibilityQuery::NOT_SPECIFIED).is_empty());
    }

    #[test]
    fn test_query_flags() {
        let mut scene = Scene::new();
        let defaults = EntityFlags::default();
        let static_caster = cube(&mut scene, Vector3::zeros(), defaults | EntityFlags::STATIC);
        let non_caster = cube(
            &mut scene,
            Vector3::zeros(),
            defaults - EntityFlags::CASTS_SHADOW - EntityFlags::CASTS_REFLECTION,
        );
        let disabled = cube(&mut scene, Vector3::zeros(), defaults - EntityFlags::ENABLED);
        scene.invalidate(non_caster);

        let all = gather(&scene, None, VisibilityQuery::NOT_SPECIFIED);
        assert_eq!(all, vec![static_caster, non_caster]);
        assert!(!all.contains(&disabled));

        assert_eq!(gather(&scene, None, VisibilityQuery::STATIC), vec![static_caster]);
        assert_eq!(gather(&scene, None, VisibilityQuery::SHADOW_CASTER), vec![static_caster]);
        assert_eq!(gather(&scene, None, VisibilityQuery::REFLECTION_CASTER), vec![static_caster]);
        assert_eq!(gather(&scene, None, VisibilityQuery::DIRTY), vec![non_caster]);
        assert!(gather(
            &scene,
            None,
            VisibilityQuery::DIRTY | VisibilityQuery::SHADOW_CASTER
        )
        .is_empty());
    }
}
