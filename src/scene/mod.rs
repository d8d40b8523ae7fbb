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

//! Scene is a flat storage of entities with optional components. It is the data the renderer
//! consumes: models, lights, reflection probes, text labels and a skylight.

pub mod camera;
pub mod light;
pub mod model;
pub mod probe;
pub mod sky;
pub mod text;

use crate::{
    core::{
        algebra::{Matrix4, Vector3},
        math::{AxisAlignedBoundingBox, Matrix4Ext},
        pool::{Handle, Pool},
    },
    scene::{light::Light, model::Model, probe::ReflectionProbe, sky::Skylight, text::TextLabel},
};
use bitflags::bitflags;

bitflags! {
    /// A set of flags that defines how an entity participates in rendering.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct EntityFlags: u32 {
        /// Inactive entities are ignored by every pass.
        const ACTIVE = 1 << 0;
        /// Disabled models are not rendered, but their lights and probes still work.
        const ENABLED = 1 << 1;
        /// The entity does not move.
        const STATIC = 1 << 2;
        /// The model is rendered into shadow maps.
        const CASTS_SHADOW = 1 << 3;
        /// The model is rendered into reflection probes.
        const CASTS_REFLECTION = 1 << 4;
        /// The entity changed since the last time the flags were cleared.
        const DIRTY = 1 << 5;
    }
}

impl Default for EntityFlags {
    fn default() -> Self {
        Self::ACTIVE | Self::ENABLED | Self::CASTS_SHADOW | Self::CASTS_REFLECTION
    }
}

/// See module docs.
#[derive(Debug)]
pub struct Entity {
    name: String,
    global_transform: Matrix4<f32>,
    flags: EntityFlags,
    model: Option<Model>,
    light: Option<Light>,
    probe: Option<ReflectionProbe>,
    text: Option<TextLabel>,
    skylight: Option<Skylight>,
}

impl Entity {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn global_transform(&self) -> &Matrix4<f32> {
        &self.global_transform
    }

    pub fn global_position(&self) -> Vector3<f32> {
        self.global_transform.position()
    }

    /// World transform without scaling, lights and cameras use it to get a proper orientation.
    pub fn global_transform_without_scale(&self) -> Matrix4<f32> {
        let basis = self.global_transform.basis();
        let mut m = Matrix4::identity();
        for i in 0..3 {
            let axis = basis.column(i);
            let norm = axis.norm();
            let axis = if norm > f32::EPSILON {
                axis / norm
            } else {
                axis.into_owned()
            };
            m.fixed_view_mut::<3, 1>(0, i).copy_from(&axis);
        }
        m.fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&self.global_transform.position());
        m
    }

    /// Scale of each basis axis of the world transform.
    pub fn global_scale(&self) -> Vector3<f32> {
        let basis = self.global_transform.basis();
        Vector3::new(
            basis.column(0).norm(),
            basis.column(1).norm(),
            basis.column(2).norm(),
        )
    }

    pub fn flags(&self) -> EntityFlags {
        self.flags
    }

    #[inline]
    pub fn has_flags(&self, flags: EntityFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn is_active(&self) -> bool {
        self.flags.contains(EntityFlags::ACTIVE)
    }

    pub fn set_flags(&mut self, flags: EntityFlags, value: bool) {
        self.flags.set(flags, value);
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut Model> {
        self.model.as_mut()
    }

    pub fn light(&self) -> Option<&Light> {
        self.light.as_ref()
    }

    pub fn light_mut(&mut self) -> Option<&mut Light> {
        self.light.as_mut()
    }

    pub fn probe(&self) -> Option<&ReflectionProbe> {
        self.probe.as_ref()
    }

    pub fn probe_mut(&mut self) -> Option<&mut ReflectionProbe> {
        self.probe.as_mut()
    }

    pub fn text(&self) -> Option<&TextLabel> {
        self.text.as_ref()
    }

    pub fn skylight(&self) -> Option<&Skylight> {
        self.skylight.as_ref()
    }

    /// Bounding box of the model in world coordinates. Entities without a model have an invalid
    /// (empty) box.
    pub fn world_bounding_box(&self) -> AxisAlignedBoundingBox {
        match self.model.as_ref() {
            Some(model) => model.local_bounds().transform(&self.global_transform),
            None => AxisAlignedBoundingBox::default(),
        }
    }
}

/// Entity builder allows you to create an entity in a declarative manner.
pub struct EntityBuilder {
    name: String,
    global_transform: Matrix4<f32>,
    flags: EntityFlags,
    model: Option<Model>,
    light: Option<Light>,
    probe: Option<ReflectionProbe>,
    text: Option<TextLabel>,
    skylight: Option<Skylight>,
}

impl EntityBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            global_transform: Matrix4::identity(),
            flags: EntityFlags::default(),
            model: None,
            light: None,
            probe: None,
            text: None,
            skylight: None,
        }
    }

    pub fn with_transform(mut self, transform: Matrix4<f32>) -> Self {
        self.global_transform = transform;
        self
    }

    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.global_transform = Matrix4::new_translation(&position);
        self
    }

    pub fn with_flags(mut self, flags: EntityFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.light = Some(light);
        self
    }

    pub fn with_probe(mut self, probe: ReflectionProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_text(mut self, text: TextLabel) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_skylight(mut self, skylight: Skylight) -> Self {
        self.skylight = Some(skylight);
        self
    }

    /// Creates an entity without adding it to a scene.
    pub fn build_entity(self) -> Entity {
        Entity {
            name: self.name,
            global_transform: self.global_transform,
            flags: self.flags,
            model: self.model,
            light: self.light,
            probe: self.probe,
            text: self.text,
            skylight: self.skylight,
        }
    }

    /// Creates an entity and adds it to the scene.
    pub fn build(self, scene: &mut Scene) -> Handle<Entity> {
        scene.add_entity(self.build_entity())
    }
}

/// See module docs.
#[derive(Default, Debug)]
pub struct Scene {
    entities: Pool<Entity>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: Entity) -> Handle<Entity> {
        self.entities.spawn(entity)
    }

    pub fn remove_entity(&mut self, handle: Handle<Entity>) -> Option<Entity> {
        self.entities.free(handle)
    }

    pub fn entities(&self) -> &Pool<Entity> {
        &self.entities
    }

    pub fn try_get(&self, handle: Handle<Entity>) -> Option<&Entity> {
        self.entities.try_borrow(handle)
    }

    pub fn try_get_mut(&mut self, handle: Handle<Entity>) -> Option<&mut Entity> {
        self.entities.try_borrow_mut(handle)
    }

    /// Moves the entity and marks it dirty, so shadow maps and reflection probes that depend on
    /// it will be updated.
    pub fn set_global_transform(&mut self, handle: Handle<Entity>, transform: Matrix4<f32>) {
        if let Some(entity) = self.entities.try_borrow_mut(handle) {
            entity.global_transform = transform;
            entity.flags.insert(EntityFlags::DIRTY);
        }
    }

    /// Marks the entity dirty without moving it.
    pub fn invalidate(&mut self, handle: Handle<Entity>) {
        if let Some(entity) = self.entities.try_borrow_mut(handle) {
            entity.flags.insert(EntityFlags::DIRTY);
        }
    }

    /// Must be called once the frame is fully rendered by every camera.
    pub fn clear_dirty_flags(&mut self) {
        for entity in self.entities.iter_mut() {
            entity.flags.remove(EntityFlags::DIRTY);
        }
    }

    pub fn lights(&self) -> impl Iterator<Item = (Handle<Entity>, &Entity, &Light)> {
        self.entities
            .pair_iter()
            .filter(|(_, e)| e.is_active())
            .filter_map(|(h, e)| e.light().map(|l| (h, e, l)))
    }

    pub fn probes(&self) -> impl Iterator<Item = (Handle<Entity>, &Entity, &ReflectionProbe)> {
        self.entities
            .pair_iter()
            .filter(|(_, e)| e.is_active())
            .filter_map(|(h, e)| e.probe().map(|p| (h, e, p)))
    }

    pub fn texts(&self) -> impl Iterator<Item = (Handle<Entity>, &Entity, &TextLabel)> {
        self.entities
            .pair_iter()
            .filter(|(_, e)| e.is_active())
            .filter_map(|(h, e)| e.text().map(|t| (h, e, t)))
    }

    pub fn skylights(&self) -> impl Iterator<Item = (Handle<Entity>, &Entity, &Skylight)> {
        self.entities
            .pair_iter()
            .filter(|(_, e)| e.is_active())
            .filter_map(|(h, e)| e.skylight().map(|s| (h, e, s)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scene::light::{Light, LightKind};

    #[test]
    fn test_set_global_transform_marks_dirty() {
        let mut scene = Scene::new();
        let handle = EntityBuilder::new("Entity").build(&mut scene);
        assert!(!scene.try_get(handle).unwrap().has_flags(EntityFlags::DIRTY));

        scene.set_global_transform(handle, Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0)));
        let entity = scene.try_get(handle).unwrap();
        assert!(entity.has_flags(EntityFlags::DIRTY));
        assert_eq!(entity.global_position(), Vector3::new(1.0, 0.0, 0.0));

        scene.clear_dirty_flags();
        assert!(!scene.try_get(handle).unwrap().has_flags(EntityFlags::DIRTY));
    }

    #[test]
    fn test_inactive_lights_are_skipped() {
        let mut scene = Scene::new();
        EntityBuilder::new("Active")
            .with_light(Light::new(LightKind::directional()))
            .build(&mut scene);
        EntityBuilder::new("Inactive")
            .with_flags(EntityFlags::empty())
            .with_light(Light::new(LightKind::directional()))
            .build(&mut scene);
        assert_eq!(scene.lights().count(), 1);
    }

    #[test]
    fn test_transform_without_scale() {
        let entity = EntityBuilder::new("Scaled")
            .with_transform(
                Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0))
                    * Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 3.0, 4.0)),
            )
            .build_entity();
        assert_eq!(entity.global_scale(), Vector3::new(2.0, 3.0, 4.0));
        let m = entity.global_transform_without_scale();
        assert_eq!(m.basis(), Matrix4::<f32>::identity().basis());
        assert_eq!(m.position(), Vector3::new(1.0, 2.0, 3.0));
    }
}
