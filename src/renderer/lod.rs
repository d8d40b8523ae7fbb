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

//! Screen-coverage based LOD selection with smooth transitions between levels.

use crate::{
    core::{
        algebra::{Matrix4, Vector3},
        math::{screen_rect_of_points, AxisAlignedBoundingBox, Rect},
    },
    scene::model::Model,
};

/// LOD transition state of a single model as seen by a single camera.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LodState {
    current_lod: usize,
    target_lod: usize,
    time: f32,
}

impl LodState {
    /// State that starts directly at the given level, without a transition.
    pub fn snapped(lod: usize) -> Self {
        Self {
            current_lod: lod,
            target_lod: lod,
            time: 0.0,
        }
    }

    pub fn current_lod(&self) -> usize {
        self.current_lod
    }

    pub fn target_lod(&self) -> usize {
        self.target_lod
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_transitioning(&self) -> bool {
        self.current_lod != self.target_lod
    }

    /// Advances the transition. A new target is accepted only when the previous transition has
    /// finished, so the current level never jumps over intermediate targets.
    pub fn update(&mut self, selected: Option<usize>, transition_time: f32, dt: f32) {
        if let Some(selected) = selected {
            if self.target_lod == self.current_lod {
                self.target_lod = selected;
            }
        }

        if self.current_lod != self.target_lod {
            self.time += dt;
            // Summed time drifts below the exact value, so less than half a frame left is done.
            if self.time + dt * 0.5 >= transition_time {
                self.current_lod = self.target_lod;
                self.time = 0.0;
            }
        }
    }

    /// Blending parameters of the current level. The first component tells whether the level
    /// fades in, the second one is the fade direction and the third one is the opacity.
    pub fn blend_out_params(&self, transition_time: f32) -> Vector3<f32> {
        if transition_time <= 0.0 || !self.is_transitioning() {
            return Vector3::new(0.0, 0.0, 1.0);
        }
        Vector3::new(
            0.0,
            -1.0,
            (transition_time - self.time) / transition_time,
        )
    }

    /// Blending parameters of the target level, `None` if it must not be drawn.
    pub fn blend_in_params(&self, transition_time: f32) -> Option<Vector3<f32>> {
        if transition_time <= 0.0 || !self.is_transitioning() || self.time == 0.0 {
            return None;
        }
        Some(Vector3::new(1.0, 1.0, self.time / transition_time))
    }
}

/// Height of the projected bounds relative to the viewport height, in `[0; 100]` percents.
pub fn screen_coverage(
    local_bounds: &AxisAlignedBoundingBox,
    world: &Matrix4<f32>,
    view_projection: &Matrix4<f32>,
    viewport: Rect<i32>,
) -> f32 {
    if viewport.h() <= 0 {
        return 0.0;
    }
    match screen_rect_of_points(&local_bounds.oriented_corners(world), view_projection, viewport)
    {
        Some(rect) => (rect.h() as f32 / viewport.h() as f32 * 100.0).clamp(0.0, 100.0),
        None => 0.0,
    }
}

/// Index of the last LOD whose range contains the coverage.
pub fn select_lod(model: &Model, percent: f32) -> Option<usize> {
    let percent = percent as u32;
    let last = model.lod_count().checked_sub(1)?;
    model
        .lod_ranges()
        .iter()
        .rposition(|range| range.contains(percent))
        .map(|index| index.min(last))
}

/// Updates the LOD state of a model. `state` is `None` when the camera sees the model for the
/// first time, in this case the selected level is used immediately. Returns `false` if the
/// model must not be drawn this frame.
pub fn update_lod_data(
    model: &Model,
    state: Option<&mut LodState>,
    world: &Matrix4<f32>,
    view_projection: &Matrix4<f32>,
    viewport: Rect<i32>,
    dt: f32,
) -> (bool, LodState) {
    let lod_count = model.lod_count();
    if lod_count == 0 {
        return (false, LodState::default());
    }
    if lod_count == 1 {
        return (true, LodState::default());
    }

    let percent = screen_coverage(&model.local_bounds(), world, view_projection, viewport);
    let selected = select_lod(model, percent);

    let new_state = match state {
        Some(state) => {
            state.update(selected, model.lod_transition_time(), dt);
            *state
        }
        None => LodState::snapped(selected.unwrap_or_default()),
    };

    (percent >= 1.0, new_state)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        core::algebra::{Isometry3, Point3},
        scene::model::{LodRange, PbrMaterial, SurfaceData},
    };
    use std::sync::Arc;

    fn model(transition_time: f32) -> Model {
        let surface = Arc::new(SurfaceData::make_cube());
        Model::with_lods(
            vec![surface.clone(), surface.clone(), surface],
            vec![
                LodRange::new(50, 100),
                LodRange::new(10, 49),
                LodRange::new(0, 9),
            ],
            Arc::new(PbrMaterial::default()),
        )
        .with_lod_transition_time(transition_time)
    }

    #[test]
    fn test_lod_converges_without_overshoot() {
        let mut state = LodState::snapped(0);
        // Exactly representable values, so the amount of frames is exact.
        let (dt, transition_time) = (0.25, 1.0);
        let frames = (transition_time / dt) as usize;
        for frame in 1..=frames {
            state.update(Some(2), transition_time, dt);
            assert_eq!(state.target_lod(), 2);
            if frame < frames {
                assert_eq!(state.current_lod(), 0);
                assert!(state.is_transitioning());
            }
        }
        assert_eq!(state.current_lod(), 2);
        assert_eq!(state.time(), 0.0);

        state.update(Some(2), transition_time, dt);
        assert_eq!(state.current_lod(), 2);
        assert!(!state.is_transitioning());
    }

    #[test]
    fn test_lod_converges_in_bounded_frames_with_inexact_dt() {
        for (transition_time, dt) in [(1.0f32, 1.0f32 / 60.0), (10.0, 1.0 / 144.0), (0.3, 0.1)] {
            let bound = (transition_time as f64 / dt as f64).round() as usize;
            let mut state = LodState::snapped(0);
            let mut frames = 0;
            while state.current_lod() != 1 {
                state.update(Some(1), transition_time, dt);
                frames += 1;
                assert!(frames <= bound, "{transition_time} / {dt}: {frames} > {bound}");
            }
            assert_eq!(frames, bound);
            assert_eq!(state.target_lod(), 1);
        }
    }

    #[test]
    fn test_target_is_locked_during_transition() {
        let mut state = LodState::snapped(0);
        state.update(Some(1), 1.0, 0.25);
        state.update(Some(2), 1.0, 0.25);
        assert_eq!(state.target_lod(), 1);
    }

    #[test]
    fn test_blend_params() {
        let mut state = LodState::snapped(0);
        assert_eq!(state.blend_in_params(1.0), None);
        assert_eq!(state.blend_out_params(1.0), Vector3::new(0.0, 0.0, 1.0));

        state.update(Some(1), 1.0, 0.25);
        assert_eq!(state.blend_out_params(1.0), Vector3::new(0.0, -1.0, 0.75));
        assert_eq!(state.blend_in_params(1.0), Some(Vector3::new(1.0, 1.0, 0.25)));
        assert_eq!(state.blend_in_params(0.0), None);
    }

    #[test]
    fn test_select_lod_last_match_wins() {
        let mut model = model(1.0);
        assert_eq!(select_lod(&model, 75.0), Some(0));
        assert_eq!(select_lod(&model, 49.5), Some(1));
        assert_eq!(select_lod(&model, 3.0), Some(2));

        model = Model::with_lods(
            model.lods().to_vec(),
            vec![LodRange::new(0, 100), LodRange::new(0, 100), LodRange::new(0, 100)],
            Arc::new(PbrMaterial::default()),
        );
        assert_eq!(select_lod(&model, 50.0), Some(2));
    }

    #[test]
    fn test_first_sight_snaps_and_tiny_models_are_culled() {
        let model = model(1.0);
        let view = Isometry3::look_at_rh(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(0.0, 0.0, -1.0),
            &Vector3::y(),
        )
        .to_homogeneous();
        let projection = Matrix4::new_perspective(1.0, 1.0, 0.1, 1000.0);
        let view_projection = projection * view;
        let viewport = Rect::new(0, 0, 1000, 1000);

        let near = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -1.5));
        let (visible, state) =
            update_lod_data(&model, None, &near, &view_projection, viewport, 0.1);
        assert!(visible);
        assert_eq!(state.current_lod(), 0);
        assert!(!state.is_transitioning());

        let far = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -900.0));
        let (visible, state) = update_lod_data(&model, None, &far, &view_projection, viewport, 0.1);
        assert!(!visible);
        assert_eq!(state.current_lod(), 2);
    }
}
