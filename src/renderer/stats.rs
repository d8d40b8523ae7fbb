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

//! Per-frame statistics of the pipeline.

use crate::graphics::stats::RenderPassStatistics;
use std::{
    fmt::{Display, Formatter},
    ops::AddAssign,
};

/// Lighting statistics for a frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LightingStatistics {
    /// How many point lights were rendered.
    pub point_lights_rendered: usize,
    /// How many spot lights were rendered.
    pub spot_lights_rendered: usize,
    /// How many directional lights were rendered.
    pub directional_lights_rendered: usize,
    /// How many shadow maps were regenerated.
    pub shadow_maps_rendered: usize,
}

impl AddAssign for LightingStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.point_lights_rendered += rhs.point_lights_rendered;
        self.spot_lights_rendered += rhs.spot_lights_rendered;
        self.directional_lights_rendered += rhs.directional_lights_rendered;
        self.shadow_maps_rendered += rhs.shadow_maps_rendered;
    }
}

impl Display for LightingStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Lighting Statistics:\n\
            \tPoint Lights: {}\n\
            \tSpot Lights: {}\n\
            \tDirectional Lights: {}\n\
            \tShadow Maps: {}\n",
            self.point_lights_rendered,
            self.spot_lights_rendered,
            self.directional_lights_rendered,
            self.shadow_maps_rendered
        )
    }
}

/// Statistics of the last pipeline run, including the nested probe captures.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStatistics {
    /// G-buffer and shadow map draws.
    pub geometry: RenderPassStatistics,
    /// Light volumes, reflection probes and sky.
    pub lighting: RenderPassStatistics,
    /// Everything rendered while capturing reflection probes.
    pub probes: RenderPassStatistics,
    /// Screen-space effects and post-processing.
    pub post: RenderPassStatistics,
    pub lights: LightingStatistics,
    /// Amount of cube map faces captured by reflection probes.
    pub probe_faces_captured: usize,
    /// Amount of probes composited into the reflection buffer.
    pub probes_composited: usize,
    /// How many times SSR composited a raw trace because there was no valid history.
    pub ssr_history_fallbacks: usize,
}

impl AddAssign for FrameStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.geometry += rhs.geometry;
        self.lighting += rhs.lighting;
        self.probes += rhs.probes;
        self.post += rhs.post;
        self.lights += rhs.lights;
        self.probe_faces_captured += rhs.probe_faces_captured;
        self.probes_composited += rhs.probes_composited;
        self.ssr_history_fallbacks += rhs.ssr_history_fallbacks;
    }
}

impl Display for FrameStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Geometry:\n{}\n\
            Lighting:\n{}\n\
            Probes:\n{}\n\
            Post:\n{}\n\
            {}\
            Probe Faces: {}\n\
            Probes Composited: {}\n\
            SSR History Fallbacks: {}\n",
            self.geometry,
            self.lighting,
            self.probes,
            self.post,
            self.lights,
            self.probe_faces_captured,
            self.probes_composited,
            self.ssr_history_fallbacks
        )
    }
}
