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

//! Per-pass settings. Every pass of the pipeline is configured by an optional value in
//! [`RunParams`], a missing value disables the pass.

use crate::renderer::visibility::VisibilityQuery;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};
use strum_macros::{AsRefStr, EnumString, VariantNames};

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Ron(ron::Error),
    Parse(ron::error::SpannedError),
}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ron::Error> for SettingsError {
    fn from(e: ron::Error) -> Self {
        Self::Ron(e)
    }
}

impl From<ron::error::SpannedError> for SettingsError {
    fn from(e: ron::error::SpannedError) -> Self {
        Self::Parse(e)
    }
}

/// Tone curve used to map HDR colors to the displayable range. The discriminant is passed to
/// the shader as is.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
#[repr(u32)]
pub enum ToneMapMethod {
    /// Passthrough, only the exposure is applied.
    None = 0,
    Exponential = 1,
    Reinhard = 2,
    ReinhardLum = 3,
    Hable = 4,
    Duiker = 5,
    #[default]
    Aces = 6,
    AcesLum = 7,
    Filmic = 8,
}

impl ToneMapMethod {
    pub fn shader_index(self) -> f32 {
        self as u32 as f32
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToneMapSettings {
    pub exposure: f32,
    pub method: ToneMapMethod,
}

impl Default for ToneMapSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            method: ToneMapMethod::Aces,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FxaaSettings {
    /// Minimum local contrast required to apply the filter.
    pub edge_threshold: f32,
    /// Contrast below this value is ignored in dark areas.
    pub edge_threshold_min: f32,
    /// Amount of sub-pixel aliasing removal.
    pub subpixel_quality: f32,
}

impl Default for FxaaSettings {
    fn default() -> Self {
        Self {
            edge_threshold: 0.125,
            edge_threshold_min: 0.0312,
            subpixel_quality: 0.75,
        }
    }
}

/// Adaptive screen-space ambient occlusion.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssaoSettings {
    /// World-space radius of the occlusion sampling.
    pub radius: f32,
    pub shadow_multiplier: f32,
    pub shadow_power: f32,
    /// Upper limit of the occlusion amount.
    pub shadow_clamp: f32,
    /// Limits self-shadowing on low-tessellated surfaces.
    pub horizon_angle_threshold: f32,
    /// Distance at which occlusion starts to fade out.
    pub fade_out_from: f32,
    /// Distance at which occlusion disappears.
    pub fade_out_to: f32,
    /// `[0; 3]`, the higher the better.
    pub quality_level: u32,
    /// Used by the adaptive quality level only.
    pub adaptive_quality_limit: f32,
    pub blur_pass_count: u32,
    /// Edge preservation of the blur, `1.0` keeps edges completely sharp.
    pub sharpness: f32,
    pub temporal_supersampling_angle_offset: f32,
    pub temporal_supersampling_radius_offset: f32,
    pub detail_shadow_strength: f32,
    /// Reconstruct normals from depth instead of using the G-buffer.
    pub generate_normals: bool,
}

impl Default for AssaoSettings {
    fn default() -> Self {
        Self {
            radius: 1.2,
            shadow_multiplier: 1.0,
            shadow_power: 1.0,
            shadow_clamp: 0.98,
            horizon_angle_threshold: 0.06,
            fade_out_from: 50.0,
            fade_out_to: 200.0,
            quality_level: 3,
            adaptive_quality_limit: 0.45,
            blur_pass_count: 2,
            sharpness: 0.98,
            temporal_supersampling_angle_offset: 0.0,
            temporal_supersampling_radius_offset: 1.0,
            detail_shadow_strength: 0.5,
            generate_normals: false,
        }
    }
}

/// Glossy reflections by sampling a blurred mip chain of the previous frame.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConeTracingSettings {
    pub enabled: bool,
    pub angle_bias: f32,
    /// Last mip level of the blurred color chain.
    pub max_mip: u32,
    /// Gaussian sigma of the first mip, grows with each next mip.
    pub blur_base_sigma: f32,
    pub roughness_multiplier: f32,
}

impl Default for ConeTracingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            angle_bias: 0.05,
            max_mip: 6,
            blur_base_sigma: 1.0,
            roughness_multiplier: 2.0,
        }
    }
}

/// Temporal accumulation of reflections.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalSettings {
    pub enabled: bool,
    /// Weight of the history.
    pub strength: f32,
    /// History is rejected when the reprojected depth differs more than this.
    pub depth_threshold: f32,
    pub roughness_sensitivity: f32,
    /// Motion in pixels at which history is fully rejected.
    pub motion_scale: f32,
    pub normal_dot_threshold: f32,
    pub max_accumulation_frames: u32,
}

impl Default for TemporalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: 0.9,
            depth_threshold: 0.01,
            roughness_sensitivity: 0.3,
            motion_scale: 120.0,
            normal_dot_threshold: 0.95,
            max_accumulation_frames: 8,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SsrSettings {
    pub max_steps: u32,
    pub max_rays: u32,
    pub depth_tolerance: f32,
    pub brightness: f32,
    pub facing_reflections_fading: f32,
    pub roughness_depth_tolerance: f32,
    /// Screen edge fade start, in normalized screen units.
    pub screen_edge_fade_start: f32,
    pub screen_edge_fade_end: f32,
    /// Trace at half of the G-buffer resolution.
    pub half_resolution: bool,
    pub cone_tracing: ConeTracingSettings,
    pub temporal: TemporalSettings,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            max_steps: 64,
            max_rays: 8,
            depth_tolerance: 0.1,
            brightness: 1.0,
            facing_reflections_fading: 0.1,
            roughness_depth_tolerance: 1.0,
            screen_edge_fade_start: 0.1,
            screen_edge_fade_end: 0.2,
            half_resolution: false,
            cone_tracing: Default::default(),
            temporal: Default::default(),
        }
    }
}

/// Configuration of a single pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    /// Extra requirements for rendered entities.
    #[serde(skip)]
    pub visibility: VisibilityQuery,
    pub assao: Option<AssaoSettings>,
    /// Tonemapping. Its presence also switches lighting buffers to a floating point format.
    pub hdr: Option<ToneMapSettings>,
    pub fxaa: Option<FxaaSettings>,
    pub ssr: Option<SsrSettings>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self::high()
    }
}

impl RunParams {
    pub fn high() -> Self {
        Self {
            visibility: VisibilityQuery::NOT_SPECIFIED,
            assao: Some(Default::default()),
            hdr: Some(Default::default()),
            fxaa: Some(Default::default()),
            ssr: Some(Default::default()),
        }
    }

    pub fn low() -> Self {
        Self {
            visibility: VisibilityQuery::NOT_SPECIFIED,
            assao: None,
            hdr: Some(Default::default()),
            fxaa: None,
            ssr: None,
        }
    }

    /// Settings for capturing reflection probes: only reflection casters are rendered and the
    /// result stays in linear space.
    pub fn probe() -> Self {
        Self {
            visibility: VisibilityQuery::REFLECTION_CASTER,
            assao: None,
            hdr: Some(ToneMapSettings {
                exposure: 1.0,
                method: ToneMapMethod::None,
            }),
            fxaa: None,
            ssr: None,
        }
    }

    pub fn is_hdr(&self) -> bool {
        self.hdr.is_some()
    }

    pub fn from_ron(source: &str) -> Result<Self, SettingsError> {
        Ok(ron::de::from_str(source)?)
    }

    pub fn to_ron(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(self, PrettyConfig::default())?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let file = File::open(path)?;
        Ok(ron::de::from_reader(file)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let file = File::create(path)?;
        ron::ser::to_writer_pretty(file, self, PrettyConfig::default())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_presets() {
        let high = RunParams::high();
        assert!(high.assao.is_some() && high.fxaa.is_some() && high.ssr.is_some());

        let probe = RunParams::probe();
        assert_eq!(probe.hdr.map(|h| h.method), Some(ToneMapMethod::None));
        assert_eq!(probe.visibility, VisibilityQuery::REFLECTION_CASTER);
        assert!(probe.ssr.is_none());
    }

    #[test]
    fn test_tone_map_indices() {
        assert_eq!(ToneMapMethod::None.shader_index(), 0.0);
        assert_eq!(ToneMapMethod::Filmic.shader_index(), 8.0);
        assert_eq!(ToneMapSettings::default().method, ToneMapMethod::Aces);
    }

    #[test]
    fn test_ssr_defaults() {
        let ssr = SsrSettings::default();
        assert_eq!(ssr.max_steps, 64);
        assert!(!ssr.cone_tracing.enabled);
        assert!(ssr.temporal.enabled);
        assert_eq!(ssr.temporal.max_accumulation_frames, 8);
    }

    #[test]
    fn test_ron_preserves_settings_but_not_visibility() {
        let mut params = RunParams::probe();
        params.ssr = Some(SsrSettings {
            half_resolution: true,
            ..Default::default()
        });
        let text = params.to_ron().unwrap();
        let loaded = RunParams::from_ron(&text).unwrap();
        assert_eq!(loaded.ssr, params.ssr);
        assert_eq!(loaded.hdr, params.hdr);
        assert_eq!(loaded.visibility, VisibilityQuery::NOT_SPECIFIED);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("lumen_run_params_test.ron");
        RunParams::low().save(&path).unwrap();
        let loaded = RunParams::load(&path).unwrap();
        assert_eq!(loaded, RunParams::low());
        let _ = std::fs::remove_file(path);
    }
}
