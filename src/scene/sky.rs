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

//! Sky sources for the atmospherics pass.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString, VariantNames};

/// Sky model used by a [`Skylight`].
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
pub enum SkyMode {
    /// Analytic Preetham sky.
    Perez,
    /// Scattering-based sky with a turbidity interpolation table.
    #[default]
    Standard,
    /// Pre-made cube map, see `DeferredPipeline::set_skybox`.
    Skybox,
}

/// A skylight defines the sky of the scene. The sun shines along the local Z axis of the entity.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Skylight {
    pub mode: SkyMode,
    /// Haziness of the atmosphere, `[1.9; 10]` range is meaningful.
    pub turbidity: f32,
}

impl Default for Skylight {
    fn default() -> Self {
        Self {
            mode: SkyMode::Standard,
            turbidity: 2.0,
        }
    }
}

impl Skylight {
    pub fn new(mode: SkyMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_turbidity(mut self, turbidity: f32) -> Self {
        self.turbidity = turbidity;
        self
    }
}
