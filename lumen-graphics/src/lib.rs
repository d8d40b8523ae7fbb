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

//! Graphics API abstraction used by the renderer. The crate defines the set of traits a backend
//! must implement (see [`server::GraphicsServer`]) and a headless backend that records every
//! submitted command, which is used for testing and for running the renderer without a window.

pub use lumen_core as core;

use crate::core::math::Rect;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString, VariantNames};

pub mod error;
pub mod framebuffer;
pub mod geometry_buffer;
pub mod gpu_program;
pub mod gpu_texture;
pub mod headless;
pub mod server;
pub mod stats;

#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Eq,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Debug,
    Default,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum CompareFunc {
    /// Never passes.
    Never,

    /// Passes if the incoming value is less than the stored value.
    Less,

    /// Passes if the incoming value is equal to the stored value.
    Equal,

    /// Passes if the incoming value is less than or equal to the stored value.
    #[default]
    LessOrEqual,

    /// Passes if the incoming value is greater than the stored value.
    Greater,

    /// Passes if the incoming value is not equal to the stored value.
    NotEqual,

    /// Passes if the incoming value is greater than or equal to the stored value.
    GreaterOrEqual,

    /// Always passes.
    Always,
}

#[derive(
    Copy,
    Clone,
    Hash,
    PartialOrd,
    PartialEq,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Debug,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(
    Copy,
    Clone,
    Hash,
    PartialOrd,
    PartialEq,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Debug,
    Default,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum BlendMode {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Copy, Clone, Default, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct BlendEquation {
    pub rgb: BlendMode,
    pub alpha: BlendMode,
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct BlendFunc {
    pub sfactor: BlendFactor,
    pub dfactor: BlendFactor,
    pub alpha_sfactor: BlendFactor,
    pub alpha_dfactor: BlendFactor,
}

impl BlendFunc {
    pub fn new(sfactor: BlendFactor, dfactor: BlendFactor) -> Self {
        Self {
            sfactor,
            dfactor,
            alpha_sfactor: sfactor,
            alpha_dfactor: dfactor,
        }
    }

    pub fn new_separate(
        sfactor: BlendFactor,
        dfactor: BlendFactor,
        alpha_sfactor: BlendFactor,
        alpha_dfactor: BlendFactor,
    ) -> Self {
        Self {
            sfactor,
            dfactor,
            alpha_sfactor,
            alpha_dfactor,
        }
    }
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self {
            sfactor: BlendFactor::One,
            dfactor: BlendFactor::Zero,
            alpha_sfactor: BlendFactor::One,
            alpha_dfactor: BlendFactor::Zero,
        }
    }
}

#[derive(Copy, Clone, Default, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct BlendParameters {
    pub func: BlendFunc,
    pub equation: BlendEquation,
}

impl BlendParameters {
    /// `src + dst`, used to accumulate light contributions.
    pub fn additive() -> Self {
        Self {
            func: BlendFunc::new(BlendFactor::One, BlendFactor::One),
            equation: Default::default(),
        }
    }

    /// Classic `src * a + dst * (1 - a)` blending.
    pub fn alpha() -> Self {
        Self {
            func: BlendFunc::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
            equation: Default::default(),
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct ColorMask {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub alpha: bool,
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::all(true)
    }
}

impl ColorMask {
    pub fn all(value: bool) -> Self {
        Self {
            red: value,
            green: value,
            blue: value,
            alpha: value,
        }
    }
}

#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Hash,
    Debug,
    Deserialize,
    Serialize,
    Eq,
    Default,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum CullFace {
    #[default]
    Back,
    Front,
}

/// A set of pipeline state values that are applied before a draw call.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawParameters {
    pub cull_face: Option<CullFace>,
    pub color_write: ColorMask,
    pub depth_write: bool,
    pub depth_test: Option<CompareFunc>,
    pub blend: Option<BlendParameters>,
    pub scissor_box: Option<Rect<i32>>,
}

impl Default for DrawParameters {
    fn default() -> Self {
        Self {
            cull_face: Some(CullFace::Back),
            color_write: Default::default(),
            depth_write: true,
            depth_test: Some(CompareFunc::Less),
            blend: None,
            scissor_box: None,
        }
    }
}

impl DrawParameters {
    /// State for a full-screen pass: no culling, no depth test and no depth writes.
    pub fn screen_pass() -> Self {
        Self {
            cull_face: None,
            color_write: Default::default(),
            depth_write: false,
            depth_test: None,
            blend: None,
            scissor_box: None,
        }
    }

    pub fn with_blend(mut self, blend: BlendParameters) -> Self {
        self.blend = Some(blend);
        self
    }

    pub fn with_scissor(mut self, scissor: Rect<i32>) -> Self {
        self.scissor_box = Some(scissor);
        self
    }

    pub fn with_depth_test(mut self, func: CompareFunc) -> Self {
        self.depth_test = Some(func);
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ElementRange {
    #[default]
    Full,
    Specific {
        offset: usize,
        count: usize,
    },
}
