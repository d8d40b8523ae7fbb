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

use crate::core::algebra::Vector2;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::{any::Any, cell::RefCell, rc::Rc};
use strum_macros::{AsRefStr, EnumString, VariantNames};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GpuTextureKind {
    Rectangle { width: usize, height: usize },
    Cube { width: usize, height: usize },
}

impl GpuTextureKind {
    #[inline]
    pub fn width(&self) -> usize {
        match *self {
            Self::Rectangle { width, .. } | Self::Cube { width, .. } => width,
        }
    }

    #[inline]
    pub fn height(&self) -> usize {
        match *self {
            Self::Rectangle { height, .. } | Self::Cube { height, .. } => height,
        }
    }

    #[inline]
    pub fn size(&self) -> Vector2<usize> {
        Vector2::new(self.width(), self.height())
    }

    /// Size of the given mip level, each dimension is at least one pixel.
    #[inline]
    pub fn mip_size(&self, mip: usize) -> Vector2<usize> {
        Vector2::new(mip_dimension(self.width(), mip), mip_dimension(self.height(), mip))
    }
}

/// Size of a mip level of a texture with the given base size. Never less than one pixel.
#[inline]
pub fn mip_dimension(base: usize, mip: usize) -> usize {
    base.checked_shr(mip as u32).unwrap_or(0).max(1)
}

/// Amount of mip levels in a full chain for the given size.
#[inline]
pub fn full_mip_count(width: usize, height: usize) -> usize {
    let max = width.max(height).max(1);
    (usize::BITS - max.leading_zeros()) as usize
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum PixelKind {
    R8,
    R16F,
    R32F,
    RG16F,
    RGBA8,
    SRGBA8,
    RGBA16F,
    RGBA32F,
    R11G11B10F,
    D16,
    D24S8,
    D32F,
}

impl PixelKind {
    pub fn is_depth(self) -> bool {
        matches!(self, Self::D16 | Self::D24S8 | Self::D32F)
    }

    pub fn size_in_bytes(self) -> usize {
        match self {
            Self::R8 => 1,
            Self::R16F | Self::D16 => 2,
            Self::R32F
            | Self::RG16F
            | Self::RGBA8
            | Self::SRGBA8
            | Self::R11G11B10F
            | Self::D24S8
            | Self::D32F => 4,
            Self::RGBA16F => 8,
            Self::RGBA32F => 16,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CubeMapFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeMapFace {
    pub const ALL: [CubeMapFace; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    /// Describes how a texture will be used by the pipeline.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1;
        const RENDER_TARGET = 1 << 1;
        const COMPUTE_WRITE = 1 << 2;
        const BLIT_DESTINATION = 1 << 3;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::SAMPLED
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GpuTextureDescriptor<'a> {
    pub name: &'a str,
    pub kind: GpuTextureKind,
    pub pixel_kind: PixelKind,
    pub mip_count: usize,
    pub usage: TextureUsage,
}

impl Default for GpuTextureDescriptor<'_> {
    fn default() -> Self {
        Self {
            name: "",
            kind: GpuTextureKind::Rectangle {
                width: 1,
                height: 1,
            },
            pixel_kind: PixelKind::RGBA8,
            mip_count: 1,
            usage: TextureUsage::SAMPLED,
        }
    }
}

/// A texture shared between passes and render views.
pub type SharedTexture = Rc<RefCell<dyn GpuTexture>>;

pub trait GpuTexture: Any {
    fn as_any(&self) -> &dyn Any;
    /// Unique id of the texture within its graphics server.
    fn id(&self) -> u64;
    fn name(&self) -> &str;
    fn kind(&self) -> GpuTextureKind;
    fn pixel_kind(&self) -> PixelKind;
    fn mip_count(&self) -> usize;
    fn usage(&self) -> TextureUsage;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mip_sizes() {
        assert_eq!(full_mip_count(1, 1), 1);
        assert_eq!(full_mip_count(256, 128), 9);
        assert_eq!(full_mip_count(100, 60), 7);
        assert_eq!(mip_dimension(100, 3), 12);
        assert_eq!(mip_dimension(100, 10), 1);
        assert_eq!(mip_dimension(100, 200), 1);
        let kind = GpuTextureKind::Rectangle {
            width: 64,
            height: 16,
        };
        assert_eq!(kind.mip_size(5), Vector2::new(2, 1));
    }
}
