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

//! World-space text labels, drawn by the overlay pass on top of the final image.

use crate::core::{color::Color, math::AxisAlignedBoundingBox};

#[derive(Clone, Debug, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub color: Color,
    /// Area of the label in local space of the entity.
    pub bounds: AxisAlignedBoundingBox,
}

impl TextLabel {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            color: Color::WHITE,
            bounds: AxisAlignedBoundingBox::unit(),
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_bounds(mut self, bounds: AxisAlignedBoundingBox) -> Self {
        self.bounds = bounds;
        self
    }
}
