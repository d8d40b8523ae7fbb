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

//! Core data structures and algorithms shared by every Lumen crate.

#![warn(missing_docs)]

pub use fxhash;
pub use nalgebra as algebra;
pub use num_traits;
pub use parking_lot;

pub mod color;
pub mod log;
pub mod math;
pub mod pool;

/// Returns the value clamped into the `[min, max]` range. Unlike [`f32::clamp`] it does not panic
/// when `min > max`, the lower bound wins in this case.
#[inline]
pub fn clampf(value: f32, min: f32, max: f32) -> f32 {
    if value < min {
        min
    } else if value > max {
        max.max(min)
    } else {
        value
    }
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerpf(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clampf() {
        assert_eq!(clampf(-1.0, 0.0, 100.0), 0.0);
        assert_eq!(clampf(150.0, 0.0, 100.0), 100.0);
        assert_eq!(clampf(42.0, 0.0, 100.0), 42.0);
        assert_eq!(clampf(5.0, 10.0, 1.0), 10.0);
    }

    #[test]
    fn test_lerpf() {
        assert_eq!(lerpf(0.0, 10.0, 0.5), 5.0);
        assert_eq!(lerpf(1.9, 10.0, 0.0), 1.9);
    }
}
