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

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum FrameworkError {
    ShaderCompilationFailed {
        shader_name: String,
        error_message: String,
    },
    ShaderLinkingFailed {
        shader_name: String,
        error_message: String,
    },
    /// Means that the program does not declare the uniform with the given name.
    UnableToFindShaderUniform(String),
    FailedToConstructFBO(String),
    InvalidTextureData {
        expected_data_size: usize,
        actual_data_size: usize,
    },
    /// A texture was created or used with a zero size.
    InvalidTextureSize {
        width: usize,
        height: usize,
    },
    InvalidElementRange {
        start: usize,
        end: usize,
        total: usize,
    },
    /// Compute shaders are not supported by the current backend.
    ComputeNotSupported,
    Custom(String),
}

impl Display for FrameworkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameworkError::ShaderCompilationFailed {
                shader_name,
                error_message,
            } => write!(
                f,
                "Compilation of \"{shader_name}\" shader has failed: {error_message}",
            ),
            FrameworkError::ShaderLinkingFailed {
                shader_name,
                error_message,
            } => write!(
                f,
                "Linking shader \"{shader_name}\" failed: {error_message}",
            ),
            FrameworkError::UnableToFindShaderUniform(v) => {
                write!(f, "Unable to find shader uniform {v}")
            }
            FrameworkError::FailedToConstructFBO(v) => {
                write!(f, "Failed to construct frame buffer object: {v}")
            }
            FrameworkError::InvalidTextureData {
                expected_data_size,
                actual_data_size,
            } => write!(
                f,
                "Invalid texture data. Expected {expected_data_size} bytes, got {actual_data_size}",
            ),
            FrameworkError::InvalidTextureSize { width, height } => {
                write!(f, "Invalid texture size {width}x{height}")
            }
            FrameworkError::InvalidElementRange { start, end, total } => write!(
                f,
                "Invalid element range {start}..{end}, the buffer has {total} elements"
            ),
            FrameworkError::ComputeNotSupported => {
                write!(f, "Compute shaders are not supported")
            }
            FrameworkError::Custom(v) => write!(f, "Custom error: {v}"),
        }
    }
}

impl std::error::Error for FrameworkError {}
