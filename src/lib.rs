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

//! Lumen is a deferred real-time renderer. It takes a [`scene::Scene`], a [`scene::camera::Camera`]
//! and a [`renderer::view::RenderView`] and produces a final image by running an ordered chain of
//! GPU passes: geometry, ambient occlusion, lighting, reflections, atmospherics, screen-space
//! reflections, tonemapping, anti-aliasing and overlays.
//!
//! The renderer talks to the GPU through the [`graphics::server::GraphicsServer`] trait, so it
//! can run on any backend, including the headless one that records submitted commands.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod renderer;
pub mod scene;

pub use lumen_core as core;
pub use lumen_graphics as graphics;
