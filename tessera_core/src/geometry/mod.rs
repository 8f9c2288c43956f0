// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value types describing how a render task is decomposed.
//!
//! Every type here is `Copy` and carries an `apply` operator that composes a
//! child restriction inside an already-restricted parent. Composition is how
//! compounds inherit their effective region:
//!
//! ```text
//!   parent range  [0.5, 1.0)
//!   child range   [0.0, 0.5)   ──apply──►   [0.5, 0.75)
//! ```
//!
//! - [`Viewport`]: fractional 2D region in `[0, 1]²`.
//! - [`PixelViewport`]: integer on-screen region.
//! - [`Range`]: 1D data range for sort-last (DB) decomposition.
//! - [`Pixel`] and [`SubPixel`]: pixel interleave and subpixel decomposition.
//! - [`Zoom`]: per-axis scale factor.
//! - [`Overdraw`]: extra pixels rendered beyond each viewport edge.
//! - [`Vec3`]: small 3D vector used by the frustum math.

mod decompose;
mod vec3;
mod viewport;

pub use decompose::{Overdraw, Pixel, Range, SubPixel, Zoom};
pub use vec3::Vec3;
pub use viewport::{PixelViewport, Viewport};
