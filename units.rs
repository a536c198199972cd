/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Unit-tagged geometry spaces, following the same `DevicePixel`/
//! `LayoutPixel`-style tagging convention as the rest of this crate's
//! dependency stack, so that a layer-space rect and an output-space rect
//! can never be silently mixed up by the type checker.

/// The coordinate space an input layer's own geometry is expressed in,
/// before any output transform is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerSpace;

/// The coordinate space of the output's framebuffer (post output-transform).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutputSpace;

pub type LayerRect = euclid::Box2D<i32, LayerSpace>;
pub type LayerPoint = euclid::Point2D<i32, LayerSpace>;
pub type LayerVector = euclid::Vector2D<i32, LayerSpace>;

pub type OutputRect = euclid::Box2D<i32, OutputSpace>;
pub type OutputPoint = euclid::Point2D<i32, OutputSpace>;
