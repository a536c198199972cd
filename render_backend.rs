/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The render-backend and render-surface contracts client composition
//! draws through. Neither trait says anything about how a draw request
//! actually reaches pixels; that's the embedder's renderer.

use euclid::Box2D;

use crate::color_profile::Dataspace;
use crate::hwc::Fence;
use crate::layer::LayerDrawRequest;
use crate::output::ColorTransformMatrix;
use crate::units::OutputSpace;

/// Everything about the target this draw batch is rendering for, as
/// distinct from what each individual layer needs: clip against the
/// output's viewport, the global transform applied after every layer is
/// drawn, and the output-wide color pipeline state.
#[derive(Clone, Debug)]
pub struct DisplaySettings {
    pub clip: Box2D<i32, OutputSpace>,
    pub output_dataspace: Dataspace,
    pub max_luminance: f32,
    pub color_transform: Option<ColorTransformMatrix>,
}

/// A drawable target client composition renders into: one of a small
/// ring of buffers the surface cycles through frame to frame.
pub trait RenderSurface {
    /// Acquire the next buffer to draw into, plus a fence that signals
    /// once any prior reader of that buffer slot is done with it.
    fn dequeue(&mut self) -> Result<(), crate::error::DequeueFailed>;

    /// Fence that must be waited on before reading the buffer just
    /// dequeued, if any.
    fn acquire_fence(&self) -> Option<Fence>;

    /// Hand the filled buffer back to the surface for display, attaching
    /// the fence the renderer produced that signals once the draw
    /// commands have finished writing to it.
    fn queue(&mut self, ready_fence: Fence);

    /// Marks this surface's buffers as protected-content-capable or not.
    /// Only meaningful while a protected layer is actually being
    /// composited; toggling back afterward lets an unprotected consumer
    /// read the buffer again.
    fn set_protected(&mut self, enabled: bool);
}

/// Executes a client-composition draw list against a [`RenderSurface`]'s
/// current buffer.
pub trait RenderBackend {
    /// Issue the given draw requests, in order (later requests draw over
    /// earlier ones) against `settings`, and return the fence that
    /// signals once they've all completed.
    fn draw(&mut self, settings: &DisplaySettings, requests: &[LayerDrawRequest]) -> Fence;

    /// Whether this backend can render DRM-protected buffer content at
    /// all; a layer with protected content gets forced to device
    /// composition on a backend that answers `false` here.
    fn supports_protected_content(&self) -> bool;

    /// Switches the backend's rendering context into (or out of) the
    /// mode needed to read from protected buffers. Only called when a
    /// protected layer is actually part of this frame's draw list.
    fn set_protected_context(&mut self, enabled: bool);

    /// Hints that the upcoming draw targets a wide-gamut output
    /// (DISPLAY_P3 and beyond), which some renderers process at reduced
    /// throughput; the backend may use this to pre-warm more expensive
    /// pipeline state.
    fn set_expensive_rendering_expected(&mut self, expected: bool);
}
