/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The input-layer contract this crate consumes. Layers themselves are
//! owned by the embedder's arena; this crate only ever sees them through
//! [`LayerFrontEnd`] trait objects handed back by a [`LayerRegistry`],
//! never by owning a layer outright.

use crate::color_profile::Dataspace;
use crate::ids::{LayerHandle, LayerId};
use crate::region::{LayerTransform, Region};
use crate::units::{LayerSpace, OutputSpace};

/// How much of a layer's front-end state a latch call should populate:
/// a cheap geometry-only latch versus a fuller latch a renderer might
/// want before drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatchSubset {
    BasicGeometry,
    GeometryAndContent,
    Content,
}

/// Read-only front-end state a layer exposes.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerFeState {
    pub bounds: euclid::Box2D<i32, LayerSpace>,
    pub transform: LayerTransform<LayerSpace, OutputSpace>,
    pub dataspace: Dataspace,
    pub is_opaque: bool,
    pub transparent_region_hint: Region<LayerSpace>,
    pub is_visible: bool,
    pub content_dirty: bool,
    pub force_client_composition: bool,
    pub has_protected_content: bool,
    pub layer_stack_id: u32,
    pub internal_only: bool,
    pub needs_filtering: bool,
}

/// A rect plus metadata the render backend needs to draw one layer into
/// the client-composition target. Produced by `prepare_client_composition`.
#[derive(Clone, Debug)]
pub struct LayerDrawSettings {
    pub clip: Region<OutputSpace>,
    pub use_identity_transform: bool,
    pub needs_filtering: bool,
    pub is_secure: bool,
    pub supports_protected_content: bool,
    /// Region the caller should zero out in the target buffer before
    /// drawing, if any.
    pub clear_region: Region<OutputSpace>,
}

/// One item the render backend draws: either real layer content, or a
/// solid-color fill (used for clears and the debug repaint-flash).
#[derive(Clone, Debug)]
pub struct LayerDrawRequest {
    pub clip: Region<OutputSpace>,
    pub solid_color: Option<[f32; 4]>,
    pub disable_blending: bool,
    pub source_layer: Option<LayerId>,
}

/// The external contract this crate consumes from each input layer's
/// front-end. Implemented by the embedder.
pub trait LayerFrontEnd {
    fn latch_composition_state(&mut self, subset: LatchSubset);

    /// Build a draw request for this layer if it needs (re)drawing given
    /// `clip`/`settings`. `None` means "nothing to draw" (e.g. a clear
    /// request against a layer with no actual draw spec to emit).
    fn prepare_client_composition(&self, settings: &LayerDrawSettings) -> Option<LayerDrawRequest>;

    /// Called once this layer's previous buffer may be reused because
    /// `release_fence` (opaque to this crate — see [`crate::hwc::Fence`])
    /// has signaled.
    fn on_layer_displayed(&mut self, release_fence: crate::hwc::Fence);

    fn state(&self) -> &LayerFeState;
}

/// Looks up a [`LayerFrontEnd`] by handle. Layers are owned by an
/// external arena with generation-tagged slots; a lookup against a
/// handle whose generation has moved on ("promotion failure") is a
/// normal, silently-skipped outcome, never a panic.
pub trait LayerRegistry {
    fn get(&self, handle: LayerHandle) -> Option<&dyn LayerFrontEnd>;
    fn get_mut(&mut self, handle: LayerHandle) -> Option<&mut dyn LayerFrontEnd>;
}
