/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-(output, layer) derived state. An [`OutputLayer`] is created the
//! first time a layer becomes visible on a given output and destroyed
//! once it stops intersecting that output's bounds; it never outlives
//! the layer or the output it belongs to.

use euclid::Box2D;

use crate::color_profile::Dataspace;
use crate::ids::{LayerHandle, LayerId};
use crate::region::Region;
use crate::units::OutputSpace;

/// Which strategy this layer should use for the frame currently being
/// prepared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositionType {
    Device,
    Client,
}

/// Derived, per-output state for one layer: its screen-space geometry
/// and the coverage/strategy bookkeeping the composition passes update
/// each frame.
#[derive(Clone, Debug)]
pub struct OutputLayer {
    layer_handle: LayerHandle,
    screen_bounds: Box2D<i32, OutputSpace>,
    visible_region: Region<OutputSpace>,
    visible_non_transparent_region: Region<OutputSpace>,
    covered_region: Region<OutputSpace>,
    output_space_visible_region: Region<OutputSpace>,
    dataspace: Dataspace,
    is_opaque: bool,
    composition_type: CompositionType,
    forced_client_composition: bool,
    /// Set by the strategy pass from the hardware composer's per-layer
    /// requests; read back by client composition's clear heuristic.
    clear_client_target: bool,
}

impl OutputLayer {
    pub fn new(layer_handle: LayerHandle, screen_bounds: Box2D<i32, OutputSpace>) -> Self {
        OutputLayer {
            layer_handle,
            screen_bounds,
            visible_region: Region::empty(),
            visible_non_transparent_region: Region::empty(),
            covered_region: Region::empty(),
            output_space_visible_region: Region::empty(),
            dataspace: Dataspace::Unknown,
            is_opaque: false,
            composition_type: CompositionType::Device,
            forced_client_composition: false,
            clear_client_target: false,
        }
    }

    pub fn layer_handle(&self) -> LayerHandle {
        self.layer_handle
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer_handle.id
    }

    pub fn screen_bounds(&self) -> Box2D<i32, OutputSpace> {
        self.screen_bounds
    }

    pub fn set_screen_bounds(&mut self, bounds: Box2D<i32, OutputSpace>) {
        self.screen_bounds = bounds;
    }

    pub fn visible_region(&self) -> &Region<OutputSpace> {
        &self.visible_region
    }

    pub fn set_visible_region(&mut self, region: Region<OutputSpace>) {
        self.visible_region = region;
    }

    /// `visibleRegion` minus the layer's own transparent-hint carve-out:
    /// the part of the layer that is both visible and actually opaque,
    /// which is what client composition clips its draw against.
    pub fn visible_non_transparent_region(&self) -> &Region<OutputSpace> {
        &self.visible_non_transparent_region
    }

    pub fn set_visible_non_transparent_region(&mut self, region: Region<OutputSpace>) {
        self.visible_non_transparent_region = region;
    }

    pub fn covered_region(&self) -> &Region<OutputSpace> {
        &self.covered_region
    }

    pub fn set_covered_region(&mut self, region: Region<OutputSpace>) {
        self.covered_region = region;
    }

    /// `visibleRegion` intersected back with the output's own bounds
    /// (viewport), distinct from `visibleRegion` only when a layer's
    /// bounds straddle the output edge.
    pub fn output_space_visible_region(&self) -> &Region<OutputSpace> {
        &self.output_space_visible_region
    }

    pub fn set_output_space_visible_region(&mut self, region: Region<OutputSpace>) {
        self.output_space_visible_region = region;
    }

    pub fn dataspace(&self) -> Dataspace {
        self.dataspace
    }

    pub fn set_dataspace(&mut self, dataspace: Dataspace) {
        self.dataspace = dataspace;
    }

    pub fn is_opaque(&self) -> bool {
        self.is_opaque
    }

    pub fn set_is_opaque(&mut self, is_opaque: bool) {
        self.is_opaque = is_opaque;
    }

    pub fn composition_type(&self) -> CompositionType {
        self.composition_type
    }

    pub fn set_composition_type(&mut self, composition_type: CompositionType) {
        self.composition_type = composition_type;
    }

    pub fn forced_client_composition(&self) -> bool {
        self.forced_client_composition
    }

    pub fn set_forced_client_composition(&mut self, forced: bool) {
        self.forced_client_composition = forced;
    }

    pub fn uses_client_composition(&self) -> bool {
        self.forced_client_composition || self.composition_type == CompositionType::Client
    }

    /// Whether the hardware composer asked for this layer's share of the
    /// client target to be cleared this frame (a device layer sitting
    /// under client-composited content still needs the target punched
    /// through so its own pixels show).
    pub fn clear_client_target(&self) -> bool {
        self.clear_client_target
    }

    pub fn set_clear_client_target(&mut self, clear: bool) {
        self.clear_client_target = clear;
    }

    #[cfg(test)]
    pub fn new_for_test() -> Self {
        OutputLayer::new(
            LayerHandle { id: LayerId(0), generation: 0 },
            Box2D::from_origin_and_size(euclid::point2(0, 0), euclid::size2(1, 1)),
        )
    }

    #[cfg(test)]
    pub fn set_dataspace_for_test(&mut self, dataspace: Dataspace, forced_client: bool) {
        self.dataspace = dataspace;
        self.forced_client_composition = forced_client;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_client_composition_overrides_device_strategy() {
        let mut layer = OutputLayer::new_for_test();
        layer.set_composition_type(CompositionType::Device);
        layer.set_forced_client_composition(true);
        assert!(layer.uses_client_composition());
    }

    #[test]
    fn device_layer_without_force_does_not_use_client_composition() {
        let mut layer = OutputLayer::new_for_test();
        layer.set_composition_type(CompositionType::Device);
        assert!(!layer.uses_client_composition());
    }

    #[test]
    fn clear_client_target_defaults_to_false_and_is_settable() {
        let mut layer = OutputLayer::new_for_test();
        assert!(!layer.clear_client_target());
        layer.set_clear_client_target(true);
        assert!(layer.clear_client_target());
    }
}
