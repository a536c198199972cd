/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! An [`Output`]: one physical or virtual display surface this crate
//! composites onto, plus the bookkeeping a frame needs between the
//! passes described in `frame.rs`. Physical vs. virtual output behavior
//! is a capability difference, not a type hierarchy — callers reach it
//! through [`OutputBackend`] rather than matching on an enum.

use euclid::Box2D;
use rustc_hash::FxHashMap;

use crate::color_profile::{ColorSetting, Dataspace};
use crate::hwc::HardwareComposer;
use crate::ids::{LayerHandle, OutputId};
use crate::output_layer::OutputLayer;
use crate::region::Region;
use crate::render_backend::{RenderBackend, RenderSurface};
use crate::units::OutputSpace;

/// A 4x4 color transform matrix, row-major, applied to every pixel this
/// output composites once client composition can't apply it itself
/// (device composition is opaque to color transforms beyond what the
/// hardware composer negotiates).
pub type ColorTransformMatrix = [f32; 16];

bitflags::bitflags! {
    /// Why an output needs to be recomposited this vsync. A frame driver
    /// can skip calling [`crate::frame::compose_frame`] entirely for an
    /// output whose reasons are empty. This is a coarse hint layered on
    /// top of the authoritative per-pixel [`Output::dirty_region`]; the
    /// per-frame driver's recompose decision is ultimately the dirty
    /// region, not this bitset.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct InvalidationReasons: u32 {
        const CONTENT_DIRTY = 1 << 0;
        const GEOMETRY_CHANGED = 1 << 1;
        const COLOR_PROFILE_CHANGED = 1 << 2;
        const FORCE_REPAINT = 1 << 3;
        const COLOR_TRANSFORM_CHANGED = 1 << 4;
    }
}

/// Layers that dropped off an output between frames, kept until the
/// present phase has a chance to notify their front-ends with that
/// frame's present fence. Entries are plain handles rather than weak
/// pointers, so "pruning" means checking the registry for liveness
/// rather than an automatic drop — an entry whose front-end already
/// vanished by the time it's pruned is simply forgotten, never delivered.
#[derive(Default)]
pub struct ReleasedLayers {
    handles: Vec<LayerHandle>,
}

impl ReleasedLayers {
    fn push(&mut self, handle: LayerHandle) {
        self.handles.push(handle);
    }

    /// Drops entries whose front-end is already gone, so a long gap
    /// between present calls doesn't let dead entries pile up
    /// indefinitely between legitimate releases.
    pub fn prune(&mut self, registry: &dyn crate::layer::LayerRegistry) {
        self.handles.retain(|handle| registry.get(*handle).is_some());
    }

    fn drain(&mut self) -> Vec<LayerHandle> {
        std::mem::take(&mut self.handles)
    }
}

/// Per-output capability and identity facts this crate doesn't try to
/// derive; the embedder answers these directly.
pub trait OutputBackend {
    fn id(&self) -> OutputId;
    fn bounds(&self) -> Box2D<i32, OutputSpace>;
    fn is_virtual(&self) -> bool;
    fn is_secure(&self) -> bool;
    fn hardware_composer(&mut self) -> &mut dyn HardwareComposer;
    fn render_backend(&mut self) -> &mut dyn RenderBackend;
    fn render_surface(&mut self) -> &mut dyn RenderSurface;
}

/// Which layers are currently associated with an output, and the
/// coverage/strategy state computed for them last frame. Layers are
/// stored back-to-front in `z_order`/`entries` in lockstep, with
/// `index_of` giving O(1) lookup by handle.
pub struct Output {
    id: OutputId,
    bounds: Box2D<i32, OutputSpace>,
    layer_stack_id: u32,
    is_internal: bool,
    entries: Vec<(LayerHandle, OutputLayer)>,
    index_of: FxHashMap<LayerHandle, usize>,
    color_setting: ColorSetting,
    force_output_color_mode: Option<crate::color_profile::ColorMode>,
    last_dataspace: Dataspace,
    dirty_region: Region<OutputSpace>,
    undefined_region: Region<OutputSpace>,
    powered_on: bool,
    pending_invalidation: InvalidationReasons,
    last_composition_had_visible_layers: bool,
    uses_client_composition: bool,
    uses_device_composition: bool,
    needs_filtering: bool,
    color_transform: Option<ColorTransformMatrix>,
    released_layers: ReleasedLayers,
}

impl Output {
    pub fn new(id: OutputId, bounds: Box2D<i32, OutputSpace>) -> Self {
        Output {
            id,
            bounds,
            layer_stack_id: 0,
            is_internal: true,
            entries: Vec::new(),
            index_of: FxHashMap::default(),
            color_setting: ColorSetting::Managed,
            force_output_color_mode: None,
            last_dataspace: Dataspace::Unknown,
            dirty_region: Region::empty(),
            undefined_region: Region::empty(),
            powered_on: true,
            pending_invalidation: InvalidationReasons::FORCE_REPAINT,
            last_composition_had_visible_layers: false,
            uses_client_composition: false,
            uses_device_composition: false,
            needs_filtering: false,
            color_transform: None,
            released_layers: ReleasedLayers::default(),
        }
    }

    pub fn id(&self) -> OutputId {
        self.id
    }

    pub fn bounds(&self) -> Box2D<i32, OutputSpace> {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Box2D<i32, OutputSpace>) {
        self.bounds = bounds;
    }

    pub fn layer_stack_id(&self) -> u32 {
        self.layer_stack_id
    }

    pub fn set_layer_stack_id(&mut self, layer_stack_id: u32) {
        self.layer_stack_id = layer_stack_id;
    }

    pub fn is_internal(&self) -> bool {
        self.is_internal
    }

    pub fn set_is_internal(&mut self, is_internal: bool) {
        self.is_internal = is_internal;
    }

    pub fn powered_on(&self) -> bool {
        self.powered_on
    }

    pub fn set_powered_on(&mut self, powered_on: bool) {
        self.powered_on = powered_on;
    }

    pub fn color_setting(&self) -> ColorSetting {
        self.color_setting
    }

    pub fn set_color_setting(&mut self, setting: ColorSetting) {
        self.color_setting = setting;
    }

    pub fn force_output_color_mode(&self) -> Option<crate::color_profile::ColorMode> {
        self.force_output_color_mode
    }

    pub fn set_force_output_color_mode(&mut self, mode: Option<crate::color_profile::ColorMode>) {
        self.force_output_color_mode = mode;
    }

    pub fn last_dataspace(&self) -> Dataspace {
        self.last_dataspace
    }

    pub fn set_last_dataspace(&mut self, dataspace: Dataspace) {
        self.last_dataspace = dataspace;
    }

    pub fn needs_filtering(&self) -> bool {
        self.needs_filtering
    }

    pub fn set_needs_filtering(&mut self, needs_filtering: bool) {
        self.needs_filtering = needs_filtering;
    }

    pub fn color_transform(&self) -> Option<ColorTransformMatrix> {
        self.color_transform
    }

    /// Sets the output-wide color transform. Returns `true` if it
    /// actually changed, in which case the caller should also
    /// `invalidate(InvalidationReasons::COLOR_TRANSFORM_CHANGED)`.
    pub fn set_color_transform(&mut self, matrix: Option<ColorTransformMatrix>) -> bool {
        if self.color_transform == matrix {
            return false;
        }
        self.color_transform = matrix;
        true
    }

    pub fn uses_client_composition(&self) -> bool {
        self.uses_client_composition
    }

    pub fn uses_device_composition(&self) -> bool {
        self.uses_device_composition
    }

    pub fn set_composition_usage(&mut self, uses_client: bool, uses_device: bool) {
        self.uses_client_composition = uses_client;
        self.uses_device_composition = uses_device;
    }

    pub fn dirty_region(&self) -> &Region<OutputSpace> {
        &self.dirty_region
    }

    pub fn add_dirty_region(&mut self, region: &Region<OutputSpace>) {
        self.dirty_region = self.dirty_region.union(region);
    }

    pub fn clear_dirty_region(&mut self) {
        self.dirty_region = Region::empty();
    }

    pub fn undefined_region(&self) -> &Region<OutputSpace> {
        &self.undefined_region
    }

    pub fn set_undefined_region(&mut self, region: Region<OutputSpace>) {
        self.undefined_region = region;
    }

    pub fn invalidate(&mut self, reasons: InvalidationReasons) {
        self.pending_invalidation |= reasons;
    }

    pub fn needs_composition(&self) -> bool {
        !self.pending_invalidation.is_empty()
    }

    /// Returns the reasons accumulated since the last call and clears
    /// them, for a frame driver that just finished compositing them.
    pub fn take_invalidation_reasons(&mut self) -> InvalidationReasons {
        std::mem::replace(&mut self.pending_invalidation, InvalidationReasons::empty())
    }

    /// The authoritative recompose decision for this vsync: dirty region
    /// non-empty, except when both this frame and the last composed one
    /// have no visible layers at all (two empty frames in a row are
    /// identical, so the second is skipped even though its "dirty"
    /// region from layer churn could be non-empty). Updates
    /// `last_composition_had_visible_layers` only when recomposing, so a
    /// skipped frame doesn't lose track of what the *last actual*
    /// composition looked like.
    pub fn begin_frame(&mut self, layers_empty: bool) -> bool {
        let dirty = !self.dirty_region.is_empty();
        let was_empty = !self.last_composition_had_visible_layers;
        let recompose = dirty && !(layers_empty && was_empty);
        if recompose {
            self.last_composition_had_visible_layers = !layers_empty;
        }
        recompose
    }

    /// Ensures `handle` has an [`OutputLayer`] on this output, creating
    /// one at the back of the z-order if it's new this frame.
    pub fn ensure_output_layer(&mut self, handle: LayerHandle, screen_bounds: Box2D<i32, OutputSpace>) {
        if let Some(&index) = self.index_of.get(&handle) {
            self.entries[index].1.set_screen_bounds(screen_bounds);
            return;
        }
        self.index_of.insert(handle, self.entries.len());
        self.entries.push((handle, OutputLayer::new(handle, screen_bounds)));
    }

    /// Drops the output-layer for `handle`, if it had one (the layer
    /// stopped intersecting this output or is no longer part of its
    /// layer stack). The handle is recorded so the present phase can
    /// notify its front-end with this frame's present fence once posted.
    pub fn remove_output_layer(&mut self, handle: LayerHandle) {
        let Some(index) = self.index_of.remove(&handle) else { return };
        self.entries.remove(index);
        for (h, i) in self.index_of.iter_mut() {
            if *i > index {
                *i -= 1;
            }
            let _ = h;
        }
        self.released_layers.push(handle);
    }

    /// Opportunistically drops released-layer entries whose front-end has
    /// already vanished, bounding how large the set can grow between
    /// frames that actually post and drain it.
    pub fn prune_released_layers(&mut self, registry: &dyn crate::layer::LayerRegistry) {
        self.released_layers.prune(registry);
    }

    /// Layers that dropped off this output since the last call, for the
    /// present phase to notify with the present fence. Clears the set.
    pub fn take_released_layers(&mut self) -> Vec<LayerHandle> {
        self.released_layers.drain()
    }

    pub fn output_layer(&self, handle: LayerHandle) -> Option<&OutputLayer> {
        self.index_of.get(&handle).map(|&i| &self.entries[i].1)
    }

    pub fn output_layer_mut(&mut self, handle: LayerHandle) -> Option<&mut OutputLayer> {
        if let Some(&i) = self.index_of.get(&handle) {
            Some(&mut self.entries[i].1)
        } else {
            None
        }
    }

    /// Output-layers in back-to-front z-order, the order every
    /// composition pass in `frame.rs` expects.
    pub fn output_layers_back_to_front(&self) -> impl Iterator<Item = &OutputLayer> {
        self.entries.iter().map(|(_, layer)| layer)
    }

    pub fn output_layers_back_to_front_mut(&mut self) -> impl Iterator<Item = &mut OutputLayer> {
        self.entries.iter_mut().map(|(_, layer)| layer)
    }

    pub fn output_layer_handles(&self) -> impl Iterator<Item = LayerHandle> + '_ {
        self.entries.iter().map(|(handle, _)| *handle)
    }

    /// Produces a one-line-per-layer text dump of this output's current
    /// composition state, for a developer's `adb shell dumpsys`-style
    /// diagnostic surface.
    pub fn dump_state(&self) -> String {
        let mut out = format!(
            "output {:?} bounds={:?} powered_on={} uses_client={} uses_device={} dirty_rects={} layers={}\n",
            self.id,
            self.bounds,
            self.powered_on,
            self.uses_client_composition,
            self.uses_device_composition,
            self.dirty_region.rects().count(),
            self.entries.len()
        );
        for (handle, layer) in &self.entries {
            out.push_str(&format!(
                "  layer {:?} bounds={:?} type={:?} opaque={}\n",
                handle, layer.screen_bounds(), layer.composition_type(), layer.is_opaque()
            ));
        }
        out
    }
}
