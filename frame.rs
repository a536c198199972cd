/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Drives one output through a full frame: latch layer state, compute
//! visibility and coverage, decide whether the result is worth
//! recomposing at all, choose each layer's composition strategy, resolve
//! the color profile, composite the client layers that need it, then
//! post the framebuffer and distribute fences.
//!
//! Each phase here is a thin call into the module that owns it; this
//! file's only job is sequencing and threading the right state between
//! them, the same shape as a display server's single-output "compose
//! one frame" entry point.

use rustc_hash::FxHashMap;

use crate::client_composition::{compose_client_layers, latch_client_layers, ClientCompositionContext};
use crate::color_profile::{choose_color_profile, Dataspace, DisplayColorProfile};
use crate::hwc::HardwareComposer;
use crate::ids::{LayerHandle, LayerId};
use crate::layer::{LatchSubset, LayerRegistry};
use crate::output::Output;
use crate::present::{post_framebuffer, PresentInputs};
use crate::region::Region;
use crate::render_backend::{RenderBackend, RenderSurface};
use crate::stats::CompositionStats;
use crate::strategy::{choose_strategy, ForceClientReason, StrategyInput};
use crate::units::OutputSpace;
use crate::visibility::{compute_visibility, PreviousLayerState, VisibilityInput};

/// Per-layer inputs [`compose_frame`] needs that aren't already sitting
/// on an [`crate::output_layer::OutputLayer`].
pub struct FrameLayerInput {
    pub handle: LayerHandle,
    pub is_visible: bool,
    pub is_opaque: bool,
    pub transparent_region_hint: Region<OutputSpace>,
    pub force_client: Option<ForceClientReason>,
}

pub struct FrameResources<'a> {
    pub registry: &'a mut dyn LayerRegistry,
    pub hwc: &'a mut dyn HardwareComposer,
    pub render_backend: &'a mut dyn RenderBackend,
    pub render_surface: &'a mut dyn RenderSurface,
    pub color_profile: &'a dyn DisplayColorProfile,
    pub is_secure: bool,
    pub max_luminance: f32,
    pub repaint_flash: bool,
}

/// Per-layer front-end facts the coverage pass and later phases need but
/// that only the layer's own front-end knows, snapshotted once per frame
/// so every later read sees the same point-in-time state.
struct LayerFeSnapshot {
    layer_stack_id: u32,
    internal_only: bool,
    content_dirty: bool,
    dataspace: Dataspace,
}

/// Composites one frame for `output`. `layer_inputs` must be in the same
/// back-to-front z-order already reflected in `output`'s output-layers.
pub fn compose_frame(
    output: &mut Output,
    layer_inputs: &[FrameLayerInput],
    resources: FrameResources,
    stats: &mut CompositionStats,
) {
    if !output.powered_on() || !output.needs_composition() {
        return;
    }
    output.take_invalidation_reasons();

    for input in layer_inputs {
        if let Some(front_end) = resources.registry.get_mut(input.handle) {
            front_end.latch_composition_state(LatchSubset::BasicGeometry);
        }
    }

    let mut previous: FxHashMap<LayerId, PreviousLayerState> = FxHashMap::default();
    for layer in output.output_layers_back_to_front() {
        previous.insert(
            layer.layer_id(),
            PreviousLayerState {
                visible_region: layer.visible_region().clone(),
                covered_region: layer.covered_region().clone(),
            },
        );
    }

    let snapshots: Vec<LayerFeSnapshot> = layer_inputs
        .iter()
        .map(|input| {
            resources
                .registry
                .get(input.handle)
                .map(|front_end| {
                    let state = front_end.state();
                    LayerFeSnapshot {
                        layer_stack_id: state.layer_stack_id,
                        internal_only: state.internal_only,
                        content_dirty: state.content_dirty,
                        dataspace: state.dataspace,
                    }
                })
                .unwrap_or(LayerFeSnapshot {
                    layer_stack_id: 0,
                    internal_only: false,
                    content_dirty: false,
                    dataspace: Dataspace::Unknown,
                })
        })
        .collect();

    let visibility_inputs: Vec<VisibilityInput> = layer_inputs
        .iter()
        .zip(snapshots.iter())
        .map(|(input, snapshot)| {
            let bounds = output
                .output_layer(input.handle)
                .map(|l| l.screen_bounds())
                .unwrap_or_else(euclid::Box2D::zero);
            VisibilityInput {
                layer_id: input.handle.id,
                screen_bounds: bounds,
                is_opaque: input.is_opaque,
                transparent_region_hint: input.transparent_region_hint.clone(),
                is_visible: input.is_visible,
                layer_stack_id: snapshot.layer_stack_id,
                internal_only: snapshot.internal_only,
                content_dirty: snapshot.content_dirty,
            }
        })
        .collect();

    let coverage = compute_visibility(
        &visibility_inputs,
        output.bounds(),
        output.layer_stack_id(),
        output.is_internal(),
        &previous,
    );

    let layers_empty = coverage.per_layer.iter().all(|v| v.visible_region.is_empty());

    for ((input, visible), snapshot) in layer_inputs.iter().zip(coverage.per_layer.iter()).zip(snapshots.iter()) {
        if let Some(layer) = output.output_layer_mut(input.handle) {
            layer.set_is_opaque(input.is_opaque);
            layer.set_visible_region(visible.visible_region.clone());
            layer.set_covered_region(visible.covered_region.clone());
            layer.set_visible_non_transparent_region(visible.visible_non_transparent_region.clone());
            layer.set_output_space_visible_region(visible.output_space_visible_region.clone());
            layer.set_dataspace(snapshot.dataspace);
        }
    }

    output.add_dirty_region(&coverage.dirty_region);
    output.set_undefined_region(coverage.undefined_region);

    if !output.begin_frame(layers_empty) {
        return;
    }
    output.clear_dirty_region();

    let mut output_layers: Vec<_> = output.output_layers_back_to_front().cloned().collect();
    let strategy_inputs: Vec<StrategyInput> = layer_inputs
        .iter()
        .map(|input| StrategyInput { force_client: input.force_client })
        .collect();
    let strategy_result = choose_strategy(&mut output_layers, &strategy_inputs, resources.hwc);
    for layer in &output_layers {
        if let Some(slot) = output.output_layer_mut(layer.layer_handle()) {
            *slot = layer.clone();
        }
    }
    output.set_composition_usage(strategy_result.uses_client_composition, strategy_result.uses_device_composition);

    let color_request = choose_color_profile(
        output.color_setting(),
        output.force_output_color_mode(),
        &output_layers,
        resources.color_profile,
    );
    output.set_last_dataspace(color_request.dataspace);

    latch_client_layers(&output_layers, resources.registry);

    let client_count = output_layers.iter().filter(|l| l.uses_client_composition()).count();
    let device_count = output_layers.len() - client_count;
    stats.record_frame(client_count, device_count);

    let ctx = ClientCompositionContext {
        output_bounds: output.bounds(),
        needs_filtering: output.needs_filtering(),
        is_secure: resources.is_secure,
        dataspace: color_request.dataspace,
        max_luminance: resources.max_luminance,
        color_transform: output.color_transform(),
    };

    let client_result = compose_client_layers(
        &output_layers,
        resources.registry,
        &ctx,
        resources.render_backend,
        resources.render_surface,
        resources.repaint_flash,
    );

    let client_ready_fence = match client_result {
        Ok(result) => result.ready_fence,
        Err(_) => {
            stats.record_client_dequeue_failure();
            log::warn!("client composition dequeue failed; device layers still post this frame");
            None
        },
    };

    let present_inputs = PresentInputs {
        client_target_acquire_fence: client_ready_fence,
        client_composition_happened: client_ready_fence.is_some(),
        render_surface: resources.render_surface,
    };
    post_framebuffer(output, resources.hwc, present_inputs, resources.registry);
}
