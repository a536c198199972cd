/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The visibility and coverage pass: walks layers front-to-back to build
//! each layer's visible region against everything drawn above it, filters
//! out layers that don't belong on this output's layer stack, and diffs
//! against what was visible last frame to accumulate the region that
//! actually needs to be redrawn.

use euclid::Box2D;
use rustc_hash::FxHashMap;

use crate::ids::LayerId;
use crate::region::Region;
use crate::units::OutputSpace;

/// The minimal per-layer facts the coverage pass needs, independent of
/// how the caller stores its layers.
#[derive(Clone, Debug)]
pub struct VisibilityInput {
    pub layer_id: LayerId,
    pub screen_bounds: Box2D<i32, OutputSpace>,
    pub is_opaque: bool,
    /// Sub-region of `screen_bounds` the layer itself reports as
    /// see-through even though the layer as a whole is opaque (or the
    /// inverse: a transparent layer with an opaque hint sub-region).
    pub transparent_region_hint: Region<OutputSpace>,
    pub is_visible: bool,
    pub layer_stack_id: u32,
    /// Visible on every internal output regardless of layer stack
    /// (used for on-device-only overlays like a screen rotation banner).
    pub internal_only: bool,
    pub content_dirty: bool,
}

/// What a layer's output-layer looked like after the previous frame's
/// coverage pass, kept only long enough to diff this frame's result
/// against it. Callers source this from the previous frame's
/// [`crate::output_layer::OutputLayer`] state before overwriting it.
#[derive(Clone, Debug, Default)]
pub struct PreviousLayerState {
    pub visible_region: Region<OutputSpace>,
    pub covered_region: Region<OutputSpace>,
}

/// Coverage results for one layer, in the same order as the input slice.
#[derive(Clone, Debug, Default)]
pub struct VisibilityOutput {
    pub layer_id: LayerId,
    pub visible_region: Region<OutputSpace>,
    pub covered_region: Region<OutputSpace>,
    /// `visible_region` minus the layer's own transparent carve-out: the
    /// part of the layer that is both visible and actually opaque.
    pub visible_non_transparent_region: Region<OutputSpace>,
    /// `visible_region` intersected with the output's bounds.
    pub output_space_visible_region: Region<OutputSpace>,
    /// False if the layer was filtered out of this output's layer stack
    /// entirely; such a layer gets empty regions and contributes nothing
    /// to coverage, dirty tracking, or the undefined region.
    pub included: bool,
}

/// Everything the pass produces beyond the per-layer results: the region
/// that needs to be redrawn this frame, and the region of the output no
/// included layer claims to draw over at all.
#[derive(Clone, Debug, Default)]
pub struct CoverageResult {
    pub per_layer: Vec<VisibilityOutput>,
    pub dirty_region: Region<OutputSpace>,
    pub undefined_region: Region<OutputSpace>,
}

/// The layer's effective opaque footprint: its bounds minus any
/// transparent-hint carve-out, intersected back with bounds so a
/// carve-out bigger than the layer can't grow it.
fn opaque_footprint(bounds: Box2D<i32, OutputSpace>, is_opaque: bool, hint: &Region<OutputSpace>) -> Region<OutputSpace> {
    if !is_opaque {
        return Region::empty();
    }
    Region::from_rect(bounds).subtract(hint)
}

fn belongs_to_output(input: &VisibilityInput, output_layer_stack_id: u32, output_is_internal: bool) -> bool {
    input.layer_stack_id == output_layer_stack_id || (input.internal_only && output_is_internal)
}

/// Runs the coverage pass over `layers`, given back-to-front order (index
/// 0 is drawn first, furthest from the viewer).
///
/// Layers outside `output_layer_stack_id` (and not flagged
/// `internal_only` on an internal output) are excluded entirely: they get
/// empty regions and never contribute to coverage or the undefined
/// region, matching a layer that simply isn't part of this display.
///
/// `previous` holds each included layer's visible/covered regions as of
/// the last frame this output actually composited; a layer with no entry
/// is treated as having had nothing visible, so its first frame is fully
/// dirty.
pub fn compute_visibility(
    layers: &[VisibilityInput],
    output_bounds: Box2D<i32, OutputSpace>,
    output_layer_stack_id: u32,
    output_is_internal: bool,
    previous: &FxHashMap<LayerId, PreviousLayerState>,
) -> CoverageResult {
    let n = layers.len();
    let mut per_layer = vec![VisibilityOutput::default(); n];
    let mut dirty_region = Region::empty();
    let mut opaque_above = Region::empty();

    for i in (0..n).rev() {
        let layer = &layers[i];
        per_layer[i].layer_id = layer.layer_id;

        if !belongs_to_output(layer, output_layer_stack_id, output_is_internal) {
            continue;
        }
        per_layer[i].included = true;

        let own_bounds = Region::from_rect(layer.screen_bounds);
        let visible = if layer.is_visible { own_bounds.subtract(&opaque_above) } else { Region::empty() };
        let footprint = opaque_footprint(layer.screen_bounds, layer.is_opaque, &layer.transparent_region_hint);

        per_layer[i].covered_region = opaque_above.clone();
        per_layer[i].visible_region = visible.clone();
        per_layer[i].visible_non_transparent_region = visible.intersect(&footprint);
        per_layer[i].output_space_visible_region = visible.intersect_rect(output_bounds);

        let previous_visible =
            previous.get(&layer.layer_id).map(|p| p.visible_region.clone()).unwrap_or_else(Region::empty);
        let new_exposed = visible.subtract(&previous_visible);
        let old_exposed = previous_visible.subtract(&visible);
        let mut layer_dirty = new_exposed.union(&old_exposed);
        if layer.content_dirty {
            layer_dirty = layer_dirty.union(&visible);
        }
        dirty_region = dirty_region.union(&layer_dirty);

        if layer.is_visible {
            opaque_above = opaque_above.union(&footprint);
        }
    }

    let undefined_region = Region::from_rect(output_bounds).subtract(&opaque_above);

    CoverageResult { per_layer, dirty_region, undefined_region }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Box2D<i32, OutputSpace> {
        Box2D::new(euclid::point2(x0, y0), euclid::point2(x1, y1))
    }

    fn opaque_layer(id: u32, bounds: Box2D<i32, OutputSpace>) -> VisibilityInput {
        VisibilityInput {
            layer_id: LayerId(id),
            screen_bounds: bounds,
            is_opaque: true,
            transparent_region_hint: Region::empty(),
            is_visible: true,
            layer_stack_id: 0,
            internal_only: false,
            content_dirty: false,
        }
    }

    fn no_previous() -> FxHashMap<LayerId, PreviousLayerState> {
        FxHashMap::default()
    }

    #[test]
    fn top_opaque_layer_fully_occludes_bottom_layer_beneath_it() {
        let bottom = opaque_layer(1, rect(0, 0, 100, 100));
        let top = opaque_layer(2, rect(0, 0, 100, 100));
        let result = compute_visibility(&[bottom, top], rect(0, 0, 100, 100), 0, false, &no_previous());
        assert!(result.per_layer[0].visible_region.is_empty());
        assert!(!result.per_layer[1].visible_region.is_empty());
    }

    #[test]
    fn non_overlapping_layers_are_both_fully_visible() {
        let left = opaque_layer(1, rect(0, 0, 50, 50));
        let right = opaque_layer(2, rect(50, 0, 100, 50));
        let result = compute_visibility(&[left, right], rect(0, 0, 100, 50), 0, false, &no_previous());
        assert_eq!(result.per_layer[0].visible_region.area(), 2500);
        assert_eq!(result.per_layer[1].visible_region.area(), 2500);
    }

    #[test]
    fn layer_on_a_different_layer_stack_is_excluded_and_contributes_no_coverage() {
        let mut foreign = opaque_layer(1, rect(0, 0, 100, 100));
        foreign.layer_stack_id = 7;
        let below = opaque_layer(2, rect(0, 0, 100, 100));
        let result = compute_visibility(&[below, foreign], rect(0, 0, 100, 100), 0, false, &no_previous());
        assert!(!result.per_layer[1].included);
        assert!(result.per_layer[1].visible_region.is_empty());
        // the foreign layer never occluded `below`, which sits under it
        assert!(!result.per_layer[0].visible_region.is_empty());
    }

    #[test]
    fn internal_only_layer_is_included_on_an_internal_output_regardless_of_layer_stack() {
        let mut overlay = opaque_layer(1, rect(0, 0, 100, 100));
        overlay.layer_stack_id = 99;
        overlay.internal_only = true;
        let result = compute_visibility(&[overlay], rect(0, 0, 100, 100), 0, true, &no_previous());
        assert!(result.per_layer[0].included);
        assert!(!result.per_layer[0].visible_region.is_empty());
    }

    #[test]
    fn unchanged_geometry_and_clean_content_produces_no_dirty_region_on_the_second_frame() {
        let layer = opaque_layer(1, rect(0, 0, 100, 100));
        let first = compute_visibility(&[layer.clone()], rect(0, 0, 100, 100), 0, false, &no_previous());
        assert_eq!(first.dirty_region.area(), 10000);

        let mut previous = FxHashMap::default();
        previous.insert(
            LayerId(1),
            PreviousLayerState {
                visible_region: first.per_layer[0].visible_region.clone(),
                covered_region: first.per_layer[0].covered_region.clone(),
            },
        );
        let second = compute_visibility(&[layer], rect(0, 0, 100, 100), 0, false, &previous);
        assert!(second.dirty_region.is_empty());
    }

    #[test]
    fn content_dirty_layer_is_dirty_even_with_unchanged_geometry() {
        let mut layer = opaque_layer(1, rect(0, 0, 100, 100));
        let baseline = compute_visibility(&[layer.clone()], rect(0, 0, 100, 100), 0, false, &no_previous());
        let mut previous = FxHashMap::default();
        previous.insert(
            LayerId(1),
            PreviousLayerState {
                visible_region: baseline.per_layer[0].visible_region.clone(),
                covered_region: baseline.per_layer[0].covered_region.clone(),
            },
        );
        layer.content_dirty = true;
        let result = compute_visibility(&[layer], rect(0, 0, 100, 100), 0, false, &previous);
        assert_eq!(result.dirty_region.area(), 10000);
    }

    #[test]
    fn undefined_region_is_output_bounds_minus_opaque_coverage() {
        let layer = opaque_layer(1, rect(0, 0, 50, 100));
        let result = compute_visibility(&[layer], rect(0, 0, 100, 100), 0, false, &no_previous());
        assert_eq!(result.undefined_region.area(), 5000);
    }

    #[test]
    fn transparent_region_hint_keeps_a_layer_out_of_its_own_non_transparent_region() {
        let mut layer = opaque_layer(1, rect(0, 0, 100, 100));
        layer.transparent_region_hint = Region::from_rect(rect(0, 0, 50, 100));
        let result = compute_visibility(&[layer], rect(0, 0, 100, 100), 0, false, &no_previous());
        assert_eq!(result.per_layer[0].visible_non_transparent_region.area(), 5000);
        assert_eq!(result.per_layer[0].visible_region.area(), 10000);
    }
}
