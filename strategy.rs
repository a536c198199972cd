/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Chooses each layer's composition strategy for the frame: device when
//! the hardware composer can scan it out directly, client when it can't
//! or the caller has forced it, then applies back whatever per-layer and
//! display-wide requests the device attached to its answer.

use crate::hwc::{DeviceCompositionType, DisplayRequests, HardwareComposer, HwcLayerState};
use crate::output_layer::{CompositionType, OutputLayer};

/// Reasons a layer can be pinned to client composition regardless of
/// what the device would otherwise support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForceClientReason {
    HasProtectedContentOnUnsupportedOutput,
    NeedsFilteringUnsupportedByDevice,
    ColorTransformUnsupportedByDevice,
    ExplicitDebugOverride,
}

/// Per-layer input the strategy pass needs beyond what [`OutputLayer`]
/// already tracks.
#[derive(Clone, Copy, Debug)]
pub struct StrategyInput {
    pub force_client: Option<ForceClientReason>,
}

/// What this output settled on for the frame: the composition mix, used
/// by later phases to decide whether a client target needs allocating at
/// all and whether the device's display-wide flip request applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrategyResult {
    pub uses_client_composition: bool,
    pub uses_device_composition: bool,
    pub flip_client_target: bool,
}

/// Sets each output-layer's initial composition type, submits the device
/// candidates to the hardware composer, and applies back everything it
/// reports: composition-type overrides, per-layer clear-client-target
/// requests, and the display-wide flip-client-target request.
///
/// `layer_requests` are first reset to `false` on every layer before
/// being reapplied, so a layer the device no longer asks to clear this
/// frame doesn't keep carrying a stale flag from a previous frame.
pub fn choose_strategy(
    output_layers: &mut [OutputLayer],
    inputs: &[StrategyInput],
    hwc: &mut dyn HardwareComposer,
) -> StrategyResult {
    debug_assert_eq!(output_layers.len(), inputs.len());

    let mut device_candidates = Vec::new();
    let mut any_forced_client = false;
    for (index, (layer, input)) in output_layers.iter_mut().zip(inputs.iter()).enumerate() {
        layer.set_clear_client_target(false);
        if let Some(reason) = input.force_client {
            layer.set_composition_type(CompositionType::Client);
            layer.set_forced_client_composition(true);
            any_forced_client = true;
            log::debug!("layer {:?} forced to client composition: {:?}", layer.layer_id(), reason);
            continue;
        }
        layer.set_forced_client_composition(false);
        layer.set_composition_type(CompositionType::Device);
        device_candidates.push((
            index,
            HwcLayerState {
                layer_id: layer.layer_id(),
                display_frame: layer.screen_bounds(),
                z_order: index as u32,
                dataspace: layer.dataspace(),
                blocks_screen: layer.is_opaque(),
            },
        ));
    }

    let states: Vec<HwcLayerState> = device_candidates.iter().map(|(_, s)| *s).collect();
    hwc.set_layers(&states);

    let mut flip_client_target = false;
    match hwc.validate(any_forced_client) {
        Ok(result) => {
            for change in result.changed_types {
                if change.composition_type == DeviceCompositionType::Client {
                    if let Some(layer) =
                        output_layers.iter_mut().find(|l| l.layer_id() == change.layer_id)
                    {
                        layer.set_composition_type(CompositionType::Client);
                    }
                }
            }
            for request in result.layer_requests {
                if let Some(layer) = output_layers.iter_mut().find(|l| l.layer_id() == request.layer_id) {
                    layer.set_clear_client_target(request.clear_client_target);
                }
            }
            flip_client_target = result.display_requests.contains(DisplayRequests::FLIP_CLIENT_TARGET);
        },
        Err(_) => {
            // Conservative fallback: every non-forced layer goes to
            // client composition this frame.
            log::warn!("hardware composer validate failed, falling back to all-client composition");
            for layer in output_layers.iter_mut() {
                if !layer.forced_client_composition() {
                    layer.set_composition_type(CompositionType::Client);
                }
            }
        },
    }

    let uses_client_composition = output_layers.iter().any(|l| l.uses_client_composition());
    let uses_device_composition =
        output_layers.iter().any(|l| l.composition_type() == CompositionType::Device && !l.forced_client_composition());

    StrategyResult { uses_client_composition, uses_device_composition, flip_client_target }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hwc::{DeviceCompositionResult, PresentFences};

    struct AllDeviceHwc;
    impl HardwareComposer for AllDeviceHwc {
        fn set_layers(&mut self, _layers: &[HwcLayerState]) {}
        fn validate(
            &mut self,
            _needs_client_composition: bool,
        ) -> Result<DeviceCompositionResult, crate::error::HwcQueryFailed> {
            Ok(DeviceCompositionResult::default())
        }
        fn present(&mut self) -> PresentFences {
            PresentFences::default()
        }
    }

    struct RejectingHwc;
    impl HardwareComposer for RejectingHwc {
        fn set_layers(&mut self, _layers: &[HwcLayerState]) {}
        fn validate(
            &mut self,
            _needs_client_composition: bool,
        ) -> Result<DeviceCompositionResult, crate::error::HwcQueryFailed> {
            Err(crate::error::HwcQueryFailed)
        }
        fn present(&mut self) -> PresentFences {
            PresentFences::default()
        }
    }

    struct RequestingHwc;
    impl HardwareComposer for RequestingHwc {
        fn set_layers(&mut self, _layers: &[HwcLayerState]) {}
        fn validate(
            &mut self,
            _needs_client_composition: bool,
        ) -> Result<DeviceCompositionResult, crate::error::HwcQueryFailed> {
            Ok(DeviceCompositionResult {
                changed_types: Vec::new(),
                display_requests: DisplayRequests::FLIP_CLIENT_TARGET,
                layer_requests: vec![crate::hwc::LayerRequest {
                    layer_id: crate::ids::LayerId(0),
                    clear_client_target: true,
                }],
            })
        }
        fn present(&mut self) -> PresentFences {
            PresentFences::default()
        }
    }

    #[test]
    fn all_device_validate_result_yields_no_client_composition() {
        let mut layers = vec![OutputLayer::new_for_test()];
        let inputs = vec![StrategyInput { force_client: None }];
        let mut hwc = AllDeviceHwc;
        let result = choose_strategy(&mut layers, &inputs, &mut hwc);
        assert!(!result.uses_client_composition);
        assert!(result.uses_device_composition);
        assert_eq!(layers[0].composition_type(), CompositionType::Device);
    }

    #[test]
    fn hwc_query_failure_forces_all_client_composition() {
        let mut layers = vec![OutputLayer::new_for_test()];
        let inputs = vec![StrategyInput { force_client: None }];
        let mut hwc = RejectingHwc;
        let result = choose_strategy(&mut layers, &inputs, &mut hwc);
        assert!(result.uses_client_composition);
        assert!(!result.uses_device_composition);
        assert_eq!(layers[0].composition_type(), CompositionType::Client);
    }

    #[test]
    fn explicit_force_client_is_never_overridden_by_validate() {
        let mut layers = vec![OutputLayer::new_for_test()];
        let inputs = vec![StrategyInput { force_client: Some(ForceClientReason::ExplicitDebugOverride) }];
        let mut hwc = AllDeviceHwc;
        let result = choose_strategy(&mut layers, &inputs, &mut hwc);
        assert!(result.uses_client_composition);
        assert!(layers[0].forced_client_composition());
    }

    #[test]
    fn layer_requests_and_display_requests_are_applied_back() {
        let mut layers = vec![OutputLayer::new_for_test()];
        let inputs = vec![StrategyInput { force_client: None }];
        let mut hwc = RequestingHwc;
        let result = choose_strategy(&mut layers, &inputs, &mut hwc);
        assert!(result.flip_client_target);
        assert!(layers[0].clear_client_target());
    }

    #[test]
    fn stale_clear_client_target_is_cleared_when_not_requested_again() {
        let mut layers = vec![OutputLayer::new_for_test()];
        layers[0].set_clear_client_target(true);
        let inputs = vec![StrategyInput { force_client: None }];
        let mut hwc = AllDeviceHwc;
        choose_strategy(&mut layers, &inputs, &mut hwc);
        assert!(!layers[0].clear_client_target());
    }
}
