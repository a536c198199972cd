/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Posts a prepared frame to the hardware composer and distributes the
//! fences it hands back: a present fence for the output as a whole, a
//! release fence per layer so its front-end can reuse the buffer it just
//! displayed, and the same present fence to every layer that dropped off
//! the output this frame.

use crate::hwc::{Fence, HardwareComposer};
use crate::output::Output;
use crate::output_layer::CompositionType;
use crate::render_backend::RenderSurface;

/// Everything posting needs that a bare `HardwareComposer::present()`
/// call doesn't already return.
pub struct PresentInputs<'a> {
    pub client_target_acquire_fence: Option<Fence>,
    pub client_composition_happened: bool,
    pub render_surface: &'a mut dyn RenderSurface,
}

/// Result of posting one output's frame.
pub struct PresentResult {
    pub present_fence: Option<Fence>,
}

/// Commits the frame prepared on `output`'s hardware composer, then walks
/// every layer on the output delivering a release fence, and notifies any
/// layer that dropped off the output this frame with the present fence.
///
/// A device layer's release fence is merged with this frame's client
/// target acquire fence whenever client composition happened at all: even
/// a purely device-composited layer sits behind the same client target
/// plane, so its buffer isn't safe to reuse until that plane's draw has
/// also finished. A client-composited layer's own "release" is the
/// client target's release fence on its own, with no per-layer hwc fence
/// to merge against.
pub fn post_framebuffer(
    output: &mut Output,
    hwc: &mut dyn HardwareComposer,
    inputs: PresentInputs,
    registry: &mut dyn crate::layer::LayerRegistry,
) -> PresentResult {
    let fences = hwc.present();

    let client_release_fence = inputs.client_target_acquire_fence.unwrap_or(Fence::NONE);

    for layer in output.output_layers_back_to_front() {
        let handle = layer.layer_handle();
        let per_layer_fence = fences
            .per_layer_release_fences
            .iter()
            .find(|(id, _)| *id == layer.layer_id())
            .map(|(_, fence)| *fence)
            .unwrap_or(Fence::NONE);

        let release_fence = if layer.composition_type() == CompositionType::Client {
            client_release_fence
        } else if inputs.client_composition_happened {
            per_layer_fence.merge(client_release_fence)
        } else {
            per_layer_fence
        };
        deliver_fence(registry, handle, release_fence);
    }

    output.prune_released_layers(registry);
    let present_fence = fences.present_fence.unwrap_or(Fence::NONE);
    for handle in output.take_released_layers() {
        deliver_fence(registry, handle, present_fence);
    }

    PresentResult { present_fence: fences.present_fence }
}

fn deliver_fence(registry: &mut dyn crate::layer::LayerRegistry, handle: crate::ids::LayerHandle, fence: Fence) {
    if let Some(front_end) = registry.get_mut(handle) {
        front_end.on_layer_displayed(fence);
    }
}

/// For the "developer repaint-flash" debug option: the client target's
/// acquire fence from the repaint-flash overlay draw is deliberately
/// discarded rather than waited on by anything, since nothing downstream
/// reads the overlay's pixels as real content.
pub fn discard_repaint_flash_fence(_fence: Fence) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hwc::{DeviceCompositionResult, HwcLayerState, PresentFences};
    use crate::ids::{LayerHandle, LayerId, OutputId};
    use crate::layer::{
        LatchSubset, LayerDrawRequest, LayerDrawSettings, LayerFeState, LayerFrontEnd, LayerRegistry,
    };
    use crate::region::{LayerTransform, Region};
    use euclid::Box2D;

    struct FakeHwc {
        fences: PresentFences,
    }
    impl HardwareComposer for FakeHwc {
        fn set_layers(&mut self, _layers: &[HwcLayerState]) {}
        fn validate(
            &mut self,
            _needs_client_composition: bool,
        ) -> Result<DeviceCompositionResult, crate::error::HwcQueryFailed> {
            Ok(DeviceCompositionResult::default())
        }
        fn present(&mut self) -> PresentFences {
            self.fences.clone()
        }
    }

    struct RecordingLayer {
        state: LayerFeState,
        last_release_fence: Option<Fence>,
    }
    impl LayerFrontEnd for RecordingLayer {
        fn latch_composition_state(&mut self, _subset: LatchSubset) {}
        fn prepare_client_composition(&self, _settings: &LayerDrawSettings) -> Option<LayerDrawRequest> {
            None
        }
        fn on_layer_displayed(&mut self, release_fence: Fence) {
            self.last_release_fence = Some(release_fence);
        }
        fn state(&self) -> &LayerFeState {
            &self.state
        }
    }

    struct FakeSurface;
    impl RenderSurface for FakeSurface {
        fn dequeue(&mut self) -> Result<(), crate::error::DequeueFailed> {
            Ok(())
        }
        fn acquire_fence(&self) -> Option<Fence> {
            None
        }
        fn queue(&mut self, _ready_fence: Fence) {}
        fn set_protected(&mut self, _enabled: bool) {}
    }

    fn stub_state() -> LayerFeState {
        LayerFeState {
            bounds: Box2D::zero(),
            transform: LayerTransform::identity_translated(euclid::vec2(0, 0)),
            dataspace: crate::color_profile::Dataspace::Srgb,
            is_opaque: true,
            transparent_region_hint: Region::empty(),
            is_visible: true,
            content_dirty: false,
            force_client_composition: false,
            has_protected_content: false,
            layer_stack_id: 0,
            internal_only: false,
            needs_filtering: false,
        }
    }

    struct OneLayerRegistry(RecordingLayer);
    impl LayerRegistry for OneLayerRegistry {
        fn get(&self, handle: LayerHandle) -> Option<&dyn LayerFrontEnd> {
            (handle.id == LayerId(1)).then_some(&self.0 as &dyn LayerFrontEnd)
        }
        fn get_mut(&mut self, handle: LayerHandle) -> Option<&mut dyn LayerFrontEnd> {
            (handle.id == LayerId(1)).then_some(&mut self.0 as &mut dyn LayerFrontEnd)
        }
    }

    #[test]
    fn client_layer_release_fence_comes_from_current_frame_client_acquire_fence() {
        let mut output = Output::new(OutputId(0), Box2D::zero());
        let handle = LayerHandle { id: LayerId(1), generation: 0 };
        output.ensure_output_layer(handle, Box2D::zero());
        output.output_layer_mut(handle).unwrap().set_composition_type(CompositionType::Client);

        let mut hwc = FakeHwc { fences: PresentFences::default() };
        let mut registry = OneLayerRegistry(RecordingLayer { state: stub_state(), last_release_fence: None });
        let mut surface = FakeSurface;
        let inputs = PresentInputs {
            client_target_acquire_fence: Some(Fence(7)),
            client_composition_happened: true,
            render_surface: &mut surface,
        };
        post_framebuffer(&mut output, &mut hwc, inputs, &mut registry);
        assert_eq!(registry.0.last_release_fence, Some(Fence(7)));
    }

    #[test]
    fn device_layer_gets_its_own_fence_when_no_client_composition_happened() {
        let mut output = Output::new(OutputId(0), Box2D::zero());
        let handle = LayerHandle { id: LayerId(1), generation: 0 };
        output.ensure_output_layer(handle, Box2D::zero());

        let mut hwc = FakeHwc {
            fences: PresentFences {
                present_fence: Some(Fence(1)),
                per_layer_release_fences: vec![(LayerId(1), Fence(99))],
            },
        };
        let mut registry = OneLayerRegistry(RecordingLayer { state: stub_state(), last_release_fence: None });
        let mut surface = FakeSurface;
        let inputs = PresentInputs {
            client_target_acquire_fence: None,
            client_composition_happened: false,
            render_surface: &mut surface,
        };
        let result = post_framebuffer(&mut output, &mut hwc, inputs, &mut registry);
        assert_eq!(registry.0.last_release_fence, Some(Fence(99)));
        assert_eq!(result.present_fence, Some(Fence(1)));
    }

    #[test]
    fn device_layer_fence_is_merged_with_client_target_when_client_composition_also_happened() {
        let mut output = Output::new(OutputId(0), Box2D::zero());
        let handle = LayerHandle { id: LayerId(1), generation: 0 };
        output.ensure_output_layer(handle, Box2D::zero());

        let mut hwc = FakeHwc {
            fences: PresentFences {
                present_fence: Some(Fence(1)),
                per_layer_release_fences: vec![(LayerId(1), Fence(9))],
            },
        };
        let mut registry = OneLayerRegistry(RecordingLayer { state: stub_state(), last_release_fence: None });
        let mut surface = FakeSurface;
        let inputs = PresentInputs {
            client_target_acquire_fence: Some(Fence(20)),
            client_composition_happened: true,
            render_surface: &mut surface,
        };
        post_framebuffer(&mut output, &mut hwc, inputs, &mut registry);
        assert_eq!(registry.0.last_release_fence, Some(Fence(9).merge(Fence(20))));
    }

    #[test]
    fn released_layer_is_notified_with_the_present_fence() {
        let mut output = Output::new(OutputId(0), Box2D::zero());
        let handle = LayerHandle { id: LayerId(1), generation: 0 };
        output.ensure_output_layer(handle, Box2D::zero());
        output.remove_output_layer(handle);

        let mut hwc = FakeHwc {
            fences: PresentFences { present_fence: Some(Fence(55)), per_layer_release_fences: Vec::new() },
        };
        let mut registry = OneLayerRegistry(RecordingLayer { state: stub_state(), last_release_fence: None });
        let mut surface = FakeSurface;
        let inputs = PresentInputs {
            client_target_acquire_fence: None,
            client_composition_happened: false,
            render_surface: &mut surface,
        };
        post_framebuffer(&mut output, &mut hwc, inputs, &mut registry);
        assert_eq!(registry.0.last_release_fence, Some(Fence(55)));
        assert!(output.take_released_layers().is_empty());
    }

    #[test]
    fn pruning_drops_a_released_handle_whose_front_end_already_vanished() {
        let mut output = Output::new(OutputId(0), Box2D::zero());
        let gone = LayerHandle { id: LayerId(404), generation: 0 };
        output.ensure_output_layer(gone, Box2D::zero());
        output.remove_output_layer(gone);

        let mut hwc = FakeHwc {
            fences: PresentFences { present_fence: Some(Fence(1)), per_layer_release_fences: Vec::new() },
        };
        let mut registry = OneLayerRegistry(RecordingLayer { state: stub_state(), last_release_fence: None });
        let mut surface = FakeSurface;
        let inputs = PresentInputs {
            client_target_acquire_fence: None,
            client_composition_happened: false,
            render_surface: &mut surface,
        };
        // Should not panic trying to notify a front-end that was never there.
        post_framebuffer(&mut output, &mut hwc, inputs, &mut registry);
        assert!(registry.0.last_release_fence.is_none());
    }
}
