/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Builds the draw request list for layers assigned to client
//! composition, then drives a [`RenderBackend`]/[`RenderSurface`] pair
//! to turn that list into a filled buffer and a ready fence.

use smallvec::SmallVec;

use crate::color_profile::Dataspace;
use crate::hwc::Fence;
use crate::layer::{LatchSubset, LayerDrawRequest, LayerDrawSettings, LayerRegistry};
use crate::output::ColorTransformMatrix;
use crate::output_layer::{CompositionType, OutputLayer};
use crate::region::Region;
use crate::render_backend::{DisplaySettings, RenderBackend, RenderSurface};
use crate::units::OutputSpace;
use euclid::Box2D;

/// Everything about the output this frame's client composition pass
/// needs that doesn't live on an individual [`OutputLayer`].
pub struct ClientCompositionContext {
    pub output_bounds: Box2D<i32, OutputSpace>,
    pub needs_filtering: bool,
    pub is_secure: bool,
    pub dataspace: Dataspace,
    pub max_luminance: f32,
    pub color_transform: Option<ColorTransformMatrix>,
}

/// What a client composition pass produced for this frame.
pub struct ClientCompositionResult {
    /// The fence the renderer returned for the draw commands it issued.
    /// Absent if there was nothing to draw (no client layers this frame).
    pub ready_fence: Option<Fence>,
}

/// A small debug aid (non-production repaint-flash): every client
/// composition region gets drawn once more as a solid color so a
/// developer can visually spot over-drawing. The fence from this extra
/// draw is not tracked separately; it's folded into the same batch as
/// the real content.
pub fn repaint_flash_color() -> [f32; 4] {
    [1.0, 0.0, 1.0, 0.3]
}

/// Latches every client-composited layer's drawable content before
/// building draw requests, so `prepare_client_composition` always sees
/// state from the same point in time.
pub fn latch_client_layers(output_layers: &[OutputLayer], registry: &mut dyn LayerRegistry) {
    for output_layer in output_layers {
        if output_layer.composition_type() != CompositionType::Client {
            continue;
        }
        if let Some(front_end) = registry.get_mut(output_layer.layer_handle()) {
            front_end.latch_composition_state(LatchSubset::Content);
        }
    }
}

/// Client-composites every output-layer currently assigned
/// [`CompositionType::Client`] into `surface`, via `backend`.
///
/// Layers fully covered by opaque content above them are skipped
/// entirely: their `covered_region` already accounts for every later
/// (closer to viewer) opaque layer, so nothing drawn for them could ever
/// be visible. The first client layer in z-order never has its target
/// cleared on its own request (`clearClientComposition`): the target
/// starts out cleared already, so the device composer's request to clear
/// it only matters for a later layer punching a hole through what an
/// earlier client layer already drew.
pub fn compose_client_layers(
    output_layers: &[OutputLayer],
    registry: &dyn LayerRegistry,
    ctx: &ClientCompositionContext,
    backend: &mut dyn RenderBackend,
    surface: &mut dyn RenderSurface,
    repaint_flash: bool,
) -> Result<ClientCompositionResult, crate::error::DequeueFailed> {
    let client_layers: SmallVec<[&OutputLayer; 8]> = output_layers
        .iter()
        .filter(|l| l.composition_type() == CompositionType::Client)
        .collect();

    if client_layers.is_empty() {
        return Ok(ClientCompositionResult { ready_fence: None });
    }

    surface.dequeue()?;

    let has_protected_content = client_layers.iter().any(|l| {
        registry.get(l.layer_handle()).map(|f| f.state().has_protected_content).unwrap_or(false)
    });
    let protected_context = has_protected_content && backend.supports_protected_content();
    if has_protected_content && !protected_context {
        log::warn!("client composition includes protected content but backend can't render it");
    }
    if protected_context {
        backend.set_protected_context(true);
        surface.set_protected(true);
    }

    let expensive_rendering = ctx.dataspace == Dataspace::DisplayP3;
    backend.set_expensive_rendering_expected(expensive_rendering);

    let mut requests: Vec<LayerDrawRequest> = Vec::new();
    for (index, output_layer) in client_layers.iter().enumerate() {
        let front_end = match registry.get(output_layer.layer_handle()) {
            Some(front_end) => front_end,
            None => {
                log::debug!(
                    "layer {:?} vanished before client composition; skipping",
                    output_layer.layer_id()
                );
                continue;
            },
        };

        let clip = output_layer.output_space_visible_region().clone();
        let clear_client_composition = output_layer.clear_client_target() && output_layer.is_opaque() && index != 0;

        if clear_client_composition {
            requests.push(LayerDrawRequest {
                clip,
                solid_color: Some([0.0, 0.0, 0.0, 0.0]),
                disable_blending: true,
                source_layer: None,
            });
            continue;
        }

        let settings = LayerDrawSettings {
            clip,
            use_identity_transform: false,
            needs_filtering: front_end.state().needs_filtering || ctx.needs_filtering,
            is_secure: ctx.is_secure,
            supports_protected_content: backend.supports_protected_content(),
            clear_region: output_layer.covered_region().clone(),
        };

        if let Some(request) = front_end.prepare_client_composition(&settings) {
            requests.push(request);
        }
    }

    if repaint_flash {
        for output_layer in &client_layers {
            requests.push(LayerDrawRequest {
                clip: Region::from_rect(output_layer.screen_bounds()),
                solid_color: Some(repaint_flash_color()),
                disable_blending: false,
                source_layer: None,
            });
        }
    }

    let display_settings = DisplaySettings {
        clip: ctx.output_bounds,
        output_dataspace: ctx.dataspace,
        max_luminance: ctx.max_luminance,
        color_transform: ctx.color_transform,
    };
    let ready_fence = backend.draw(&display_settings, &requests);
    surface.queue(ready_fence);

    if protected_context {
        backend.set_protected_context(false);
        surface.set_protected(false);
    }

    Ok(ClientCompositionResult { ready_fence: Some(ready_fence) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{LayerHandle, LayerId};
    use crate::layer::{LayerFeState, LayerFrontEnd};
    use crate::region::LayerTransform;

    struct StubLayer {
        state: LayerFeState,
        draws: bool,
    }

    impl LayerFrontEnd for StubLayer {
        fn latch_composition_state(&mut self, _subset: LatchSubset) {}

        fn prepare_client_composition(
            &self,
            settings: &LayerDrawSettings,
        ) -> Option<LayerDrawRequest> {
            self.draws.then(|| LayerDrawRequest {
                clip: settings.clip.clone(),
                solid_color: None,
                disable_blending: false,
                source_layer: None,
            })
        }

        fn on_layer_displayed(&mut self, _release_fence: crate::hwc::Fence) {}

        fn state(&self) -> &LayerFeState {
            &self.state
        }
    }

    fn stub_state() -> LayerFeState {
        LayerFeState {
            bounds: euclid::Box2D::zero(),
            transform: LayerTransform::identity_translated(euclid::vec2(0, 0)),
            dataspace: Dataspace::Srgb,
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

    fn stub_ctx() -> ClientCompositionContext {
        ClientCompositionContext {
            output_bounds: euclid::Box2D::zero(),
            needs_filtering: false,
            is_secure: false,
            dataspace: Dataspace::Srgb,
            max_luminance: 500.0,
            color_transform: None,
        }
    }

    struct OneLayerRegistry(StubLayer);
    impl LayerRegistry for OneLayerRegistry {
        fn get(&self, handle: LayerHandle) -> Option<&dyn LayerFrontEnd> {
            (handle.id == LayerId(0)).then_some(&self.0 as &dyn LayerFrontEnd)
        }
        fn get_mut(&mut self, handle: LayerHandle) -> Option<&mut dyn LayerFrontEnd> {
            (handle.id == LayerId(0)).then_some(&mut self.0 as &mut dyn LayerFrontEnd)
        }
    }

    struct RecordingBackend {
        last_draw_count: usize,
        protected_context: bool,
        expensive_rendering: bool,
    }
    impl RenderBackend for RecordingBackend {
        fn draw(&mut self, _settings: &DisplaySettings, requests: &[LayerDrawRequest]) -> Fence {
            self.last_draw_count = requests.len();
            Fence(42)
        }
        fn supports_protected_content(&self) -> bool {
            true
        }
        fn set_protected_context(&mut self, enabled: bool) {
            self.protected_context = enabled;
        }
        fn set_expensive_rendering_expected(&mut self, expected: bool) {
            self.expensive_rendering = expected;
        }
    }

    fn recording_backend() -> RecordingBackend {
        RecordingBackend { last_draw_count: 0, protected_context: false, expensive_rendering: false }
    }

    struct FakeSurface {
        protected: bool,
    }
    impl RenderSurface for FakeSurface {
        fn dequeue(&mut self) -> Result<(), crate::error::DequeueFailed> {
            Ok(())
        }
        fn acquire_fence(&self) -> Option<Fence> {
            None
        }
        fn queue(&mut self, _ready_fence: Fence) {}
        fn set_protected(&mut self, enabled: bool) {
            self.protected = enabled;
        }
    }

    #[test]
    fn no_client_layers_skips_dequeue_and_draw_entirely() {
        let registry = OneLayerRegistry(StubLayer { state: stub_state(), draws: true });
        let mut backend = recording_backend();
        let mut surface = FakeSurface { protected: false };
        let result =
            compose_client_layers(&[], &registry, &stub_ctx(), &mut backend, &mut surface, false).unwrap();
        assert!(result.ready_fence.is_none());
        assert_eq!(backend.last_draw_count, 0);
    }

    #[test]
    fn vanished_layer_is_skipped_without_failing_the_frame() {
        let registry = OneLayerRegistry(StubLayer { state: stub_state(), draws: true });
        // The registry only serves LayerId(0); use a handle it doesn't
        // recognize to force a miss.
        let mut output_layers =
            vec![OutputLayer::new(LayerHandle { id: LayerId(99), generation: 0 }, euclid::Box2D::zero())];
        output_layers[0].set_composition_type(CompositionType::Client);
        let mut backend = recording_backend();
        let mut surface = FakeSurface { protected: false };
        let result = compose_client_layers(
            &output_layers,
            &registry,
            &stub_ctx(),
            &mut backend,
            &mut surface,
            false,
        )
        .unwrap();
        assert!(result.ready_fence.is_some());
        assert_eq!(backend.last_draw_count, 0);
    }

    #[test]
    fn display_p3_dataspace_flags_expensive_rendering() {
        let registry = OneLayerRegistry(StubLayer { state: stub_state(), draws: true });
        let mut output_layers =
            vec![OutputLayer::new(LayerHandle { id: LayerId(0), generation: 0 }, euclid::Box2D::zero())];
        output_layers[0].set_composition_type(CompositionType::Client);
        let mut backend = recording_backend();
        let mut surface = FakeSurface { protected: false };
        let mut ctx = stub_ctx();
        ctx.dataspace = Dataspace::DisplayP3;
        compose_client_layers(&output_layers, &registry, &ctx, &mut backend, &mut surface, false).unwrap();
        assert!(backend.expensive_rendering);
    }

    #[test]
    fn clear_client_composition_on_a_later_opaque_layer_emits_a_transparent_fill() {
        let registry = OneLayerRegistry(StubLayer { state: stub_state(), draws: true });
        let mut first =
            OutputLayer::new(LayerHandle { id: LayerId(0), generation: 0 }, euclid::Box2D::zero());
        first.set_composition_type(CompositionType::Client);
        let mut second =
            OutputLayer::new(LayerHandle { id: LayerId(0), generation: 1 }, euclid::Box2D::zero());
        second.set_composition_type(CompositionType::Client);
        second.set_is_opaque(true);
        second.set_clear_client_target(true);
        let mut backend = recording_backend();
        let mut surface = FakeSurface { protected: false };
        compose_client_layers(&[first, second], &registry, &stub_ctx(), &mut backend, &mut surface, false)
            .unwrap();
        // first layer draws normally, second becomes a clear instead of calling prepare_client_composition
        assert_eq!(backend.last_draw_count, 2);
    }
}
