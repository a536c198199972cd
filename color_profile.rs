/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Color-mode/dataspace/render-intent selection. The actual pixel math
//! of color conversion is out of scope here; this module only picks
//! which mode/dataspace/intent to ask the display color profile to
//! resolve, and reads the answer back.

use crate::output_layer::OutputLayer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dataspace {
    Unknown,
    Srgb,
    DisplayP3,
    DisplayBt2020,
    Bt2020Pq,
    Bt2020Hlg,
}

impl Dataspace {
    fn is_bt2020_family(self) -> bool {
        matches!(self, Dataspace::DisplayBt2020 | Dataspace::Bt2020Pq | Dataspace::Bt2020Hlg)
    }

    fn is_hdr(self) -> bool {
        matches!(self, Dataspace::Bt2020Pq | Dataspace::Bt2020Hlg)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Native,
    DisplayP3,
    DisplayBt2020,
    Srgb,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderIntent {
    Colorimetric,
    Enhance,
    ToneMapColorimetric,
    ToneMapEnhance,
    /// A vendor-specific intent value, passed through unmodified.
    Vendor(i32),
}

#[cfg_attr(feature = "config-file", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSetting {
    Unmanaged,
    Managed,
    Enhanced,
    Vendor(i32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorProfileRequest {
    pub color_mode: ColorMode,
    pub dataspace: Dataspace,
    pub render_intent: RenderIntent,
}

/// The result of resolving a `(dataspace, intent)` request against the
/// display's actual capabilities. Consumed only — the pixel math behind
/// this call is out of scope here.
pub trait DisplayColorProfile {
    fn has_legacy_hdr_support(&self, dataspace: Dataspace) -> bool;

    fn resolve(
        &self,
        dataspace: Dataspace,
        intent: RenderIntent,
    ) -> (ColorMode, Dataspace, RenderIntent);
}

const COLOR_SPACE_AGNOSTIC_DATASPACE: Dataspace = Dataspace::Unknown;

/// Picks `(colorMode, dataspace, renderIntent)` for this frame: scans the
/// output-layers for the widest gamut and any HDR content, applies an
/// optional forced color mode, and only promotes past sRGB/legacy HDR
/// support when the display profile can't already handle it.
pub fn choose_color_profile(
    setting: ColorSetting,
    force_output_color_mode: Option<ColorMode>,
    output_layers: &[OutputLayer],
    profile: &dyn DisplayColorProfile,
) -> ColorProfileRequest {
    if setting == ColorSetting::Unmanaged {
        return ColorProfileRequest {
            color_mode: ColorMode::Native,
            dataspace: COLOR_SPACE_AGNOSTIC_DATASPACE,
            render_intent: RenderIntent::Colorimetric,
        };
    }

    let mut best_dataspace = Dataspace::Srgb;
    let mut hdr_dataspace = None;
    let mut hdr_forces_client_composition = false;
    for layer in output_layers {
        let ds = layer.dataspace();
        if ds.is_bt2020_family() && best_dataspace != Dataspace::DisplayBt2020 {
            best_dataspace = Dataspace::DisplayBt2020;
        } else if ds == Dataspace::DisplayP3 && best_dataspace == Dataspace::Srgb {
            best_dataspace = Dataspace::DisplayP3;
        }

        if ds.is_hdr() {
            // PQ wins over HLG when mixed: once set to Pq, HLG layers
            // seen afterward must not downgrade it.
            hdr_dataspace = Some(match (hdr_dataspace, ds) {
                (Some(Dataspace::Bt2020Pq), _) => Dataspace::Bt2020Pq,
                (_, Dataspace::Bt2020Pq) => Dataspace::Bt2020Pq,
                _ => ds,
            });
            if layer.uses_client_composition() {
                hdr_forces_client_composition = true;
            }
        }
    }

    if let Some(forced) = force_output_color_mode {
        best_dataspace = match forced {
            ColorMode::DisplayBt2020 => Dataspace::DisplayBt2020,
            ColorMode::DisplayP3 => Dataspace::DisplayP3,
            ColorMode::Srgb | ColorMode::Native => best_dataspace,
        };
    }

    if let Some(hdr) = hdr_dataspace {
        if !profile.has_legacy_hdr_support(hdr) && !hdr_forces_client_composition {
            best_dataspace = hdr;
        }
    }

    let is_hdr = hdr_dataspace.is_some();
    let intent = match setting {
        ColorSetting::Unmanaged | ColorSetting::Managed => {
            if is_hdr { RenderIntent::ToneMapColorimetric } else { RenderIntent::Colorimetric }
        },
        ColorSetting::Enhanced => {
            if is_hdr { RenderIntent::ToneMapEnhance } else { RenderIntent::Enhance }
        },
        ColorSetting::Vendor(v) => RenderIntent::Vendor(v),
    };

    let (color_mode, dataspace, render_intent) = profile.resolve(best_dataspace, intent);
    ColorProfileRequest { color_mode, dataspace, render_intent }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProfile {
        has_legacy_hdr: bool,
    }

    impl DisplayColorProfile for FakeProfile {
        fn has_legacy_hdr_support(&self, _dataspace: Dataspace) -> bool {
            self.has_legacy_hdr
        }

        fn resolve(
            &self,
            dataspace: Dataspace,
            intent: RenderIntent,
        ) -> (ColorMode, Dataspace, RenderIntent) {
            (ColorMode::Native, dataspace, intent)
        }
    }

    #[test]
    fn unmanaged_is_always_native_colorimetric() {
        let profile = FakeProfile { has_legacy_hdr: true };
        let request = choose_color_profile(ColorSetting::Unmanaged, None, &[], &profile);
        assert_eq!(request.color_mode, ColorMode::Native);
        assert_eq!(request.dataspace, Dataspace::Unknown);
        assert_eq!(request.render_intent, RenderIntent::Colorimetric);
    }

    #[test]
    fn hdr_without_legacy_support_promotes_best_dataspace() {
        let profile = FakeProfile { has_legacy_hdr: false };
        let mut layer = OutputLayer::new_for_test();
        layer.set_dataspace_for_test(Dataspace::Bt2020Pq, false);
        let request = choose_color_profile(ColorSetting::Managed, None, &[layer], &profile);
        assert_eq!(request.dataspace, Dataspace::Bt2020Pq);
        assert_eq!(request.render_intent, RenderIntent::ToneMapColorimetric);
    }

    #[test]
    fn hdr_with_legacy_support_does_not_promote() {
        let profile = FakeProfile { has_legacy_hdr: true };
        let mut layer = OutputLayer::new_for_test();
        layer.set_dataspace_for_test(Dataspace::Bt2020Pq, false);
        let request = choose_color_profile(ColorSetting::Managed, None, &[layer], &profile);
        assert_eq!(request.dataspace, Dataspace::Srgb);
    }

    #[test]
    fn pq_wins_over_hlg_when_mixed() {
        let profile = FakeProfile { has_legacy_hdr: false };
        let mut hlg = OutputLayer::new_for_test();
        hlg.set_dataspace_for_test(Dataspace::Bt2020Hlg, false);
        let mut pq = OutputLayer::new_for_test();
        pq.set_dataspace_for_test(Dataspace::Bt2020Pq, false);
        let request =
            choose_color_profile(ColorSetting::Managed, None, &[hlg, pq], &profile);
        assert_eq!(request.dataspace, Dataspace::Bt2020Pq);
    }
}
