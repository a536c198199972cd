/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tunables for the refresh-rate scheduler's debounce timers and for a
//! handful of composition-time switches, with defaults matching typical
//! device behavior. Behind the `config-file` feature, these can be
//! loaded from a JSON file instead of hardcoded.

use std::time::Duration;

use crate::color_profile::ColorSetting;

#[cfg_attr(feature = "config-file", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CompositorConfig {
    /// How long a display must see no layer activity before the
    /// scheduler drops it to the minimum supported refresh rate.
    #[cfg_attr(feature = "config-file", serde(with = "duration_ms"))]
    pub idle_timer_timeout: Duration,
    /// How long after the last touch event before touch-boost expires.
    #[cfg_attr(feature = "config-file", serde(with = "duration_ms"))]
    pub touch_timer_timeout: Duration,
    /// How long a display stays at its post-power-on boosted rate.
    #[cfg_attr(feature = "config-file", serde(with = "duration_ms"))]
    pub display_power_timer_timeout: Duration,
    /// Number of recent present timestamps the content-rate estimator
    /// keeps per layer.
    pub layer_history_size: usize,
    pub default_color_setting: ColorSetting,
    /// Draw an extra solid-color pass over every client-composited
    /// region each frame, to visualize overdraw during development.
    pub repaint_flash: bool,
    /// Whether the display can actually switch refresh rates at all; a
    /// display whose driver reports a single fixed mode should set this
    /// to `false` so the scheduler never requests a rate change it can't
    /// honor.
    pub refresh_rate_switching_supported: bool,
    /// When content demands HDR but the device-wide setting prefers
    /// holding the default refresh rate over chasing HDR content's
    /// cadence (e.g. to avoid a visible mode switch), set this to `true`.
    pub force_hdr_content_to_default_refresh_rate: bool,
    /// Whether the idle timer runs in the kernel (DRM `idle_timer`
    /// property) instead of userspace. When enabled, idle-timer
    /// transitions drive the hardware-vsync resync state machine instead
    /// of the plain idle/active scheduler state.
    pub kernel_idle_timer_enabled: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        CompositorConfig {
            idle_timer_timeout: Duration::from_millis(150),
            touch_timer_timeout: Duration::from_millis(500),
            display_power_timer_timeout: Duration::from_secs(2),
            layer_history_size: 16,
            default_color_setting: ColorSetting::Managed,
            repaint_flash: false,
            refresh_rate_switching_supported: true,
            force_hdr_content_to_default_refresh_rate: false,
            kernel_idle_timer_enabled: false,
        }
    }
}

#[cfg(feature = "config-file")]
impl CompositorConfig {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(feature = "config-file")]
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_nonzero_debounce_timeouts() {
        let config = CompositorConfig::default();
        assert!(config.idle_timer_timeout > Duration::ZERO);
        assert!(config.touch_timer_timeout > Duration::ZERO);
        assert!(config.display_power_timer_timeout > Duration::ZERO);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn config_round_trips_through_json() {
        let config = CompositorConfig::default();
        let json = config.to_json_string().unwrap();
        let parsed = CompositorConfig::from_json_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}
