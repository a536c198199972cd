/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Lightweight per-frame counters, cheap enough to update unconditionally
//! and useful for a developer overlay or periodic log line, without
//! pulling in a full metrics/histogram stack.

/// Running counts since this compositor instance started. All counters
/// saturate rather than wrap on overflow, since they're meant to be read
/// occasionally, not reset every frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositionStats {
    pub frames_composited: u64,
    pub frames_all_device: u64,
    pub frames_all_client: u64,
    pub frames_mixed: u64,
    pub hwc_validate_failures: u64,
    pub client_dequeue_failures: u64,
}

impl CompositionStats {
    pub fn record_frame(&mut self, client_layer_count: usize, device_layer_count: usize) {
        self.frames_composited = self.frames_composited.saturating_add(1);
        match (client_layer_count, device_layer_count) {
            (0, _) => self.frames_all_device = self.frames_all_device.saturating_add(1),
            (_, 0) => self.frames_all_client = self.frames_all_client.saturating_add(1),
            _ => self.frames_mixed = self.frames_mixed.saturating_add(1),
        }
    }

    pub fn record_hwc_validate_failure(&mut self) {
        self.hwc_validate_failures = self.hwc_validate_failures.saturating_add(1);
    }

    pub fn record_client_dequeue_failure(&mut self) {
        self.client_dequeue_failures = self.client_dequeue_failures.saturating_add(1);
    }

    pub fn dump_state(&self) -> String {
        format!(
            "frames={} all_device={} all_client={} mixed={} hwc_validate_failures={} dequeue_failures={}",
            self.frames_composited,
            self.frames_all_device,
            self.frames_all_client,
            self.frames_mixed,
            self.hwc_validate_failures,
            self.client_dequeue_failures,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_frame_buckets_by_composition_mix() {
        let mut stats = CompositionStats::default();
        stats.record_frame(0, 3);
        stats.record_frame(3, 0);
        stats.record_frame(2, 2);
        assert_eq!(stats.frames_all_device, 1);
        assert_eq!(stats.frames_all_client, 1);
        assert_eq!(stats.frames_mixed, 1);
        assert_eq!(stats.frames_composited, 3);
    }

    #[test]
    fn all_layers_absent_counts_as_all_device() {
        let mut stats = CompositionStats::default();
        stats.record_frame(0, 0);
        assert_eq!(stats.frames_all_device, 1);
    }
}
