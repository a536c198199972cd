/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tracks each layer's recent present timestamps to estimate the
//! content rate it's actually updating at, so the scheduler can ask for
//! a refresh rate that matches real content instead of always picking
//! the display's maximum.

use std::collections::VecDeque;
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::ids::LayerId;

/// Recent present times for one layer, oldest first, capped at the
/// configured history size.
struct LayerTimestamps {
    presents: VecDeque<Duration>,
    capacity: usize,
}

impl LayerTimestamps {
    fn new(capacity: usize) -> Self {
        LayerTimestamps { presents: VecDeque::with_capacity(capacity), capacity }
    }

    fn record(&mut self, timestamp: Duration) {
        if self.presents.len() == self.capacity {
            self.presents.pop_front();
        }
        self.presents.push_back(timestamp);
    }

    /// Average interval between consecutive presents, or `None` with
    /// fewer than two samples.
    fn average_interval(&self) -> Option<Duration> {
        if self.presents.len() < 2 {
            return None;
        }
        let span = *self.presents.back().unwrap() - *self.presents.front().unwrap();
        Some(span / (self.presents.len() as u32 - 1))
    }
}

/// How fast a layer is producing new content, rounded to the nearest
/// whole hertz a real display is likely to support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentRate {
    Unknown,
    Hz(u32),
}

/// Keeps a rolling present-timestamp history per layer and derives each
/// one's estimated content rate.
pub struct LayerHistory {
    capacity: usize,
    layers: FxHashMap<LayerId, LayerTimestamps>,
}

impl LayerHistory {
    pub fn new(capacity: usize) -> Self {
        LayerHistory { capacity, layers: FxHashMap::default() }
    }

    pub fn record_present(&mut self, layer_id: LayerId, timestamp: Duration) {
        self.layers
            .entry(layer_id)
            .or_insert_with(|| LayerTimestamps::new(self.capacity))
            .record(timestamp);
    }

    pub fn remove(&mut self, layer_id: LayerId) {
        self.layers.remove(&layer_id);
    }

    pub fn content_rate(&self, layer_id: LayerId) -> ContentRate {
        match self.layers.get(&layer_id).and_then(LayerTimestamps::average_interval) {
            Some(interval) if interval > Duration::ZERO => {
                let hz = (1.0 / interval.as_secs_f64()).round() as u32;
                ContentRate::Hz(hz.max(1))
            },
            _ => ContentRate::Unknown,
        }
    }

    /// The highest content rate any currently-tracked layer is
    /// producing, used to pick a DEFAULT-type refresh rate that covers
    /// every active layer without over-driving the display.
    pub fn max_content_rate(&self) -> ContentRate {
        self.layers
            .keys()
            .map(|id| self.content_rate(*id))
            .filter_map(|rate| match rate {
                ContentRate::Hz(hz) => Some(hz),
                ContentRate::Unknown => None,
            })
            .max()
            .map(ContentRate::Hz)
            .unwrap_or(ContentRate::Unknown)
    }
}
