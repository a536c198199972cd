/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Picks the refresh rate an output's display should run at, debounces
//! the idle/touch/display-power events that can change that choice, and
//! tracks the hardware-vsync resync state a kernel idle timer or content
//! detection can drive independently of the rate decision itself.
//!
//! A frame is never blocked on this module: [`RefreshRateScheduler::choose_rate`]
//! always returns synchronously from whatever state the debounce timers
//! last left it in. The timers run on their own threads purely to turn
//! "no activity for N milliseconds" into a state transition; they never
//! participate in the composition passes themselves.

pub mod debounce_timer;
pub mod layer_history;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use self::debounce_timer::DebounceTimer;
use self::layer_history::{ContentRate, LayerHistory};
use crate::config::CompositorConfig;
use crate::hwc::Fence;

/// Whether the display should prioritize matching content cadence
/// (DEFAULT) or run as fast as it can to minimize input latency
/// (PERFORMANCE, e.g. while actively touching the screen).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshRateType {
    Default,
    Performance,
}

/// One entry in a display's supported-rate table. Order is significant:
/// rule 7's tie-break scans *later* entries in this list for a better
/// integer-ratio match once the closest-by-distance candidate misses the
/// margin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefreshRateEntry {
    pub hz: u32,
    pub rate_type: RefreshRateType,
}

/// A debounced timer's state: `Reset` means it's currently counting down
/// (an event happened recently), `Expired` means it ran out with no
/// further resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerState {
    Reset,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TouchState {
    Active,
    Inactive,
}

/// Whether layer-content-rate detection is in effect at all; turning it
/// off makes the scheduler treat every frame as performance-sensitive,
/// the same as if touch were always active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentDetection {
    On,
    Off,
}

struct SchedulerState {
    idle: TimerState,
    touch: TouchState,
    display_power: TimerState,
    content_detection: ContentDetection,
    switching_supported: bool,
    force_hdr_to_default: bool,
    is_hdr_content: bool,
    is_display_power_state_normal: bool,
}

/// Why [`RefreshRateScheduler::choose_rate`] picked what it picked, in
/// the same priority order the rules are evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RateDecision {
    SwitchingUnsupported,
    ForceHdrDefault,
    PowerBoost,
    TouchBoost,
    IdleExpired,
    ContentDetectionOff,
    ContentMatch,
}

/// What an event that changed scheduler state should report to a
/// registered [`ChangeRefreshRateCallback`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateChangeEvent {
    None,
    Changed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Trigger {
    Content,
    Touch,
    DisplayPower,
    Idle,
    Other,
}

pub type ChangeRefreshRateCallback = Box<dyn Fn(RefreshRateType, RateChangeEvent) + Send + Sync>;

/// Hardware-vsync resync bookkeeping, guarded by its own lock so a
/// resync request never has to wait on the main feature-state lock.
/// This is a simplified stand-in for the display driver's real DispSync
/// model equation: it tracks only what a resync request and a present
/// fence observation need to decide whether hardware vsync should be
/// (re)enabled, not the phase-tracking math a real vsync predictor does.
struct HwVsyncState {
    last_resync: Option<Instant>,
    enabled: bool,
    period: Option<Duration>,
    resync_samples: u32,
}

const RESYNC_DEBOUNCE: Duration = Duration::from_millis(750);

/// Chooses a refresh rate for one output and debounces the events that
/// can change that choice. Each debounce timer lives on its own thread
/// (see [`DebounceTimer`]); this struct only holds the shared state those
/// threads flip and the synchronous selection logic that reads it back.
pub struct RefreshRateScheduler {
    state: Arc<Mutex<SchedulerState>>,
    layer_history: Mutex<LayerHistory>,
    supported_rates: Vec<RefreshRateEntry>,
    idle_timer: DebounceTimer,
    touch_timer: DebounceTimer,
    display_power_timer: DebounceTimer,
    hw_vsync: Mutex<HwVsyncState>,
    callback: Mutex<Option<ChangeRefreshRateCallback>>,
    last_notified_rate: Mutex<Option<RefreshRateEntry>>,
    kernel_idle_timer_enabled: bool,
}

impl RefreshRateScheduler {
    pub fn new(config: &CompositorConfig, supported_rates: Vec<RefreshRateEntry>) -> Self {
        let state = Arc::new(Mutex::new(SchedulerState {
            idle: TimerState::Reset,
            touch: TouchState::Inactive,
            display_power: TimerState::Expired,
            content_detection: ContentDetection::On,
            switching_supported: config.refresh_rate_switching_supported,
            force_hdr_to_default: config.force_hdr_content_to_default_refresh_rate,
            is_hdr_content: false,
            is_display_power_state_normal: true,
        }));

        let kernel_idle_timer_enabled = config.kernel_idle_timer_enabled;

        let idle_state = state.clone();
        let idle_timer = DebounceTimer::new(config.idle_timer_timeout, move || {
            idle_state.lock().idle = TimerState::Expired;
        });

        let touch_state = state.clone();
        let touch_timer = DebounceTimer::new(config.touch_timer_timeout, move || {
            touch_state.lock().touch = TouchState::Inactive;
        });

        let power_state = state.clone();
        let display_power_timer = DebounceTimer::new(config.display_power_timer_timeout, move || {
            power_state.lock().display_power = TimerState::Expired;
        });

        // Start the idle countdown immediately: a freshly created output
        // has seen no layer activity yet, so it should settle to the
        // idle rate after one timeout with nothing else happening.
        idle_timer.reset();

        RefreshRateScheduler {
            state,
            layer_history: Mutex::new(LayerHistory::new(config.layer_history_size)),
            supported_rates,
            idle_timer,
            touch_timer,
            display_power_timer,
            hw_vsync: Mutex::new(HwVsyncState {
                last_resync: None,
                enabled: false,
                period: None,
                resync_samples: 0,
            }),
            callback: Mutex::new(None),
            last_notified_rate: Mutex::new(None),
            kernel_idle_timer_enabled,
        }
    }

    /// Registers the callback invoked every time a state-changing event
    /// is recorded. Replaces any previously registered callback.
    pub fn set_change_refresh_rate_callback(&self, callback: ChangeRefreshRateCallback) {
        *self.callback.lock() = Some(callback);
    }

    /// A layer presented new content; resets the idle timer and records
    /// the timestamp for content-rate estimation. On a kernel-idle-timer
    /// display, this also resyncs to hardware vsync instead of flipping
    /// the plain idle/active flag, since the kernel (not this scheduler)
    /// owns the idle transition in that mode.
    pub fn record_layer_activity(&self, layer_id: crate::ids::LayerId, timestamp: Duration) {
        if self.kernel_idle_timer_enabled {
            let was_performance = self.choose_rate().rate_type == RefreshRateType::Performance;
            if was_performance {
                let period = self.hw_vsync.lock().period;
                self.resync_to_hardware_vsync(true, period);
            }
        } else {
            self.state.lock().idle = TimerState::Reset;
        }
        self.idle_timer.reset();
        self.layer_history.lock().record_present(layer_id, timestamp);
        self.recompute_and_notify(Trigger::Content);
    }

    pub fn record_touch_event(&self) {
        self.state.lock().touch = TouchState::Active;
        self.touch_timer.reset();
        self.recompute_and_notify(Trigger::Touch);
    }

    pub fn record_display_powered_on(&self) {
        self.state.lock().display_power = TimerState::Reset;
        self.display_power_timer.reset();
        self.recompute_and_notify(Trigger::DisplayPower);
    }

    pub fn set_display_power_state_normal(&self, normal: bool) {
        self.state.lock().is_display_power_state_normal = normal;
        self.recompute_and_notify(Trigger::DisplayPower);
    }

    pub fn set_content_detection(&self, detection: ContentDetection) {
        self.state.lock().content_detection = detection;
        self.recompute_and_notify(Trigger::Other);
    }

    pub fn set_hdr_content(&self, is_hdr: bool) {
        self.state.lock().is_hdr_content = is_hdr;
        self.recompute_and_notify(Trigger::Content);
    }

    pub fn set_switching_supported(&self, supported: bool) {
        self.state.lock().switching_supported = supported;
        self.recompute_and_notify(Trigger::Other);
    }

    pub fn layer_removed(&self, layer_id: crate::ids::LayerId) {
        self.layer_history.lock().remove(layer_id);
    }

    fn decide(&self) -> RateDecision {
        let state = self.state.lock();
        if !state.switching_supported {
            return RateDecision::SwitchingUnsupported;
        }
        if state.force_hdr_to_default && state.is_hdr_content {
            return RateDecision::ForceHdrDefault;
        }
        if !state.is_display_power_state_normal || state.display_power == TimerState::Reset {
            return RateDecision::PowerBoost;
        }
        if state.touch == TouchState::Active {
            return RateDecision::TouchBoost;
        }
        if state.idle == TimerState::Expired {
            return RateDecision::IdleExpired;
        }
        if state.content_detection == ContentDetection::Off {
            return RateDecision::ContentDetectionOff;
        }
        RateDecision::ContentMatch
    }

    /// Picks the refresh rate to run at right now, via the ordered
    /// decision procedure [`RateDecision`] enumerates.
    pub fn choose_rate(&self) -> RefreshRateEntry {
        match self.decide() {
            RateDecision::SwitchingUnsupported | RateDecision::ForceHdrDefault | RateDecision::IdleExpired => self
                .highest_rate_of_type(RefreshRateType::Default)
                .unwrap_or_else(|| self.lowest_rate()),
            RateDecision::PowerBoost | RateDecision::TouchBoost | RateDecision::ContentDetectionOff => self
                .highest_rate_of_type(RefreshRateType::Performance)
                .unwrap_or_else(|| self.highest_rate_of_type(RefreshRateType::Default)
                    .expect("a scheduler must have at least one supported rate")),
            RateDecision::ContentMatch => match self.layer_history.lock().max_content_rate() {
                ContentRate::Hz(hz) => self.closest_rate_by_ratio_rule(hz),
                ContentRate::Unknown => self
                    .highest_rate_of_type(RefreshRateType::Default)
                    .unwrap_or_else(|| self.lowest_rate()),
            },
        }
    }

    fn highest_rate_of_type(&self, rate_type: RefreshRateType) -> Option<RefreshRateEntry> {
        self.supported_rates
            .iter()
            .filter(|entry| entry.rate_type == rate_type)
            .fold(None, |best, candidate| match best {
                // Later entries win ties, so `>=` (not `>`) prefers the
                // later-indexed candidate on an exact tie.
                Some(b) if b.hz > candidate.hz => Some(b),
                _ => Some(*candidate),
            })
    }

    fn lowest_rate(&self) -> RefreshRateEntry {
        self.supported_rates
            .iter()
            .fold(None, |best: Option<RefreshRateEntry>, candidate| match best {
                Some(b) if b.hz < candidate.hz => Some(b),
                _ => Some(*candidate),
            })
            .expect("a scheduler must have at least one supported rate")
    }

    /// How far `hz` is from being an exact integer multiple or divisor of
    /// `target`: 0.0 for a perfect ratio (e.g. 120hz against 60hz content
    /// is ratio 2.0), approaching 0.5 for the worst possible mismatch.
    fn ratio_deviation(hz: u32, target: u32) -> f64 {
        if target == 0 {
            return f64::MAX;
        }
        let ratio = hz as f64 / target as f64;
        let rounded = ratio.max(1.0).round().max(1.0);
        (ratio - rounded).abs()
    }

    /// DEFAULT-type rate closest to `target` by raw hz distance, unless a
    /// later entry in `supported_rates` is a meaningfully better integer
    /// ratio of `target` (within a 0.05 margin) than the closest-distance
    /// candidate manages; later entries are only consulted when the
    /// closest-distance candidate itself misses that margin.
    fn closest_rate_by_ratio_rule(&self, target: u32) -> RefreshRateEntry {
        let mut closest: Option<(usize, RefreshRateEntry)> = None;
        for (index, candidate) in self.supported_rates.iter().enumerate() {
            if candidate.rate_type != RefreshRateType::Default {
                continue;
            }
            let candidate_distance = (candidate.hz as i64 - target as i64).abs();
            match closest {
                Some((_, best)) if (best.hz as i64 - target as i64).abs() < candidate_distance => {},
                _ => closest = Some((index, *candidate)),
            }
        }

        let Some((closest_index, closest_entry)) = closest else {
            return self.lowest_rate();
        };

        if Self::ratio_deviation(closest_entry.hz, target) <= 0.05 {
            return closest_entry;
        }

        let mut best = closest_entry;
        let mut best_deviation = Self::ratio_deviation(closest_entry.hz, target);
        for candidate in self.supported_rates.iter().skip(closest_index + 1) {
            if candidate.rate_type != RefreshRateType::Default {
                continue;
            }
            let deviation = Self::ratio_deviation(candidate.hz, target);
            if deviation < best_deviation {
                best = *candidate;
                best_deviation = deviation;
            }
        }
        best
    }

    fn recompute_and_notify(&self, trigger: Trigger) {
        let new_rate = self.choose_rate();
        let mut last = self.last_notified_rate.lock();
        let changed = *last != Some(new_rate);
        *last = Some(new_rate);
        drop(last);

        let event = match (changed, trigger) {
            (false, _) => RateChangeEvent::None,
            (true, Trigger::Content) => RateChangeEvent::Changed,
            (true, Trigger::Touch) | (true, Trigger::DisplayPower) => {
                if self.state.lock().content_detection == ContentDetection::On {
                    RateChangeEvent::Changed
                } else {
                    RateChangeEvent::None
                }
            },
            (true, Trigger::Idle) | (true, Trigger::Other) => RateChangeEvent::None,
        };

        if let Some(callback) = self.callback.lock().as_ref() {
            callback(new_rate.rate_type, event);
        }
    }

    /// Requests a resync to hardware vsync, debounced so bursts of
    /// resync triggers within 750ms collapse to a single resync. Returns
    /// whether this call actually performed the resync.
    pub fn resync(&self) -> bool {
        let mut hw = self.hw_vsync.lock();
        let now = Instant::now();
        if let Some(last) = hw.last_resync {
            if now.duration_since(last) < RESYNC_DEBOUNCE {
                return false;
            }
        }
        hw.last_resync = Some(now);
        hw.enabled = true;
        true
    }

    pub fn resync_to_hardware_vsync(&self, enable: bool, period: Option<Duration>) {
        let mut hw = self.hw_vsync.lock();
        hw.enabled = enable;
        hw.period = period;
    }

    /// Turns off hardware vsync tracking; `make_unavailable` also drops
    /// the last known period, forcing a fresh resync before it's trusted
    /// again.
    pub fn disable_hardware_vsync(&self, make_unavailable: bool) {
        let mut hw = self.hw_vsync.lock();
        hw.enabled = false;
        if make_unavailable {
            hw.period = None;
        }
    }

    pub fn add_resync_sample(&self, period: Duration) {
        let mut hw = self.hw_vsync.lock();
        hw.period = Some(period);
        hw.resync_samples += 1;
    }

    pub fn add_present_fence(&self, _fence: Fence) {
        self.resync();
    }

    pub fn dump_state(&self) -> String {
        let (idle, touch, display_power) = {
            let state = self.state.lock();
            (state.idle, state.touch, state.display_power)
        };
        let hw_vsync_enabled = self.hw_vsync.lock().enabled;
        format!(
            "idle={:?} touch={:?} display_power={:?} hw_vsync_enabled={} chosen={:?}",
            idle,
            touch,
            display_power,
            hw_vsync_enabled,
            self.choose_rate()
        )
    }
}
