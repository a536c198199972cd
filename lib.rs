/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The per-output composition core of a display server: visibility and
//! coverage, client-vs-device composition strategy, client composition
//! through a render backend, framebuffer posting with fence
//! distribution, and a refresh-rate scheduler with idle/touch/display-
//! power debounce timers.
//!
//! This crate owns none of its inputs. Layers, outputs, the hardware
//! composer, and the render backend are all external contracts
//! ([`layer::LayerFrontEnd`], [`output::OutputBackend`],
//! [`hwc::HardwareComposer`], [`render_backend::RenderBackend`]); an
//! embedder wires real implementations of each in and drives
//! [`frame::compose_frame`] once per vsync per output.

pub mod client_composition;
pub mod color_profile;
pub mod config;
pub mod connection_registry;
pub mod error;
pub mod frame;
pub mod hwc;
pub mod ids;
pub mod layer;
pub mod output;
pub mod output_layer;
pub mod present;
pub mod region;
pub mod render_backend;
pub mod scheduler;
pub mod stats;
pub mod strategy;
pub mod units;
pub mod visibility;

pub use client_composition::ClientCompositionContext;
pub use color_profile::{ColorMode, ColorSetting, Dataspace, RenderIntent};
pub use config::CompositorConfig;
pub use connection_registry::{ConnectionEventThread, ConnectionRegistry};
pub use frame::{compose_frame, FrameLayerInput, FrameResources};
pub use hwc::{Fence, HardwareComposer};
pub use ids::{ConnectionHandle, LayerHandle, LayerId, OutputId};
pub use layer::{LayerFrontEnd, LayerRegistry};
pub use output::{ColorTransformMatrix, InvalidationReasons, Output, OutputBackend};
pub use region::Region;
pub use render_backend::DisplaySettings;
pub use scheduler::{
    ChangeRefreshRateCallback, ContentDetection, RateChangeEvent, RefreshRateEntry, RefreshRateScheduler,
    RefreshRateType,
};
pub use stats::CompositionStats;
pub use strategy::StrategyResult;
pub use visibility::{CoverageResult, PreviousLayerState, VisibilityInput};
