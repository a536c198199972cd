/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Error types for this crate's fallible operations. None of these
//! represent panics: every caller either logs-and-skips or returns one
//! of these up one more level. They're plain structs/enums with manual
//! derives rather than an error-derive crate.

use std::fmt;

use crate::ids::LayerId;

/// A [`LayerId`] does not currently have an
/// [`crate::output_layer::OutputLayer`] on the output it was looked up
/// against.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct UnknownOutputLayer(pub LayerId);

impl fmt::Display for UnknownOutputLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no output-layer for layer {:?} on this output", self.0)
    }
}

/// The render surface failed to hand back a buffer to draw into. Skips
/// the current frame's client composition; does not stop the compositor.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DequeueFailed;

impl fmt::Display for DequeueFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render surface dequeue failed")
    }
}

/// The hardware composer failed to answer a device-composition-changes
/// query. The caller keeps the conservative defaults (`usesClient = true,
/// usesDevice = false`) and logs this.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HwcQueryFailed;

impl fmt::Display for HwcQueryFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hardware composer device-composition-changes query failed")
    }
}
