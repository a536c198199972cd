/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Stable integer identifiers for the arena-owned entities this crate
//! talks about: input layers, outputs, and vsync-event connections.
//!
//! Layers are owned by an external arena (see [`crate::layer::LayerRegistry`]);
//! this crate never stores a layer by reference, only by [`LayerId`] plus a
//! generation counter, so that a layer removed from the arena and replaced
//! by a new one at the same slot is never confused with its predecessor.

use std::fmt;

macro_rules! new_id_type {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

new_id_type! {
    /// Identifies an input [`crate::layer::LayerFrontEnd`] in the caller's arena.
    LayerId
}

new_id_type! {
    /// Identifies an [`crate::output::Output`].
    OutputId
}

new_id_type! {
    /// Opaque handle returned to a vsync-event subscriber by the
    /// [`crate::connection_registry::ConnectionRegistry`].
    ConnectionHandle
}

/// A layer identity plus the generation it was created at, used so that a
/// stale reference to a reused [`LayerId`] slot is detected rather than
/// silently aliasing a new layer. See [`crate::layer::LayerRegistry`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LayerHandle {
    pub id: LayerId,
    pub generation: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_ids_are_not_equal() {
        assert_ne!(LayerId(0), LayerId(1));
        assert_eq!(LayerId(3), LayerId(3));
    }

    #[test]
    fn handles_compare_by_generation_too() {
        let a = LayerHandle { id: LayerId(1), generation: 0 };
        let b = LayerHandle { id: LayerId(1), generation: 1 };
        assert_ne!(a, b);
    }
}
