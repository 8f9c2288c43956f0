// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compound identity.

use core::fmt;

/// Sentinel value indicating "no compound" in index fields.
pub const INVALID: u32 = u32::MAX;

/// A handle to a compound in a [`CompoundStore`](super::CompoundStore).
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after a compound is destroyed and its slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompoundId {
    /// Slot index into the store's arrays.
    pub(crate) idx: u32,
    /// Generation counter. Must match the store's generation for this slot.
    pub(crate) generation: u32,
}

impl CompoundId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Rebuilds a handle from its raw parts, e.g. when decoding a trace.
    ///
    /// The handle is only meaningful for the store that issued it; stores
    /// still reject it if the generation does not match.
    #[inline]
    #[must_use]
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self {
            idx: index,
            generation,
        }
    }
}

impl fmt::Debug for CompoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompoundId({}@gen{})", self.idx, self.generation)
    }
}
