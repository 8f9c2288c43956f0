// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named swap synchronization groups.

use alloc::string::String;

/// A named group of windows that swap buffers together.
///
/// Compounds naming the same barrier during one update pass resolve to the
/// same distributed barrier. A non-zero hardware group or barrier number
/// requests a hardware swap group instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwapBarrier {
    /// Barrier name. Empty names are replaced when attached to a compound.
    pub name: String,
    /// Hardware swap group number.
    pub nv_group: u32,
    /// Hardware swap barrier number.
    pub nv_barrier: u32,
}

impl SwapBarrier {
    /// Creates a software barrier.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a hardware swap group barrier.
    #[must_use]
    pub fn nv(group: u32, barrier: u32) -> Self {
        Self {
            name: String::new(),
            nv_group: group,
            nv_barrier: barrier,
        }
    }

    /// Returns `true` if this barrier requests a hardware swap group.
    #[must_use]
    pub fn is_nv_barrier(&self) -> bool {
        self.nv_group != 0 || self.nv_barrier != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_barrier_detection() {
        assert!(!SwapBarrier::named("sync").is_nv_barrier());
        assert!(SwapBarrier::nv(1, 1).is_nv_barrier());
        assert!(SwapBarrier::nv(0, 2).is_nv_barrier());
    }
}
