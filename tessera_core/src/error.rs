// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration errors detected while updating a compound tree.

use crate::compound::CompoundId;
use crate::geometry::{Range, Viewport};
use crate::resources::{ChannelId, SegmentId, ViewId, WindowId};

/// A compound configuration that cannot be evaluated.
///
/// These indicate an authoring bug in the compound tree, not a runtime
/// condition. [`CompoundStore::update`](crate::compound::CompoundStore::update)
/// stops at the first violation and returns it.
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    /// A load equalizer would split a subtree by viewport and by range at
    /// the same time.
    #[error("{compound:?} mixes 2D and DB decomposition")]
    MixedSplitModes {
        /// The compound receiving the assignment.
        compound: CompoundId,
    },
    /// A load equalizer assigned work to a child with zero usage.
    #[error("{compound:?} has zero usage but received a non-empty region")]
    ZeroUsageAssignment {
        /// The zero-usage compound.
        compound: CompoundId,
    },
    /// A load equalizer computed an invalid viewport or range.
    #[error("{compound:?} received a malformed split: {viewport:?} {range:?}")]
    MalformedSplit {
        /// The compound receiving the assignment.
        compound: CompoundId,
        /// The computed viewport.
        viewport: Viewport,
        /// The computed range.
        range: Range,
    },
    /// A load-balanced leaf has no channel to collect statistics from.
    #[error("{compound:?} has no channel")]
    MissingChannel {
        /// The channel-less compound.
        compound: CompoundId,
    },
    /// A compound references a channel the resources do not know.
    #[error("unknown channel {0:?}")]
    UnknownChannel(ChannelId),
    /// A channel references a view the resources do not know.
    #[error("unknown view {0:?}")]
    UnknownView(ViewId),
    /// A channel references a segment the resources do not know.
    #[error("unknown segment {0:?}")]
    UnknownSegment(SegmentId),
    /// A channel references a window the resources do not know.
    #[error("unknown window {0:?}")]
    UnknownWindow(WindowId),
    /// A view equalizer found the same channel twice in one branch.
    #[error("{channel:?} is used more than once below {compound:?}")]
    ChannelReuse {
        /// The branch root.
        compound: CompoundId,
        /// The repeated channel.
        channel: ChannelId,
    },
}
