// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured results of a compound tree update.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::compound::CompoundId;
use crate::frame::FrameRef;
use crate::resources::{BarrierId, ChannelId};

/// A recoverable problem found during an update pass.
///
/// The affected frame or queue is deactivated for this frame; everything
/// else proceeds.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// Two output frames share a name.
    DuplicateOutputFrame {
        /// The compound owning the second frame.
        compound: CompoundId,
        /// Frame name.
        name: String,
    },
    /// Two output tile queues share a name.
    DuplicateOutputQueue {
        /// The compound owning the second queue.
        compound: CompoundId,
        /// Queue name.
        name: String,
    },
    /// An output frame covers no pixels.
    EmptyOutputFrame {
        /// The compound owning the frame.
        compound: CompoundId,
        /// Frame name.
        name: String,
    },
    /// An input frame names no output frame.
    MissingOutputFrame {
        /// The compound owning the input frame.
        compound: CompoundId,
        /// Frame name.
        name: String,
    },
    /// An input tile queue names no output queue.
    MissingOutputQueue {
        /// The compound owning the input queue.
        compound: CompoundId,
        /// Queue name.
        name: String,
    },
    /// A load equalizer could not hand out all measured time.
    UnassignedLoad {
        /// The equalizer's compound.
        compound: CompoundId,
        /// Time left over, in milliseconds.
        leftover: f64,
    },
}

/// A swap barrier resolved during an update pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BarrierCommit {
    /// Barrier name.
    pub name: String,
    /// The distributed barrier.
    pub barrier: BarrierId,
    /// Number of windows that joined it.
    pub height: u32,
}

impl BarrierCommit {
    /// Returns `true` if more than one window synchronizes on the barrier.
    #[must_use]
    pub fn is_effective(&self) -> bool {
        self.height > 1
    }
}

/// What one call to [`CompoundStore::update`](crate::compound::CompoundStore::update)
/// produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateReport {
    /// The updated frame.
    pub frame_number: u32,
    /// Output frames that received data this frame.
    pub output_frames: Vec<FrameRef>,
    /// Output tile queues that received tiles this frame, by compound and
    /// queue index.
    pub output_queues: Vec<(CompoundId, usize)>,
    /// Swap barriers joined this frame.
    pub swap_barriers: Vec<BarrierCommit>,
    /// The last compound drawing into each channel.
    pub last_draw: BTreeMap<ChannelId, CompoundId>,
    /// Recoverable problems.
    pub diagnostics: Vec<Diagnostic>,
}

impl UpdateReport {
    /// Creates an empty report for `frame_number`.
    #[must_use]
    pub fn new(frame_number: u32) -> Self {
        Self {
            frame_number,
            ..Self::default()
        }
    }

    /// Barriers that actually synchronize more than one window.
    pub fn effective_barriers(&self) -> impl Iterator<Item = &BarrierCommit> {
        self.swap_barriers.iter().filter(|b| b.is_effective())
    }
}
