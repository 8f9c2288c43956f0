// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-task timing samples reported by channels.

/// What a [`Statistic`] measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatisticKind {
    /// Clearing the drawable.
    Clear,
    /// Drawing the database.
    Draw,
    /// Assembling input frames.
    Assemble,
    /// Reading back an output frame.
    Readback,
    /// Transmitting an output frame.
    Transmit,
    /// Finishing an asynchronous readback.
    AsyncReadback,
    /// Sending a frame to another node.
    FrameTransmit,
    /// Waiting for a send token.
    FrameWaitSendToken,
    /// Waiting for an input frame.
    FrameWaitReady,
}

impl StatisticKind {
    /// Returns `true` for the kinds that bound the rendering span of a task.
    #[must_use]
    pub const fn is_render(self) -> bool {
        matches!(self, Self::Clear | Self::Draw | Self::Readback)
    }
}

/// One timed event of a channel task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Statistic {
    /// Event kind.
    pub kind: StatisticKind,
    /// Task id of the compound that issued the task.
    pub task_id: u32,
    /// Start time in milliseconds.
    pub start_time: i64,
    /// End time in milliseconds.
    pub end_time: i64,
}

impl Statistic {
    /// Creates a statistic.
    #[must_use]
    pub const fn new(kind: StatisticKind, task_id: u32, start_time: i64, end_time: i64) -> Self {
        Self {
            kind,
            task_id,
            start_time,
            end_time,
        }
    }

    /// Duration in milliseconds.
    #[must_use]
    pub const fn duration(&self) -> i64 {
        self.end_time - self.start_time
    }
}
