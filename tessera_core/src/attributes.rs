// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Eye, task, buffer, and stereo attributes of a compound.

use bitflags::bitflags;

bitflags! {
    /// Set of eye passes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Eyes: u32 {
        /// Monoscopic (center) eye.
        const CYCLOP = 1 << 0;
        /// Left eye.
        const LEFT = 1 << 1;
        /// Right eye.
        const RIGHT = 1 << 2;
        /// Both stereo eyes.
        const STEREO = Self::LEFT.bits() | Self::RIGHT.bits();
        /// Every eye.
        const ALL = Self::CYCLOP.bits() | Self::STEREO.bits();
    }
}

impl Eyes {
    /// Returns `true` if `eye` is in the set.
    #[inline]
    #[must_use]
    pub fn has(self, eye: Eye) -> bool {
        self.contains(eye.into())
    }
}

/// A single eye pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Eye {
    /// Monoscopic (center) eye.
    #[default]
    Cyclop,
    /// Left eye.
    Left,
    /// Right eye.
    Right,
}

impl Eye {
    /// Every eye, in bit order.
    pub const ALL: [Self; 3] = [Self::Cyclop, Self::Left, Self::Right];

    /// Index of this eye in per-eye arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Cyclop => 0,
            Self::Left => 1,
            Self::Right => 2,
        }
    }
}

impl From<Eye> for Eyes {
    fn from(eye: Eye) -> Self {
        match eye {
            Eye::Cyclop => Self::CYCLOP,
            Eye::Left => Self::LEFT,
            Eye::Right => Self::RIGHT,
        }
    }
}

bitflags! {
    /// Rendering tasks a compound executes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Tasks: u32 {
        /// Clear the destination.
        const CLEAR = 1 << 0;
        /// Cull the database.
        const CULL = 1 << 1;
        /// Draw the database.
        const DRAW = 1 << 2;
        /// Assemble input frames.
        const ASSEMBLE = 1 << 3;
        /// Read back output frames.
        const READBACK = 1 << 4;
        /// Run view-level operations (the compound owns the view's channel).
        const VIEW = 1 << 5;
        /// The default leaf task set.
        const ALL = Self::CLEAR.bits()
            | Self::CULL.bits()
            | Self::DRAW.bits()
            | Self::ASSEMBLE.bits()
            | Self::READBACK.bits();
    }
}

bitflags! {
    /// Frame buffer attachments.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Buffers: u32 {
        /// Color buffer.
        const COLOR = 1 << 0;
        /// Depth buffer.
        const DEPTH = 1 << 1;
    }
}

bitflags! {
    /// Color channels written by an anaglyph eye pass.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ColorMask: u32 {
        /// Red channel.
        const RED = 0x02;
        /// Green channel.
        const GREEN = 0x04;
        /// Blue channel.
        const BLUE = 0x08;
    }
}

/// How stereo output is produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StereoMode {
    /// Resolve from the segment and window capabilities.
    #[default]
    Auto,
    /// Separate outputs per eye.
    Passive,
    /// Quad-buffered stereo.
    Quad,
    /// Color-masked anaglyph.
    Anaglyph,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_bits_match_indices() {
        for eye in Eye::ALL {
            assert_eq!(Eyes::from(eye).bits(), 1 << eye.index());
        }
        assert!(Eyes::STEREO.has(Eye::Left));
        assert!(!Eyes::STEREO.has(Eye::Cyclop));
    }

    #[test]
    fn default_task_set_excludes_view() {
        assert!(!Tasks::ALL.contains(Tasks::VIEW));
        assert!(Tasks::ALL.contains(Tasks::CLEAR | Tasks::READBACK));
    }
}
