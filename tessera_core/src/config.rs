// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine-wide tuning parameters.

/// Tuning parameters for compound updates and equalizers.
///
/// Passed explicitly to [`CompoundStore::update`](crate::compound::CompoundStore::update)
/// and friends. There is no process-wide default instance.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Distance between the eyes when no observer is configured.
    pub eye_base: f64,
    /// Smallest split, in pixels, a load equalizer produces for a child with
    /// non-zero usage.
    pub min_pixels: u32,
    /// Default damping of new load and DFR equalizers.
    pub default_damping: f64,
    /// Smallest zoomed dimension, in pixels, the DFR equalizer allows.
    pub dfr_min_size: u32,
    /// Default frame rate target of the DFR equalizer.
    pub dfr_target_fps: f64,
    /// Frame rates above this are reported as unlimited by the framerate
    /// equalizer.
    pub vsync_cap: f64,
    /// Safety factor applied to measured frame times by the framerate
    /// equalizer.
    pub framerate_slowdown: f64,
    /// Upper bound of the framerate equalizer's sample window.
    pub framerate_max_samples: usize,
    /// Smallest usage the view equalizer hands to a resource.
    pub view_min_usage: f64,
    /// Tile size of tile queues created by the tile equalizer.
    pub tile_size: (i32, i32),
    /// Upper bound on frames of load history an equalizer keeps while
    /// waiting for statistics.
    pub max_history: usize,
}

impl EngineConfig {
    /// The default configuration.
    pub const DEFAULT: Self = Self::new();

    /// A configuration that reacts faster at the cost of more jitter.
    pub const INTERACTIVE: Self = Self {
        default_damping: 0.25,
        framerate_max_samples: 30,
        ..Self::new()
    };

    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            eye_base: 0.05,
            min_pixels: 8,
            default_damping: 0.5,
            dfr_min_size: 128,
            dfr_target_fps: 10.0,
            vsync_cap: 60.0,
            framerate_slowdown: 1.05,
            framerate_max_samples: 100,
            view_min_usage: 0.1,
            tile_size: (64, 64),
            max_history: 64,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
