// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile work queues.
//!
//! An output [`TileQueue`] splits a compound's pixel viewport into fixed-size
//! tiles that source channels pull from at runtime. Input queues on the
//! source compounds link to the output queue of the same name.

use alloc::string::String;
use alloc::vec::Vec;

use crate::attributes::Eye;
use crate::compound::CompoundId;
use crate::frustum::RenderFrustum;
use crate::geometry::{PixelViewport, Viewport};

/// One unit of tile work.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    /// Pixel region relative to the queue's compound.
    pub pvp: PixelViewport,
    /// Fractional region relative to the queue's compound.
    pub vp: Viewport,
    /// Perspective frustum of the tile.
    pub frustum: RenderFrustum,
    /// Orthographic frustum of the tile.
    pub ortho: RenderFrustum,
}

/// A named queue of tiles.
#[derive(Clone, Debug, PartialEq)]
pub struct TileQueue {
    /// Name used to match input and output queues.
    pub name: String,
    /// Tile size in pixels.
    pub tile_size: (i32, i32),

    tiles: Vec<(Eye, Tile)>,
    frame_number: Option<u32>,
    source: Option<(CompoundId, usize)>,
}

impl TileQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(name: impl Into<String>, tile_size: (i32, i32)) -> Self {
        Self {
            name: name.into(),
            tile_size,
            tiles: Vec::new(),
            frame_number: None,
            source: None,
        }
    }

    /// Tiles generated for the current frame, with the eye they belong to.
    #[must_use]
    pub fn tiles(&self) -> &[(Eye, Tile)] {
        &self.tiles
    }

    /// Frame the tiles were generated for, `None` if the queue is unused.
    #[must_use]
    pub fn frame_number(&self) -> Option<u32> {
        self.frame_number
    }

    /// Output queue (compound and index) an input queue was linked to.
    #[must_use]
    pub fn source(&self) -> Option<(CompoundId, usize)> {
        self.source
    }

    /// Starts a new frame.
    pub fn cycle_data(&mut self, frame_number: u32) {
        self.tiles.clear();
        self.frame_number = Some(frame_number);
        self.source = None;
    }

    /// Marks the queue unused for the current frame.
    pub fn unset_data(&mut self) {
        self.tiles.clear();
        self.frame_number = None;
        self.source = None;
    }

    pub(crate) fn add_tile(&mut self, eye: Eye, tile: Tile) {
        self.tiles.push((eye, tile));
    }

    pub(crate) fn set_source(&mut self, source: (CompoundId, usize)) {
        self.source = Some(source);
    }

    /// Number of tiles along each axis needed to cover `pvp`.
    #[must_use]
    pub fn dimensions(&self, pvp: PixelViewport) -> (i32, i32) {
        let (tw, th) = (self.tile_size.0.max(1), self.tile_size.1.max(1));
        (
            pvp.w / tw + i32::from(pvp.w % tw != 0),
            pvp.h / th + i32::from(pvp.h % th != 0),
        )
    }

    /// Pixel region of tile `(tx, ty)` inside `pvp`, clipped at its edges.
    #[must_use]
    pub fn tile_pvp(&self, pvp: PixelViewport, (tx, ty): (i32, i32)) -> PixelViewport {
        let (tw, th) = self.tile_size;
        let mut tile = PixelViewport::new(tx * tw, ty * th, tw, th);
        if tile.x + tw > pvp.w {
            tile.w = pvp.w - tile.x;
        }
        if tile.y + th > pvp.h {
            tile.h = pvp.h - tile.y;
        }
        tile
    }
}

/// Orders the tiles of a `dim.0 × dim.1` grid row by row, reversing every
/// odd row so consecutive tiles stay adjacent.
#[must_use]
pub fn zigzag(dim: (i32, i32)) -> Vec<(i32, i32)> {
    let mut tiles = Vec::new();
    for y in 0..dim.1 {
        if y % 2 == 0 {
            tiles.extend((0..dim.0).map(|x| (x, y)));
        } else {
            tiles.extend((0..dim.0).rev().map(|x| (x, y)));
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_reverses_odd_rows() {
        assert_eq!(
            zigzag((3, 2)),
            [(0, 0), (1, 0), (2, 0), (2, 1), (1, 1), (0, 1)]
        );
        assert!(zigzag((0, 4)).is_empty());
    }

    #[test]
    fn partial_tiles_are_clipped() {
        let queue = TileQueue::new("q", (64, 64));
        let pvp = PixelViewport::new(0, 0, 100, 64);
        assert_eq!(queue.dimensions(pvp), (2, 1));
        assert_eq!(
            queue.tile_pvp(pvp, (1, 0)),
            PixelViewport::new(64, 0, 36, 64)
        );
        assert_eq!(queue.tile_pvp(pvp, (0, 0)), PixelViewport::new(0, 0, 64, 64));
    }

    #[test]
    fn unset_clears_tiles() {
        let mut queue = TileQueue::new("q", (8, 8));
        queue.cycle_data(4);
        queue.add_tile(
            Eye::Cyclop,
            Tile {
                pvp: PixelViewport::new(0, 0, 8, 8),
                vp: Viewport::FULL,
                frustum: RenderFrustum::default(),
                ortho: RenderFrustum::default(),
            },
        );
        assert_eq!(queue.frame_number(), Some(4));
        assert_eq!(queue.tiles().len(), 1);
        queue.unset_data();
        assert!(queue.tiles().is_empty());
        assert_eq!(queue.frame_number(), None);
    }
}
