// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile queue management.

use alloc::format;
use alloc::string::String;

use super::EqualizerContext;
use crate::compound::{CompoundId, CompoundStore};
use crate::tile_queue::TileQueue;

/// Attaches a tile queue pair to a compound: one output queue on the
/// compound that produces the tiles, and one input queue on every leaf below
/// it that consumes them.
///
/// The equalizer does not measure anything. Toggling it with
/// [`set_active`](Self::set_active) creates or removes the queues on the
/// next update; updating again without a change does nothing.
#[derive(Clone, Debug, PartialEq)]
pub struct TileEqualizer {
    name: String,
    tile_size: Option<(i32, i32)>,
    active: bool,
    created: Option<String>,
}

impl TileEqualizer {
    /// Creates an active equalizer. An empty name is replaced by one derived
    /// from the compound when the queues are created.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tile_size: None,
            active: true,
            created: None,
        }
    }

    /// Sets the tile size. `None` uses
    /// [`EngineConfig::tile_size`](crate::config::EngineConfig::tile_size).
    #[must_use]
    pub fn with_tile_size(mut self, tile_size: Option<(i32, i32)>) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// The configured queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tile size, if overridden.
    #[must_use]
    pub fn tile_size(&self) -> Option<(i32, i32)> {
        self.tile_size
    }

    /// Whether queues are wanted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Requests creation or removal of the queues.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Name of the queues currently attached, if any.
    #[must_use]
    pub fn queue_name(&self) -> Option<&str> {
        self.created.as_deref()
    }

    pub(crate) fn update_pre(
        &mut self,
        store: &mut CompoundStore,
        compound: CompoundId,
        ctx: &EqualizerContext<'_, '_>,
    ) {
        match (self.active, self.created.is_some()) {
            (true, false) => self.attach(store, compound, ctx.config.tile_size),
            (false, true) => self.detach(store, compound),
            _ => {}
        }
    }

    fn attach(&mut self, store: &mut CompoundStore, compound: CompoundId, default_size: (i32, i32)) {
        let name = if self.name.is_empty() {
            match store.name(compound) {
                "" => format!("queue.{}", store.task_id(compound)),
                named => format!("queue.{named}"),
            }
        } else {
            self.name.clone()
        };
        let size = self.tile_size.unwrap_or(default_size);
        store.add_output_queue(compound, TileQueue::new(name.clone(), size));
        let mut inputs = 0;
        for leaf in store.leaves(compound) {
            if leaf != compound {
                store.add_input_queue(leaf, TileQueue::new(name.clone(), size));
                inputs += 1;
            }
        }
        log::info!("{compound:?} tile queue {name:?} with {inputs} inputs, {size:?} tiles");
        self.created = Some(name);
    }

    pub(crate) fn detach(&mut self, store: &mut CompoundStore, compound: CompoundId) {
        let Some(name) = self.created.take() else {
            return;
        };
        store.remove_output_queue(compound, &name);
        // Compounds that were leaves at attach time may have gained children.
        for below in store.subtree(compound) {
            if below != compound {
                store.remove_input_queue(below, &name);
            }
        }
        log::info!("{compound:?} removed tile queue {name:?}");
    }
}

impl Default for TileEqualizer {
    fn default() -> Self {
        Self::new("")
    }
}
