// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Task ids, default names and the first inherited data.

use alloc::format;
use alloc::string::{String, ToString};

use crate::compound::{CompoundId, CompoundStore, CompoundVisitorMut, VisitorResult};
use crate::error::InvariantViolation;
use crate::resources::Resources;

/// Prepares a tree for its first update.
pub(crate) struct InitPass<'a> {
    pub(crate) resources: &'a mut dyn Resources,
    pub(crate) next_task: u32,
    pub(crate) error: Option<InvariantViolation>,
    pub(crate) visited: u32,
}

impl<'a> InitPass<'a> {
    pub(crate) fn new(resources: &'a mut dyn Resources) -> Self {
        Self {
            resources,
            next_task: 0,
            error: None,
            visited: 0,
        }
    }

    fn init(&mut self, store: &mut CompoundStore, id: CompoundId) -> Result<(), InvariantViolation> {
        self.next_task += 1;
        let idx = id.idx as usize;
        store.task_id[idx] = self.next_task;

        let suffix = match store.name(id) {
            "" => self.next_task.to_string(),
            name => String::from(name),
        };
        for frame in store.output_frames[idx]
            .iter_mut()
            .chain(store.input_frames[idx].iter_mut())
        {
            if frame.name.is_empty() {
                frame.name = format!("frame.{suffix}");
            }
        }
        for queue in store.output_queues[idx]
            .iter_mut()
            .chain(store.input_queues[idx].iter_mut())
        {
            if queue.name.is_empty() {
                queue.name = format!("queue.{suffix}");
            }
        }

        // Destinations need their frustum before anything inherits it.
        store.update_frustum(id, self.resources)?;
        store.update_inherit_data(id, 0, &*self.resources)
    }
}

impl CompoundVisitorMut for InitPass<'_> {
    fn visit(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        self.visited += 1;
        match self.init(store, id) {
            Ok(()) => VisitorResult::Continue,
            Err(err) => {
                self.error = Some(err);
                VisitorResult::Terminate
            }
        }
    }
}
