// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Release of per-run state.

use core::mem;

use crate::compound::{CompoundId, CompoundStore, CompoundVisitorMut, VisitorResult};

/// Drops frame data, task ids and everything the equalizers built.
#[derive(Debug, Default)]
pub(crate) struct ExitPass {
    pub(crate) visited: u32,
}

impl CompoundVisitorMut for ExitPass {
    fn visit(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        self.visited += 1;
        let idx = id.idx as usize;

        let mut balancers = mem::take(&mut store.balancers[idx]);
        for balancer in &mut balancers {
            balancer.exit(store, id);
        }
        store.balancers[idx] = balancers;

        for frame in store.output_frames[idx]
            .iter_mut()
            .chain(store.input_frames[idx].iter_mut())
        {
            frame.unset_data();
        }
        for queue in store.output_queues[idx]
            .iter_mut()
            .chain(store.input_queues[idx].iter_mut())
        {
            queue.unset_data();
        }
        store.task_id[idx] = 0;
        VisitorResult::Continue
    }
}
