// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Equalizer callbacks and inheritance.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::mem;

use crate::attributes::Tasks;
use crate::compound::{CompoundId, CompoundStore, CompoundVisitorMut, VisitorResult};
use crate::config::EngineConfig;
use crate::equalizer::EqualizerContext;
use crate::error::InvariantViolation;
use crate::report::Diagnostic;
use crate::resources::{ChannelId, Resources};
use crate::trace::Tracer;

/// Runs the equalizers of every compound, then recomputes its inherited
/// data.
pub(crate) struct DataPass<'a, 't> {
    pub(crate) frame_number: u32,
    pub(crate) resources: &'a dyn Resources,
    pub(crate) config: &'a EngineConfig,
    pub(crate) tracer: &'a mut Tracer<'t>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Last compound in traversal order drawing on each channel.
    pub(crate) last_draw: BTreeMap<ChannelId, CompoundId>,
    pub(crate) error: Option<InvariantViolation>,
    pub(crate) visited: u32,
}

impl<'a, 't> DataPass<'a, 't> {
    pub(crate) fn new(
        frame_number: u32,
        resources: &'a dyn Resources,
        config: &'a EngineConfig,
        tracer: &'a mut Tracer<'t>,
    ) -> Self {
        Self {
            frame_number,
            resources,
            config,
            tracer,
            diagnostics: Vec::new(),
            last_draw: BTreeMap::new(),
            error: None,
            visited: 0,
        }
    }

    fn update_equalizers(
        &mut self,
        store: &mut CompoundStore,
        id: CompoundId,
    ) -> Result<(), InvariantViolation> {
        let mut balancers = mem::take(&mut store.balancers[id.idx as usize]);
        let mut result = Ok(());
        for balancer in &mut balancers {
            let mut ctx = EqualizerContext {
                frame_number: self.frame_number,
                resources: self.resources,
                config: self.config,
                tracer: &mut *self.tracer,
                diagnostics: &mut self.diagnostics,
            };
            result = balancer.notify_update_pre(store, id, &mut ctx);
            if result.is_err() {
                break;
            }
        }
        store.balancers[id.idx as usize] = balancers;
        result
    }

    fn track_draw(&mut self, store: &CompoundStore, id: CompoundId) {
        if !store.inherit_tasks(id).contains(Tasks::DRAW) || !store.is_active(id, self.resources) {
            return;
        }
        if let Some(channel) = store.channel(id) {
            self.last_draw.insert(channel, id);
        }
    }
}

impl CompoundVisitorMut for DataPass<'_, '_> {
    fn visit(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        self.visited += 1;
        let result = self
            .update_equalizers(store, id)
            .and_then(|()| store.update_inherit_data(id, self.frame_number, self.resources));
        match result {
            Ok(()) => {
                self.track_draw(store, id);
                VisitorResult::Continue
            }
            Err(err) => {
                self.error = Some(err);
                VisitorResult::Terminate
            }
        }
    }
}

/// Recomputes the inherited data of a subtree without running equalizers.
pub(crate) struct InheritPass<'a> {
    pub(crate) frame_number: u32,
    pub(crate) resources: &'a dyn Resources,
    pub(crate) error: Option<InvariantViolation>,
}

impl CompoundVisitorMut for InheritPass<'_> {
    fn visit(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        match store.update_inherit_data(id, self.frame_number, self.resources) {
            Ok(()) => VisitorResult::Continue,
            Err(err) => {
                self.error = Some(err);
                VisitorResult::Terminate
            }
        }
    }
}
