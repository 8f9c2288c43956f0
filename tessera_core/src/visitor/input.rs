// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input frame and input tile queue linking.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::attributes::Tasks;
use crate::compound::{CompoundId, CompoundStore, CompoundVisitorMut, VisitorResult};
use crate::frame::FrameRef;
use crate::report::Diagnostic;
use crate::resources::Resources;

/// Links every input of an active compound to the output of the same name
/// registered by the output pass.
pub(crate) struct InputPass<'a> {
    pub(crate) frame_number: u32,
    pub(crate) resources: &'a dyn Resources,
    pub(crate) frames: &'a BTreeMap<String, FrameRef>,
    pub(crate) queues: &'a BTreeMap<String, (CompoundId, usize)>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) visited: u32,
}

impl<'a> InputPass<'a> {
    pub(crate) fn new(
        frame_number: u32,
        resources: &'a dyn Resources,
        frames: &'a BTreeMap<String, FrameRef>,
        queues: &'a BTreeMap<String, (CompoundId, usize)>,
    ) -> Self {
        Self {
            frame_number,
            resources,
            frames,
            queues,
            diagnostics: Vec::new(),
            visited: 0,
        }
    }

    fn update_frames(&mut self, store: &mut CompoundStore, id: CompoundId) {
        let idx = id.idx as usize;
        if store.input_frames[idx].is_empty() {
            return;
        }
        let channel = store.channel(id);
        let inherit = *store.inherit(id);
        if channel.is_none() || !inherit.tasks.contains(Tasks::ASSEMBLE) {
            for frame in &mut store.input_frames[idx] {
                frame.unset_data();
            }
            return;
        }

        // Assembly position is relative to the assembling channel.
        let origin = if channel == inherit.channel {
            (inherit.pvp.x, inherit.pvp.y)
        } else {
            channel
                .and_then(|c| self.resources.channel(c))
                .map_or((0, 0), |c| (c.pixel_viewport().x, c.pixel_viewport().y))
        };

        for i in 0..store.input_frames[idx].len() {
            let name = &store.input_frames[idx][i].name;
            let Some(&source) = self.frames.get(name) else {
                log::warn!("{id:?} has no output frame for input frame {name:?}");
                let name = name.clone();
                store.input_frames[idx][i].unset_data();
                self.diagnostics.push(Diagnostic::MissingOutputFrame { compound: id, name });
                continue;
            };
            let output = &store.output_frames[source.compound.idx as usize][source.index];
            let Some(mut data) = output.data().copied() else {
                store.input_frames[idx][i].unset_data();
                continue;
            };
            data.offset = (data.offset.0 - origin.0, data.offset.1 - origin.1);

            let frame = &mut store.input_frames[idx][i];
            let zoom = frame.native_zoom.filter(|z| z.is_valid()).unwrap_or(data.zoom);
            frame.cycle_data(data);
            frame.set_source(source);
            frame.set_offset(data.offset);
            frame.set_zoom(zoom);
            log::trace!("{id:?} input frame {:?} from {source:?}", frame.name);

            store.output_frames[source.compound.idx as usize][source.index]
                .add_input(FrameRef { compound: id, index: i });
        }
    }

    fn update_queues(&mut self, store: &mut CompoundStore, id: CompoundId) {
        for queue in &mut store.input_queues[id.idx as usize] {
            match self.queues.get(&queue.name) {
                Some(&source) => {
                    queue.cycle_data(self.frame_number);
                    queue.set_source(source);
                }
                None => {
                    log::warn!("{id:?} has no output queue for input queue {:?}", queue.name);
                    queue.unset_data();
                    self.diagnostics.push(Diagnostic::MissingOutputQueue {
                        compound: id,
                        name: queue.name.clone(),
                    });
                }
            }
        }
    }
}

impl CompoundVisitorMut for InputPass<'_> {
    fn visit(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        self.visited += 1;
        if !store.is_active(id, self.resources) {
            return VisitorResult::Prune;
        }
        self.update_frames(store, id);
        self.update_queues(store, id);
        VisitorResult::Continue
    }
}
