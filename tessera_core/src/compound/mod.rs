// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compound tree data model.
//!
//! A *compound* is a node in a tree describing how one frame is rendered in
//! parallel. Each compound has:
//!
//! - An identity ([`CompoundId`]), a generational handle that becomes stale
//!   when the compound is destroyed.
//! - Topology: parent, first-child and sibling links forming an ordered tree.
//! - **Configured data** set by the caller: channel, viewport, range, pixel
//!   and sub-pixel decomposition, zoom, eyes, tasks, period and phase, a
//!   frustum, frames, tile queues, a swap barrier and equalizers.
//! - **Inherited data** produced by [`update`](CompoundStore::update): the
//!   configured data composed with the parent's inherited data.
//!
//! Compounds are stored in struct-of-arrays layout with index-based handles.
//! Several independent trees can live in one store; each root is updated on
//! its own.
//!
//! # Dirty tracking
//!
//! Mutations mark the dirty channels described in [`dirty`](crate::dirty):
//!
//! - **TOPOLOGY** on the parent whose child list changed. Equalizers on it
//!   and its ancestors rebuild their split trees.
//! - **FRUSTUM** on destinations whose view, segment or pixel viewport
//!   changed. Their frustum is recomputed after the data pass.

mod context;
mod data;
mod frustum;
mod id;
mod inherit;
mod store;
mod traverse;
mod update;

pub use context::RenderContext;
pub use data::{CompoundData, InheritData};
pub use id::{CompoundId, INVALID};
pub use store::CompoundStore;
pub use traverse::{Children, CompoundVisitor, CompoundVisitorMut, VisitorResult};
