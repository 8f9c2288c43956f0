// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compound trees and load equalizers for parallel rendering.
//!
//! `tessera_core` decides, for every frame, which part of the image each
//! rendering resource draws and how the partial results are put back
//! together. It is `no_std` compatible (with `alloc`) and stores the tree in
//! struct-of-arrays form with generational handles.
//!
//! # Architecture
//!
//! ```text
//!   Resources (channels, views, segments, windows)
//!       │
//!       ▼
//!   CompoundStore::init() ──► task ids, frusta, inherited data
//!       │
//!       ▼
//!   CompoundStore::update() ──► UpdateReport
//!       │   equalizers ─► inheritance ─► outputs ─► inputs
//!       ▼
//!   Statistics ──► CompoundStore::notify_load_data() ──► equalizers
//! ```
//!
//! **[`compound`]**: Struct-of-arrays compound tree with generational
//! handles, inheritance, visitors and the update entry points.
//!
//! **[`equalizer`]**: Load, view, DFR, framerate and tile equalizers that
//! adjust the tree every frame from measured timings.
//!
//! **[`geometry`]** and **[`frustum`]**: Decomposition value types and
//! frustum math.
//!
//! **[`frame`]** and **[`tile_queue`]**: Output and input descriptors
//! linking compounds that exchange pixels or work.
//!
//! **[`resources`]**: The interface to the rendering resources, with an
//! in-memory implementation.
//!
//! **[`report`]** and **[`error`]**: What an update produced, and the
//! configuration errors that abort it.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) and event types, with the
//! zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `serde` (disabled by default): Derives `Serialize` and `Deserialize` for
//!   configuration types.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod attributes;
pub mod compound;
pub mod config;
pub mod dirty;
pub mod equalizer;
pub mod error;
pub mod frame;
pub mod frustum;
pub mod geometry;
pub mod listener;
pub mod report;
pub mod resources;
pub mod statistics;
pub mod swap_barrier;
pub mod tile_queue;
pub mod trace;
pub mod transform;

mod visitor;
