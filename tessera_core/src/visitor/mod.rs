// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The traversals that make up a compound tree update.
//!
//! Each pass is a [`CompoundVisitorMut`](crate::compound::CompoundVisitorMut)
//! walked over one root:
//!
//! - [`InitPass`] numbers the compounds, names anonymous frames and queues,
//!   and computes the first inherited data.
//! - [`DataPass`] runs the equalizers of each compound and then recomputes
//!   its inherited data, top-down, so children always inherit from a current
//!   parent. [`InheritPass`] is the same walk without equalizers, used to
//!   refresh a subtree after its destination frustum changed.
//! - [`OutputPass`] prepares output frames and tile queues, and joins swap
//!   barriers.
//! - [`InputPass`] links input frames and queues to the outputs of the same
//!   name.
//! - [`ExitPass`] releases everything a run accumulated.
//!
//! The passes are driven by
//! [`CompoundStore::init`](crate::compound::CompoundStore::init),
//! [`update`](crate::compound::CompoundStore::update) and
//! [`exit`](crate::compound::CompoundStore::exit).

mod data;
mod exit;
mod init;
mod input;
mod output;

pub(crate) use data::{DataPass, InheritPass};
pub(crate) use exit::ExitPass;
pub(crate) use init::InitPass;
pub(crate) use input::InputPass;
pub(crate) use output::OutputPass;
