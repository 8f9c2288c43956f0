// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The compound store uses multi-channel dirty tracking (via
//! [`understory_dirty`]) to defer work that only some compounds need each
//! frame. Both channels are local-only: nothing propagates to descendants,
//! because inherited data is recomputed for every compound on every frame
//! anyway.
//!
//! - [`TOPOLOGY`] is marked on the *parent* whenever its child list changes
//!   (add, insert, reparent, remove). Equalizers attached to that parent
//!   built their internal split tree from the old child list, so the next
//!   [`update`](crate::compound::CompoundStore::update) drains this channel
//!   and clears their trees before the data pass rebuilds them.
//!
//! - [`FRUSTUM`] is marked on a destination compound when its channel is set,
//!   when the channel's pixel viewport (with overdraw) changes during
//!   inheritance, or when the caller reports a changed view or segment via
//!   [`invalidate_frustum`](crate::compound::CompoundStore::invalidate_frustum).
//!   It is drained after the data pass to recompute the compound frustum from
//!   the view or segment.
//!
//! Callers never need to query dirty state directly.

use understory_dirty::Channel;

/// Child list changed: attached equalizers must rebuild their split trees.
pub const TOPOLOGY: Channel = Channel::new(0);

/// Destination frustum inputs changed: recompute the compound frustum.
pub const FRUSTUM: Channel = Channel::new(1);
