// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scoped subscriptions to channel load statistics.
//!
//! Equalizers subscribe to the channels they balance. A subscription is a
//! [`Subscription`] value: dropping it unsubscribes. An equalizer that is
//! reset, replaced, or destroyed therefore can never leave a dangling
//! listener behind.
//!
//! The registry is shared between the compound store (which routes incoming
//! statistics) and the subscriptions (which remove themselves), so it is
//! reference counted. Subscriptions hold a weak reference and outliving the
//! registry is harmless.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::equalizer::EqualizerId;
use crate::resources::ChannelId;

/// Identifies who receives a channel's statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey {
    /// Receiving equalizer.
    pub equalizer: EqualizerId,
    /// Equalizer-defined slot, e.g. a leaf or branch index.
    pub slot: u32,
}

#[derive(Debug, Default)]
struct Inner {
    next_token: u64,
    entries: Vec<Entry>,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    token: u64,
    channel: ChannelId,
    key: ListenerKey,
}

/// Registry of channel listeners.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `key` to statistics of `channel`.
    ///
    /// The subscription lasts until the returned handle is dropped.
    pub fn subscribe(&self, channel: ChannelId, key: ListenerKey) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.entries.push(Entry {
            token,
            channel,
            key,
        });
        Subscription {
            registry: Rc::downgrade(&self.inner),
            token,
            channel,
            key,
        }
    }

    /// Returns the listeners of `channel`, in subscription order.
    #[must_use]
    pub fn listeners_for(&self, channel: ChannelId) -> Vec<ListenerKey> {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|e| e.channel == channel)
            .map(|e| e.key)
            .collect()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Returns `true` if nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A live subscription. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<RefCell<Inner>>,
    token: u64,
    channel: ChannelId,
    key: ListenerKey,
}

impl Subscription {
    /// The observed channel.
    #[must_use]
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// The receiving key.
    #[must_use]
    pub fn key(&self) -> ListenerKey {
        self.key
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.borrow_mut().entries.retain(|e| e.token != self.token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(equalizer: u32, slot: u32) -> ListenerKey {
        ListenerKey {
            equalizer: EqualizerId(equalizer),
            slot,
        }
    }

    #[test]
    fn drop_unsubscribes() {
        let registry = ListenerRegistry::new();
        let a = registry.subscribe(ChannelId(1), key(0, 0));
        let b = registry.subscribe(ChannelId(1), key(0, 1));
        assert_eq!(registry.listeners_for(ChannelId(1)), [key(0, 0), key(0, 1)]);
        drop(a);
        assert_eq!(registry.listeners_for(ChannelId(1)), [key(0, 1)]);
        drop(b);
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_subscriptions_are_independent() {
        let registry = ListenerRegistry::new();
        let a = registry.subscribe(ChannelId(2), key(1, 0));
        let b = registry.subscribe(ChannelId(2), key(1, 0));
        drop(a);
        assert_eq!(registry.len(), 1);
        assert_eq!(b.channel(), ChannelId(2));
    }

    #[test]
    fn subscription_may_outlive_registry() {
        let registry = ListenerRegistry::new();
        let sub = registry.subscribe(ChannelId(3), key(2, 0));
        drop(registry);
        drop(sub);
    }
}
