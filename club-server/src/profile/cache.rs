//! TTL profile cache
//!
//! Entries are dropped synchronously by a store commit hook whenever a
//! commit writes the user's document. Each uid also carries a generation
//! that every invalidation bumps. A resolver takes a [`ReadTicket`] before
//! reading the store and may only cache what it read while the generation
//! is unchanged, so a read that raced a commit is never cached.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use shared::models::{User, collections};
use tokio::time::Instant;

use crate::db::DocStore;

/// Default time a resolved profile stays cached
pub const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(5 * 60);

struct CachedProfile {
    user: User,
    cached_at: Instant,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    cached: Option<CachedProfile>,
}

/// Generation of one uid observed before a store read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket(u64);

/// Resolved profiles keyed by uid
#[derive(Clone)]
pub struct ProfileCache {
    slots: Arc<DashMap<String, Slot>>,
    ttl: Duration,
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new(DEFAULT_PROFILE_TTL)
    }
}

impl ProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, uid: &str) -> Option<User> {
        let mut slot = self.slots.get_mut(uid)?;
        let fresh = slot
            .cached
            .as_ref()
            .is_some_and(|entry| entry.cached_at.elapsed() < self.ttl);
        if !fresh {
            slot.cached = None;
            return None;
        }
        slot.cached.as_ref().map(|entry| entry.user.clone())
    }

    /// Take before reading `uid` from the store
    pub fn read_ticket(&self, uid: &str) -> ReadTicket {
        ReadTicket(self.slots.entry(uid.to_string()).or_default().generation)
    }

    /// Cache `user` unless its uid was invalidated after `ticket` was taken.
    /// Returns whether the entry was stored.
    pub fn insert(&self, user: User, ticket: ReadTicket) -> bool {
        let mut slot = self.slots.entry(user.uid.clone()).or_default();
        if slot.generation != ticket.0 {
            tracing::debug!(uid = %user.uid, "Profile changed during read, not caching");
            return false;
        }
        slot.cached = Some(CachedProfile {
            user,
            cached_at: Instant::now(),
        });
        true
    }

    pub fn invalidate(&self, uid: &str) {
        let mut slot = self.slots.entry(uid.to_string()).or_default();
        slot.generation += 1;
        if slot.cached.take().is_some() {
            tracing::debug!(uid, "Profile cache entry invalidated");
        }
    }

    pub fn clear(&self) {
        for mut slot in self.slots.iter_mut() {
            slot.generation += 1;
            slot.cached = None;
        }
    }

    /// Number of cached profiles
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.cached.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invalidate cached profiles from inside every commit that writes a
    /// user document
    pub fn attach(&self, store: &DocStore) {
        let cache = self.clone();
        store.on_commit(move |event| {
            event
                .changes
                .iter()
                .filter(|change| change.collection == collections::USERS)
                .for_each(|change| cache.invalidate(&change.id));
        });
    }
}
