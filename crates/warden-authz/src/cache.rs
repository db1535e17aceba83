//! Per-user resolution cache.
//!
//! Entries hold a [`Resolution`], never a snapshot of the catalogue, so a
//! super-admin always sees permissions added after it was cached. Every
//! invalidation bumps a generation counter; a resolution computed under an
//! older generation is dropped instead of inserted, which keeps a slow
//! reader from re-populating the cache with pre-write data.
//!
//! Writers hold a [`WriteGuard`] from before the store write until after the
//! matching invalidation. While any guard is alive the cache serves nothing
//! and stores nothing, so a committed revocation is never answered from an
//! entry cached before it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::resolver::Resolution;

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    writes_in_flight: usize,
    entries: HashMap<Uuid, Resolution>,
}

/// Shared across clones.
#[derive(Debug, Clone)]
pub struct ResolutionCache {
    state: Arc<RwLock<CacheState>>,
    capacity: usize,
}

impl ResolutionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            capacity: capacity.max(1),
        }
    }

    /// Current generation; pass it back to [`insert`](Self::insert).
    pub fn generation(&self) -> u64 {
        self.state
            .read()
            .map(|state| state.generation)
            .unwrap_or_else(|poisoned| poisoned.into_inner().generation)
    }

    pub fn get(&self, user_id: Uuid) -> Option<Resolution> {
        let state = self.state.read().ok()?;
        if state.writes_in_flight > 0 {
            return None;
        }
        state.entries.get(&user_id).cloned()
    }

    /// Store a resolution computed while the cache was at `generation`.
    /// Returns false when an invalidation happened in between.
    pub fn insert(&self, user_id: Uuid, resolution: Resolution, generation: u64) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if state.generation != generation || state.writes_in_flight > 0 {
            return false;
        }
        if state.entries.len() >= self.capacity && !state.entries.contains_key(&user_id) {
            state.entries.clear();
        }
        state.entries.insert(user_id, resolution);
        true
    }

    /// Mark a store write as started. The cache stays bypassed until the
    /// returned guard is dropped.
    pub fn begin_write(&self) -> WriteGuard {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        state.writes_in_flight += 1;
        WriteGuard {
            state: Arc::clone(&self.state),
        }
    }

    pub fn writes_in_flight(&self) -> usize {
        self.state
            .read()
            .map(|state| state.writes_in_flight)
            .unwrap_or_else(|poisoned| poisoned.into_inner().writes_in_flight)
    }

    /// Drop every entry. Used after role and package edits.
    pub fn invalidate_all(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        state.entries.clear();
    }

    /// Drop one user's entry. Used after user edits.
    pub fn invalidate_user(&self, user_id: Uuid) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        state.entries.remove(&user_id);
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|state| state.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ends a write started by [`ResolutionCache::begin_write`] when dropped.
#[must_use = "the cache is bypassed only while the guard is alive"]
#[derive(Debug)]
pub struct WriteGuard {
    state: Arc<RwLock<CacheState>>,
}

impl WriteGuard {
    /// End the write. Same as dropping the guard.
    pub fn end_write(self) {}
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.writes_in_flight = state.writes_in_flight.saturating_sub(1);
    }
}
