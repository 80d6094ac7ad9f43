//! In-memory record index.
//!
//! Records are keyed by id and grouped by scope (owner for screenings,
//! screening for candidates). A scope is *fresh* once it has been loaded in
//! full from the store; only fresh scopes are served from memory. Mutations
//! write their acknowledged rows straight into the index, and a detected
//! mismatch with the store invalidates the scope so the next read refetches.
//!
//! Every scope carries a generation that moves on each write. A full read
//! only marks its scope fresh when no write landed while it was in flight.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::models::candidate::Candidate;
use crate::models::screening::Screening;

pub trait Indexed: Clone {
    fn id(&self) -> Uuid;
    fn scope(&self) -> Uuid;
}

impl Indexed for Screening {
    fn id(&self) -> Uuid {
        self.id
    }

    fn scope(&self) -> Uuid {
        self.owner_id
    }
}

impl Indexed for Candidate {
    fn id(&self) -> Uuid {
        self.id
    }

    fn scope(&self) -> Uuid {
        self.screening_id
    }
}

struct IndexState<T> {
    records: HashMap<Uuid, T>,
    fresh: HashSet<Uuid>,
    generations: HashMap<Uuid, u64>,
}

impl<T> IndexState<T> {
    fn bump(&mut self, scope: Uuid) {
        *self.generations.entry(scope).or_default() += 1;
    }
}

/// Position of a scope in its write history, taken before a full read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

pub struct RecordIndex<T> {
    state: RwLock<IndexState<T>>,
}

impl<T> Default for RecordIndex<T> {
    fn default() -> Self {
        Self {
            state: RwLock::new(IndexState {
                records: HashMap::new(),
                fresh: HashSet::new(),
                generations: HashMap::new(),
            }),
        }
    }
}

impl<T: Indexed> RecordIndex<T> {
    /// All records of a fresh scope, unordered. `None` means "refetch".
    pub fn snapshot(&self, scope: Uuid) -> Option<Vec<T>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if !state.fresh.contains(&scope) {
            return None;
        }
        Some(
            state
                .records
                .values()
                .filter(|r| r.scope() == scope)
                .cloned()
                .collect(),
        )
    }

    pub fn generation(&self, scope: Uuid) -> Generation {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Generation(state.generations.get(&scope).copied().unwrap_or_default())
    }

    /// Replaces everything known about `scope` with a full store read taken
    /// at `read_at`. If the scope was written meanwhile the read may predate
    /// that write, so the index is left untouched and the scope stays stale.
    /// Returns whether the read was installed.
    pub fn replace_scope(&self, scope: Uuid, read_at: Generation, records: &[T]) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let current = state.generations.get(&scope).copied().unwrap_or_default();
        if current != read_at.0 {
            return false;
        }
        state.records.retain(|_, r| r.scope() != scope);
        for record in records {
            state.records.insert(record.id(), record.clone());
        }
        state.fresh.insert(scope);
        true
    }

    pub fn get(&self, id: Uuid) -> Option<T> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.records.get(&id).cloned()
    }

    pub fn upsert(&self, record: T) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.bump(record.scope());
        if let Some(previous) = state.records.insert(record.id(), record) {
            let old_scope = previous.scope();
            state.bump(old_scope);
        }
    }

    pub fn remove(&self, id: Uuid) -> Option<T> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let removed = state.records.remove(&id);
        if let Some(r) = &removed {
            state.bump(r.scope());
        }
        removed
    }

    /// Marks a scope stale; its records stay addressable by id until refetched.
    pub fn invalidate(&self, scope: Uuid) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.bump(scope);
        state.fresh.remove(&scope);
    }

    /// Forgets a scope entirely, e.g. when its parent record is deleted.
    pub fn drop_scope(&self, scope: Uuid) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.bump(scope);
        state.records.retain(|_, r| r.scope() != scope);
        state.fresh.remove(&scope);
    }
}

/// Shared indexes for every record type, held in `AppState`.
#[derive(Default)]
pub struct RecordCache {
    pub screenings: RecordIndex<Screening>,
    pub candidates: RecordIndex<Candidate>,
}
