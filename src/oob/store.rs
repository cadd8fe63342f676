//! Bounded, newest-first log of captured interactions

use crate::error::{PingbackError, Result};
use crate::models::Interaction;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::demo;

/// Maximum number of interactions retained by a store
pub const MAX_INTERACTIONS: usize = 100;

#[derive(Debug, Default)]
struct StoreState {
    /// Head is the most recent insert
    entries: VecDeque<Interaction>,
    /// Number of demo interactions ever seeded, used to keep demo IDs unique
    demo_seeded: u64,
}

/// Thread-safe interaction log shared by the ingestion and read paths
///
/// Cloning the store yields another handle to the same log.
#[derive(Debug, Clone, Default)]
pub struct InteractionStore {
    state: Arc<Mutex<StoreState>>,
}

impl InteractionStore {
    /// Creates a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends an interaction, evicting the oldest entries past capacity
    pub fn insert(&self, interaction: Interaction) {
        let mut state = self.lock_for_write();
        state.entries.push_front(interaction);
        if state.entries.len() > MAX_INTERACTIONS {
            state.entries.truncate(MAX_INTERACTIONS);
        }
    }

    /// Returns an independent newest-first copy of the log
    pub fn snapshot(&self) -> Vec<Interaction> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.iter().cloned().collect()
    }

    /// Like [`snapshot`](Self::snapshot), but reports a poisoned lock instead of reading through it
    pub fn try_snapshot(&self) -> Result<Vec<Interaction>> {
        let state = self.state.lock().map_err(|_| {
            PingbackError::StoreUnavailable("lock poisoned by a failed writer".to_string())
        })?;
        Ok(state.entries.iter().cloned().collect())
    }

    /// Appends the demo DNS interactions to the tail when no DNS-simulated
    /// interaction is present. Returns whether anything was seeded.
    pub fn seed_demo_data_if_empty(&self) -> bool {
        let mut state = self.lock_for_write();
        if state.entries.iter().any(Interaction::is_dns) {
            return false;
        }

        let first_seq = state.demo_seeded + 1;
        let demos = demo::demo_interactions(first_seq);
        state.demo_seeded += demos.len() as u64;
        state.entries.extend(demos);
        state.entries.truncate(MAX_INTERACTIONS);

        debug!("Seeded demo DNS interactions starting at demo-dns-{}", first_seq);
        true
    }

    /// Number of interactions currently retained
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquires the lock for mutation, recovering from poisoning so that a
    /// panicked writer never blocks later inserts.
    fn lock_for_write(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Interaction store lock was poisoned, recovering");
                let mut guard = poisoned.into_inner();
                guard.entries.truncate(MAX_INTERACTIONS);
                self.state.clear_poison();
                guard
            }
        }
    }
}
