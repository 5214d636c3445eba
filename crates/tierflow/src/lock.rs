//! Preview refresh lock.
//!
//! While the engine computes and applies positions it holds this lock so the
//! branch/preview collaborator does not move endpoint markers underneath it.
//! The lock is a cloneable handle over shared state: the engine keeps one
//! copy and the collaborator receives another.
//!
//! A lock that is never released expires on its own after the configured
//! timeout. Expiry is evaluated lazily whenever the lock is queried, so no
//! background thread is involved.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use crate::error::LayoutError;

/// Snapshot of a held lock.
#[derive(Debug, Clone, PartialEq)]
pub struct LockStatus {
    pub reason: String,
    pub held_for: Duration,
}

/// Counters kept across the lifetime of a lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    pub acquired: u64,
    pub released: u64,
    pub expired: u64,
    pub rejected: u64,
}

#[derive(Debug)]
struct Held {
    reason: String,
    since: Instant,
}

#[derive(Debug, Default)]
struct LockState {
    held: Option<Held>,
    stats: LockStats,
}

impl LockState {
    /// Drops the hold if it outlived `timeout`
    fn expire(&mut self, now: Instant, timeout: Duration) {
        let expired = self
            .held
            .as_ref()
            .is_some_and(|held| now.saturating_duration_since(held.since) >= timeout);
        if expired {
            if let Some(held) = self.held.take() {
                warn!(reason = held.reason, timeout:?; "Refresh lock timed out, releasing");
            }
            self.stats.expired += 1;
        }
    }
}

/// Shared handle to the preview refresh lock.
#[derive(Debug, Clone)]
pub struct RefreshLock {
    state: Arc<Mutex<LockState>>,
    timeout: Duration,
}

impl RefreshLock {
    /// Creates an unlocked lock that auto-expires after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Arc::default(),
            timeout,
        }
    }

    /// Returns the auto-expiry timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the lock. Returns false if it is already held.
    pub fn lock(&self, reason: impl Into<String>) -> bool {
        self.lock_at(reason, Instant::now())
    }

    /// Takes the lock as of `now`.
    pub fn lock_at(&self, reason: impl Into<String>, now: Instant) -> bool {
        let reason = reason.into();
        let mut state = self.state();
        state.expire(now, self.timeout);

        if let Some(held) = &state.held {
            warn!(current = held.reason, requested = reason; "Refresh lock already held");
            return false;
        }

        debug!(reason; "Refresh lock acquired");
        state.held = Some(Held { reason, since: now });
        state.stats.acquired += 1;
        true
    }

    /// Releases the lock. Returns false if it was not held.
    pub fn unlock(&self, reason: &str) -> bool {
        self.unlock_at(reason, Instant::now())
    }

    /// Releases the lock as of `now`.
    pub fn unlock_at(&self, reason: &str, now: Instant) -> bool {
        let mut state = self.state();
        state.expire(now, self.timeout);

        match state.held.take() {
            Some(held) => {
                let held_for = now.saturating_duration_since(held.since);
                debug!(reason, held_for:?; "Refresh lock released");
                state.stats.released += 1;
                true
            }
            None => {
                debug!(reason; "Refresh lock was not held");
                false
            }
        }
    }

    /// Whether the lock is currently held
    pub fn is_locked(&self) -> bool {
        self.is_locked_at(Instant::now())
    }

    /// Whether the lock is held as of `now`
    pub fn is_locked_at(&self, now: Instant) -> bool {
        let mut state = self.state();
        state.expire(now, self.timeout);
        state.held.is_some()
    }

    /// Reason and age of the current hold, if any
    pub fn status(&self) -> Option<LockStatus> {
        let now = Instant::now();
        let mut state = self.state();
        state.expire(now, self.timeout);
        state.held.as_ref().map(|held| LockStatus {
            reason: held.reason.clone(),
            held_for: now.saturating_duration_since(held.since),
        })
    }

    /// Counters since creation
    pub fn stats(&self) -> LockStats {
        self.state().stats
    }

    /// Gate for externally triggered endpoint mutations.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::RefreshLocked`] while the lock is held.
    pub fn check_mutation(&self) -> Result<(), LayoutError> {
        let now = Instant::now();
        let mut state = self.state();
        state.expire(now, self.timeout);

        let Some(held) = &state.held else {
            return Ok(());
        };
        let err = LayoutError::RefreshLocked {
            reason: held.reason.clone(),
            held_for: now.saturating_duration_since(held.since),
        };
        state.stats.rejected += 1;
        info!(reason = err.to_string(); "Rejected endpoint mutation");
        Err(err)
    }

    /// Takes the lock for the lifetime of the returned guard.
    ///
    /// If the lock is already held, the guard does not own it and leaves it
    /// untouched when dropped.
    pub fn guard(&self, reason: impl Into<String>) -> RefreshGuard {
        let owned = self.lock(reason);
        RefreshGuard {
            lock: self.clone(),
            owned,
        }
    }
}

/// Releases the refresh lock when dropped, on success and failure paths alike.
#[derive(Debug)]
pub struct RefreshGuard {
    lock: RefreshLock,
    owned: bool,
}

impl RefreshGuard {
    /// Whether this guard took the lock
    pub fn is_owned(&self) -> bool {
        self.owned
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if self.owned {
            self.lock.unlock("layout finished");
        }
    }
}
