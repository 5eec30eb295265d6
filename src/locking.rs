//! Advisory single-editor lock table.
//!
//! One entry per process: the holding user and the time of the last renewal.
//! An entry older than the timeout counts as unlocked but stays in the table
//! until it is replaced, released or purged.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockEntry {
    pub user: String,
    pub renewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("process {process} is locked by {holder}")]
    HeldByOther { process: i64, holder: String },
}

/// Keyed lock table shared by all editor sessions of the application.
///
/// Check-and-renew happens under the entry guard of the backing map, so two
/// sessions can never both observe themselves as the live holder.
#[derive(Clone)]
pub struct LockManager {
    entries: Arc<DashMap<i64, LockEntry>>,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self { entries: Arc::new(DashMap::new()), timeout }
    }

    pub fn with_timeout_minutes(minutes: u64) -> Self {
        Self::new(Duration::minutes(minutes as i64))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_live(&self, entry: &LockEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.renewed_at) < self.timeout
    }

    /// Unconditionally (re)claims the lock for `user`.
    pub fn set_locked(&self, process: i64, user: &str) {
        self.set_locked_at(process, user, Utc::now());
    }

    pub fn set_locked_at(&self, process: i64, user: &str, now: DateTime<Utc>) {
        self.entries.insert(process, LockEntry { user: user.to_string(), renewed_at: now });
    }

    pub fn is_locked(&self, process: i64) -> bool {
        self.is_locked_at(process, Utc::now())
    }

    pub fn is_locked_at(&self, process: i64, now: DateTime<Utc>) -> bool {
        self.entries.get(&process).map(|entry| self.is_live(entry.value(), now)).unwrap_or(false)
    }

    /// The user holding a live lock on `process`, if any.
    pub fn holder(&self, process: i64) -> Option<String> {
        self.holder_at(process, Utc::now())
    }

    pub fn holder_at(&self, process: i64, now: DateTime<Utc>) -> Option<String> {
        self.entries
            .get(&process)
            .filter(|entry| self.is_live(entry.value(), now))
            .map(|entry| entry.user.clone())
    }

    /// Claims the lock unless another user holds a live one.
    pub fn try_acquire(&self, process: i64, user: &str) -> Result<(), LockError> {
        self.try_acquire_at(process, user, Utc::now())
    }

    pub fn try_acquire_at(&self, process: i64, user: &str, now: DateTime<Utc>) -> Result<(), LockError> {
        let fresh = LockEntry { user: user.to_string(), renewed_at: now };
        match self.entries.entry(process) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if current.user != user && self.is_live(current, now) {
                    return Err(LockError::HeldByOther { process, holder: current.user.clone() });
                }
                if current.user != user {
                    tracing::info!("Taking over expired lock on process {} from {}", process, current.user);
                }
                occupied.insert(fresh);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
            }
        }
        tracing::debug!("Process {} locked by {}", process, user);
        Ok(())
    }

    /// Renews the lock if `user` still holds a live one. Returns `false` when the
    /// lock expired or belongs to somebody else; nothing is changed in that case.
    pub fn refresh(&self, process: i64, user: &str) -> bool {
        self.refresh_at(process, user, Utc::now())
    }

    pub fn refresh_at(&self, process: i64, user: &str, now: DateTime<Utc>) -> bool {
        match self.entries.get_mut(&process) {
            Some(mut entry) => {
                if entry.user == user && self.is_live(entry.value(), now) {
                    entry.renewed_at = now;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    pub fn release(&self, process: i64) {
        self.entries.remove(&process);
    }

    /// Releases the lock only if `user` is the recorded holder.
    pub fn release_if_holder(&self, process: i64, user: &str) -> bool {
        let released = self.entries.remove_if(&process, |_, entry| entry.user == user).is_some();
        if released {
            tracing::debug!("Process {} unlocked by {}", process, user);
        }
        released
    }

    /// Drops entries that are past their timeout. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_live(entry, now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
