//! Per-watch registry of outstanding notification cancel handles.
//!
//! The pending and resolution streams are independent, so a resolution can
//! be processed before the pending put it resolves. Resolved names are
//! remembered for one login lifetime and a late pending put for them is
//! refused.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Ceiling for deadlines derived from configured durations.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + duration`, saturating at [`FAR_FUTURE`] from now.
pub(crate) fn instant_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration).unwrap_or_else(|| now + FAR_FUTURE)
}

struct Entry {
    id: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<String, Entry>,
    resolved: HashMap<String, Instant>,
}

impl RegistryState {
    fn forget_expired(&mut self, now: Instant) {
        self.resolved.retain(|_, until| *until > now);
    }
}

/// Request name to cancel handle. Entries carry an id so a finishing
/// notification only removes its own registration.
pub(crate) struct RequestRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
    retention: Duration,
}

impl RequestRegistry {
    /// Registry remembering resolved names for `retention`.
    pub(crate) fn new(retention: Duration) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            next_id: AtomicU64::new(0),
            retention,
        }
    }

    /// Register `token` for `name`, canceling any handle it replaces.
    ///
    /// Returns `None` without registering when `name` was resolved within
    /// the retention window.
    pub(crate) fn register(&self, name: &str, token: CancellationToken) -> Option<u64> {
        let (id, replaced) = {
            let mut state = self.lock();
            state.forget_expired(Instant::now());
            if state.resolved.contains_key(name) {
                return None;
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            (id, state.entries.insert(name.to_string(), Entry { id, token }))
        };
        if let Some(previous) = replaced {
            previous.token.cancel();
        }
        Some(id)
    }

    /// Mark `name` resolved, then cancel and forget its handle. Returns
    /// whether a handle existed.
    pub(crate) fn resolve(&self, name: &str) -> bool {
        let until = instant_after(self.retention);
        let removed = {
            let mut state = self.lock();
            state.forget_expired(Instant::now());
            state.resolved.insert(name.to_string(), until);
            state.entries.remove(name)
        };
        let Some(entry) = removed else {
            return false;
        };
        entry.token.cancel();
        true
    }

    /// Forget the handle for `name` if it is still registration `id`.
    pub(crate) fn complete(&self, name: &str, id: u64) {
        let mut state = self.lock();
        if state.entries.get(name).is_some_and(|entry| entry.id == id) {
            state.entries.remove(name);
        }
    }

    /// Cancel and forget every handle.
    pub(crate) fn cancel_all(&self) {
        let drained: Vec<Entry> = self.lock().entries.drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            entry.token.cancel();
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.lock().entries.contains_key(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
