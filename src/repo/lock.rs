//! Scoped advisory locking.

use crate::error::{Error, Result};
use crate::repo::{ElementId, LockState, Repository};

/// Holds the advisory lock on one element for the guard's lifetime.
///
/// Acquisition happens before any mutation, so a failed acquire aborts the
/// operation with no partial state. Release runs in `Drop` and therefore on
/// every exit path, including mid-mutation errors — the repository may then
/// be partially updated, which the design accepts and surfaces to the
/// operator rather than rolling back.
///
/// A guard only ever exists for a lock it actually acquired, so it can never
/// release somebody else's lock.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    repo: &'a dyn Repository,
    element: ElementId,
}

impl<'a> LockGuard<'a> {
    /// Take the lock on `element`, or report the current holder.
    pub fn acquire(repo: &'a dyn Repository, element: ElementId) -> Result<Self> {
        if repo.lock(element) {
            return Ok(Self { repo, element });
        }
        let holder = match repo.lock_state(element) {
            LockState::Held { holder } => holder,
            // Lost the race against an external user; no holder to name.
            LockState::Unlocked => "unknown".to_string(),
        };
        Err(Error::LockUnavailable {
            element: element.to_string(),
            holder,
        })
    }

    pub fn element(&self) -> ElementId {
        self.element
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.repo.unlock(self.element);
    }
}
