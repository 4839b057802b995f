//! Exclusive lock held by a coordinating orchestration.

use crate::error::LockError;
use crate::state::SchedulerState;

impl SchedulerState {
    pub fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }

    /// Grant the lock to `owner`. Re-acquiring by the current holder is a no-op.
    pub fn try_acquire_lock(&mut self, owner: &str) -> Result<(), LockError> {
        match self.locked_by.as_deref() {
            None => {
                log::debug!("entity locked by {owner}");
                self.locked_by = Some(owner.to_string());
                Ok(())
            }
            Some(holder) if holder == owner => Ok(()),
            Some(holder) => Err(LockError::LockHeld {
                holder: holder.to_string(),
                requester: owner.to_string(),
            }),
        }
    }

    pub fn release_lock(&mut self, owner: &str) -> Result<(), LockError> {
        match self.locked_by.as_deref() {
            None => Err(LockError::NotLocked),
            Some(holder) if holder == owner => {
                log::debug!("entity lock released by {owner}");
                self.locked_by = None;
                Ok(())
            }
            Some(holder) => Err(LockError::LockOwnerMismatch {
                holder: holder.to_string(),
                requester: owner.to_string(),
            }),
        }
    }
}
