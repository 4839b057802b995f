use thiserror::Error;
use uuid::Uuid;

use crate::message::InstanceId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("entity is locked by '{holder}', cannot grant to '{requester}'")]
    LockHeld {
        holder: InstanceId,
        requester: InstanceId,
    },
    #[error("entity is not locked")]
    NotLocked,
    #[error("lock is held by '{holder}', release requested by '{requester}'")]
    LockOwnerMismatch {
        holder: InstanceId,
        requester: InstanceId,
    },
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
    #[error("scheduled request {0} is not a signal")]
    ScheduledRequestNotSignal(Uuid),
    #[error("snapshot encode error: {0}")]
    SnapshotEncode(String),
    #[error("snapshot decode error: {0}")]
    SnapshotDecode(String),
    #[error("sorter state decode error: {0}")]
    SorterDecode(String),
}
