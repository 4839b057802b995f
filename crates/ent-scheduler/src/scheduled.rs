//! Time-ordered set of deferred signals.
//!
//! Entries are keyed by `(due time, admission sequence)`. Two distinct signals
//! due at the same instant therefore never collide; they pop in the order the
//! sorter delivered them. Only a second copy of the same message id is
//! collapsed.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::RequestMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ScheduleKey {
    due_ns: u64,
    seq: u64,
}

/// Serialized as the ordered list of its messages; admission sequence numbers
/// are rebuilt on load so the order survives a round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<RequestMessage>", into = "Vec<RequestMessage>")]
pub struct ScheduledSignals {
    entries: BTreeMap<ScheduleKey, RequestMessage>,
    ids: HashSet<Uuid>,
    next_seq: u64,
}

impl ScheduledSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a scheduled signal. Returns false if a message with the same id
    /// is already present.
    ///
    /// Callers must only pass messages for which
    /// [`RequestMessage::is_scheduled_signal`] holds.
    pub fn insert(&mut self, message: RequestMessage) -> bool {
        debug_assert!(
            message.is_scheduled_signal(),
            "request must be a scheduled signal"
        );
        if !self.ids.insert(message.id) {
            return false;
        }
        let key = ScheduleKey {
            due_ns: message.scheduled_time_ns.unwrap_or_default(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(key, message);
        true
    }

    pub fn peek_due_time(&self) -> Option<u64> {
        self.entries.keys().next().map(|key| key.due_ns)
    }

    /// Remove and return the earliest entry if it is due at `now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<RequestMessage> {
        let entry = self.entries.first_entry()?;
        if entry.key().due_ns > now_ns {
            return None;
        }
        let message = entry.remove();
        self.ids.remove(&message.id);
        Some(message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

}

// Admission sequence numbers are an encoding detail; equality is by order.
impl PartialEq for ScheduledSignals {
    fn eq(&self, other: &Self) -> bool {
        self.entries.values().eq(other.entries.values())
    }
}

impl Eq for ScheduledSignals {}

#[derive(Debug, thiserror::Error)]
#[error("scheduled entry {id} is not a signal with a due time")]
pub struct InvalidScheduledEntry {
    pub id: Uuid,
}

impl TryFrom<Vec<RequestMessage>> for ScheduledSignals {
    type Error = InvalidScheduledEntry;

    fn try_from(messages: Vec<RequestMessage>) -> Result<Self, Self::Error> {
        let mut set = ScheduledSignals::new();
        for message in messages {
            if !message.is_scheduled_signal() {
                return Err(InvalidScheduledEntry { id: message.id });
            }
            set.insert(message);
        }
        Ok(set)
    }
}

impl From<ScheduledSignals> for Vec<RequestMessage> {
    fn from(set: ScheduledSignals) -> Self {
        set.entries.into_values().collect()
    }
}
