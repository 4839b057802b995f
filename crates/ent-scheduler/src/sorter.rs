//! Ordering and deduplication of inbound requests.
//!
//! The scheduler treats the sorter as a black box: it loads the sorter from
//! the opaque [`SorterState`] carried on the snapshot, feeds it requests, and
//! persists it back. [`SequenceSorter`] is the bundled implementation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::message::{InstanceId, RequestMessage};

/// Opaque sorter bookkeeping persisted with the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SorterState(#[serde(with = "serde_bytes")] pub Vec<u8>);

impl SorterState {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What the sorter decided for one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Requests now deliverable, in order. May include buffered successors.
    Deliver(Vec<RequestMessage>),
    /// Held back until a predecessor arrives.
    Buffered,
    /// Already seen; drop it.
    Duplicate,
}

pub trait MessageSorter: Sized {
    fn load(state: &SorterState) -> Result<Self, SchedulerError>;
    fn accept(&mut self, message: RequestMessage) -> Delivery;
    fn persist(&self) -> Result<SorterState, SchedulerError>;
}

/// Per-sender sequence tracking. Each sender numbers its requests from 1;
/// requests without a sender or sequence number pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSorter {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    delivered: BTreeMap<InstanceId, u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    buffered: BTreeMap<InstanceId, BTreeMap<u64, RequestMessage>>,
}

impl SequenceSorter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_delivered(&self, sender: &str) -> u64 {
        self.delivered.get(sender).copied().unwrap_or(0)
    }

    pub fn buffered_len(&self) -> usize {
        self.buffered.values().map(BTreeMap::len).sum()
    }
}

impl MessageSorter for SequenceSorter {
    fn load(state: &SorterState) -> Result<Self, SchedulerError> {
        if state.is_empty() {
            return Ok(Self::default());
        }
        ent_cbor::from_cbor(&state.0).map_err(|err| SchedulerError::SorterDecode(err.to_string()))
    }

    fn accept(&mut self, message: RequestMessage) -> Delivery {
        let (Some(sender), Some(seq)) = (message.parent_instance_id.clone(), message.sequence)
        else {
            return Delivery::Deliver(vec![message]);
        };
        let last = self.last_delivered(&sender);
        if seq <= last {
            return Delivery::Duplicate;
        }
        if seq > last + 1 {
            let pending = self.buffered.entry(sender).or_default();
            if pending.contains_key(&seq) {
                return Delivery::Duplicate;
            }
            pending.insert(seq, message);
            return Delivery::Buffered;
        }

        let mut out = vec![message];
        let mut next = seq;
        if let Some(pending) = self.buffered.get_mut(&sender) {
            while let Some(successor) = pending.remove(&(next + 1)) {
                out.push(successor);
                next += 1;
            }
            if pending.is_empty() {
                self.buffered.remove(&sender);
            }
        }
        self.delivered.insert(sender, next);
        Delivery::Deliver(out)
    }

    fn persist(&self) -> Result<SorterState, SchedulerError> {
        if self.delivered.is_empty() && self.buffered.is_empty() {
            return Ok(SorterState::default());
        }
        ent_cbor::to_canonical_cbor(self)
            .map(SorterState)
            .map_err(|err| SchedulerError::SnapshotEncode(err.to_string()))
    }
}
