use std::collections::VecDeque;
use std::fmt;

use ent_cbor::Hash;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SchedulerError;
use crate::message::{InstanceId, RequestMessage};
use crate::scheduled::ScheduledSignals;
use crate::serde_bytes_opt;
use crate::sorter::SorterState;

/// Persisted state of one entity, handed from resume to resume.
///
/// The pending queue and the scheduled set are `None` whenever they hold no
/// elements, so an idle entity serializes to (almost) nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    #[serde(rename = "exists", default, skip_serializing_if = "is_false")]
    pub entity_exists: bool,
    /// Serialized business state. Meaningless while `entity_exists` is false.
    #[serde(
        rename = "state",
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_bytes_opt"
    )]
    pub entity_state: Option<Vec<u8>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_queue"
    )]
    queue: Option<VecDeque<RequestMessage>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_scheduled"
    )]
    scheduled: Option<ScheduledSignals>,
    #[serde(rename = "lockedBy", default, skip_serializing_if = "Option::is_none")]
    pub(crate) locked_by: Option<InstanceId>,
    #[serde(default)]
    pub sorter: SorterState,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn non_empty_queue<'de, D>(deserializer: D) -> Result<Option<VecDeque<RequestMessage>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<VecDeque<RequestMessage>>::deserialize(deserializer)
        .map(|queue| queue.filter(|q| !q.is_empty()))
}

fn non_empty_scheduled<'de, D>(deserializer: D) -> Result<Option<ScheduledSignals>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<ScheduledSignals>::deserialize(deserializer)
        .map(|scheduled| scheduled.filter(|s| !s.is_empty()))
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the entity can be dropped instead of resumed again.
    pub fn is_empty(&self) -> bool {
        !self.entity_exists && self.queue.is_none() && self.locked_by.is_none()
    }

    pub fn enqueue(&mut self, message: RequestMessage) {
        self.queue.get_or_insert_with(VecDeque::new).push_back(message);
    }

    pub fn try_dequeue(&mut self) -> Option<RequestMessage> {
        let queue = self.queue.as_mut()?;
        let message = queue.pop_front();
        if queue.is_empty() {
            self.queue = None;
        }
        message
    }

    pub fn queue_len(&self) -> usize {
        self.queue.as_ref().map_or(0, VecDeque::len)
    }

    pub fn has_pending(&self) -> bool {
        self.queue.is_some()
    }

    /// Defer a signal until its scheduled time.
    ///
    /// The message must be a signal and carry `scheduled_time_ns`; anything
    /// else is a bug in the caller. Returns false if the same message id is
    /// already scheduled.
    pub fn add_scheduled_signal(&mut self, message: RequestMessage) -> bool {
        debug_assert!(
            message.is_scheduled_signal(),
            "request must be a scheduled signal"
        );
        self.scheduled
            .get_or_insert_with(ScheduledSignals::new)
            .insert(message)
    }

    pub fn try_peek_next_due_time(&self) -> Option<u64> {
        self.scheduled.as_ref()?.peek_due_time()
    }

    /// Pop the earliest scheduled signal if it is due at `now_ns`. Leaves the
    /// set untouched otherwise.
    pub fn try_get_next_if_due(&mut self, now_ns: u64) -> Option<RequestMessage> {
        let scheduled = self.scheduled.as_mut()?;
        let message = scheduled.pop_due(now_ns)?;
        if scheduled.is_empty() {
            self.scheduled = None;
        }
        Some(message)
    }

    pub fn scheduled_len(&self) -> usize {
        self.scheduled.as_ref().map_or(0, ScheduledSignals::len)
    }

    pub fn has_scheduled(&self) -> bool {
        self.scheduled.is_some()
    }

    pub fn locked_by(&self) -> Option<&str> {
        self.locked_by.as_deref()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, SchedulerError> {
        serde_json::to_vec(self).map_err(|err| SchedulerError::SnapshotEncode(err.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, SchedulerError> {
        serde_json::from_slice(bytes).map_err(|err| SchedulerError::SnapshotDecode(err.to_string()))
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, SchedulerError> {
        ent_cbor::to_canonical_cbor(self)
            .map_err(|err| SchedulerError::SnapshotEncode(err.to_string()))
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, SchedulerError> {
        ent_cbor::from_cbor(bytes).map_err(|err| SchedulerError::SnapshotDecode(err.to_string()))
    }

    /// Hash of the canonical CBOR encoding.
    pub fn fingerprint(&self) -> Result<Hash, SchedulerError> {
        Hash::of_cbor(self).map_err(|err| SchedulerError::SnapshotEncode(err.to_string()))
    }

    pub fn summary(&self) -> Result<StateSummary, SchedulerError> {
        Ok(StateSummary {
            exists: self.entity_exists,
            queue_len: self.queue_len(),
            scheduled_len: self.scheduled_len(),
            next_due_ns: self.try_peek_next_due_time(),
            locked_by: self.locked_by.clone(),
            is_empty: self.is_empty(),
            fingerprint: self.fingerprint()?.to_hex(),
        })
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exists={} queue.count={}",
            self.entity_exists,
            self.queue_len()
        )
    }
}

/// Diagnostic view of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub exists: bool,
    pub queue_len: usize,
    pub scheduled_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<InstanceId>,
    pub is_empty: bool,
    pub fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_dequeue_then_absent() {
        let mut state = SchedulerState::new();
        let a = RequestMessage::signal("a");
        let b = RequestMessage::signal("b");
        let c = RequestMessage::signal("c");
        state.enqueue(a.clone());
        state.enqueue(b.clone());
        state.enqueue(c.clone());
        assert_eq!(state.queue_len(), 3);

        assert_eq!(state.try_dequeue(), Some(a));
        assert_eq!(state.try_dequeue(), Some(b));
        assert_eq!(state.try_dequeue(), Some(c));
        assert!(!state.has_pending());
        assert_eq!(state.try_dequeue(), None);
    }

    #[test]
    fn scheduled_peek_and_pop() {
        const T: u64 = 1_000_000_000;
        let mut state = SchedulerState::new();
        let late = RequestMessage::scheduled_signal("late", T + 10_000_000_000);
        let early = RequestMessage::scheduled_signal("early", T + 5_000_000_000);
        state.add_scheduled_signal(late.clone());
        state.add_scheduled_signal(early.clone());

        assert_eq!(state.try_peek_next_due_time(), Some(T + 5_000_000_000));
        assert_eq!(state.try_get_next_if_due(T + 5_000_000_000), Some(early));
        assert_eq!(state.try_peek_next_due_time(), Some(T + 10_000_000_000));

        let before = state.clone();
        assert_eq!(state.try_get_next_if_due(T + 9_999_999_999), None);
        assert_eq!(state, before);

        assert_eq!(state.try_get_next_if_due(T + 10_000_000_000), Some(late));
        assert!(!state.has_scheduled());
        assert_eq!(state.try_peek_next_due_time(), None);
        assert_eq!(state.try_get_next_if_due(u64::MAX), None);
    }

    #[test]
    fn scheduled_order_holds_over_many_scrambled_signals() {
        let mut state = SchedulerState::new();
        let mut expected = Vec::new();
        for i in 0..200u64 {
            // 7919 is coprime with 200: every slot once, halving makes pairs of ties.
            let due = 1_000 + (i * 7919 % 200) / 2;
            let message = RequestMessage::scheduled_signal(format!("op-{i}"), due);
            assert!(state.add_scheduled_signal(message.clone()));
            expected.push(message);
        }
        assert_eq!(state.scheduled_len(), 200);

        for step in 0..200 {
            if step == 100 {
                state = SchedulerState::from_cbor(&state.to_cbor().unwrap()).unwrap();
            }
            let (index, next) = expected
                .iter()
                .enumerate()
                .min_by_key(|(_, m)| m.scheduled_time_ns)
                .map(|(index, m)| (index, m.clone()))
                .unwrap();
            let due = next.scheduled_time_ns.unwrap();
            assert_eq!(state.try_peek_next_due_time(), Some(due));

            let before = state.clone();
            assert_eq!(state.try_get_next_if_due(due - 1), None);
            assert_eq!(state, before);

            assert_eq!(state.try_get_next_if_due(due), Some(next));
            expected.remove(index);
        }
        assert!(!state.has_scheduled());
        assert_eq!(state.try_peek_next_due_time(), None);
    }

    #[test]
    fn is_empty_over_all_axes() {
        for exists in [false, true] {
            for queued in [false, true] {
                for locked in [false, true] {
                    let mut state = SchedulerState::new();
                    state.entity_exists = exists;
                    if queued {
                        state.enqueue(RequestMessage::signal("op"));
                    }
                    if locked {
                        state.try_acquire_lock("orch").unwrap();
                    }
                    assert_eq!(
                        state.is_empty(),
                        !exists && !queued && !locked,
                        "exists={exists} queued={queued} locked={locked}"
                    );
                }
            }
        }
    }

    #[test]
    fn scheduled_only_entity_is_still_empty() {
        let mut state = SchedulerState::new();
        state.add_scheduled_signal(RequestMessage::scheduled_signal("later", 5));
        assert!(state.is_empty());
    }

    #[test]
    fn exists_flag_flips_empty() {
        let mut state = SchedulerState::new();
        assert!(state.is_empty());
        state.entity_exists = true;
        assert!(!state.is_empty());
    }

    #[test]
    fn empty_state_serializes_minimally() {
        let json: serde_json::Value =
            serde_json::from_slice(&SchedulerState::new().to_json().unwrap()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.keys().collect::<Vec<_>>(), ["sorter"]);
    }

    #[test]
    fn empty_containers_load_as_absent() {
        let state =
            SchedulerState::from_json(br#"{"queue":[],"scheduled":[],"sorter":[]}"#).unwrap();
        assert!(!state.has_pending());
        assert!(!state.has_scheduled());
        assert!(state.is_empty());
    }

    #[test]
    fn display_reports_existence_and_queue() {
        let mut state = SchedulerState::new();
        state.entity_exists = true;
        state.enqueue(RequestMessage::signal("a"));
        state.enqueue(RequestMessage::signal("b"));
        assert_eq!(state.to_string(), "exists=true queue.count=2");
    }

    #[test]
    fn summary_tracks_state() {
        let mut state = SchedulerState::new();
        state.add_scheduled_signal(RequestMessage::scheduled_signal("t", 42));
        state.try_acquire_lock("orch-7").unwrap();
        let summary = state.summary().unwrap();
        assert_eq!(summary.scheduled_len, 1);
        assert_eq!(summary.next_due_ns, Some(42));
        assert_eq!(summary.locked_by.as_deref(), Some("orch-7"));
        assert!(!summary.is_empty);
        assert!(summary.fingerprint.starts_with("sha256:"));
    }

    #[test]
    fn fingerprint_is_stable_across_formats() {
        let mut state = SchedulerState::new();
        state.entity_exists = true;
        state.entity_state = Some(b"{\"count\":3}".to_vec());
        state.enqueue(RequestMessage::call("add", "orch-1").with_input(b"5".to_vec()));

        let from_json = SchedulerState::from_json(&state.to_json().unwrap()).unwrap();
        let from_cbor = SchedulerState::from_cbor(&state.to_cbor().unwrap()).unwrap();
        assert_eq!(from_json, state);
        assert_eq!(from_cbor, state);
        assert_eq!(
            from_json.fingerprint().unwrap(),
            from_cbor.fingerprint().unwrap()
        );
    }
}
