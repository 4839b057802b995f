use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::serde_bytes_opt;

/// Identifier of an orchestration or entity instance (caller, lock holder, lock-set member).
pub type InstanceId = String;

/// One inbound operation addressed to the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub id: Uuid,
    /// Business operation name; opaque to the scheduler.
    pub operation: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_bytes_opt"
    )]
    pub input: Option<Vec<u8>>,
    /// Fire-and-forget when true; otherwise the caller waits for a correlated reply.
    #[serde(default)]
    pub is_signal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_instance_id: Option<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time_ns: Option<u64>,
    /// Sorted set of entities to lock. Presence marks this as a lock request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_set: Option<Vec<InstanceId>>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub position: usize,
    /// Per-sender sequence number consumed by the message sorter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

impl RequestMessage {
    /// A call whose caller expects a response.
    pub fn call(operation: impl Into<String>, parent: impl Into<InstanceId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation: operation.into(),
            input: None,
            is_signal: false,
            parent_instance_id: Some(parent.into()),
            scheduled_time_ns: None,
            lock_set: None,
            position: 0,
            sequence: None,
        }
    }

    /// A fire-and-forget signal.
    pub fn signal(operation: impl Into<String>) -> Self {
        Self {
            is_signal: true,
            parent_instance_id: None,
            ..Self::call(operation, String::new())
        }
    }

    /// A signal deferred until `due_ns`.
    pub fn scheduled_signal(operation: impl Into<String>, due_ns: u64) -> Self {
        Self {
            scheduled_time_ns: Some(due_ns),
            ..Self::signal(operation)
        }
    }

    /// Lock request issued by `parent` for the given lock set.
    pub fn lock_request(
        parent: impl Into<InstanceId>,
        lock_set: Vec<InstanceId>,
        position: usize,
    ) -> Self {
        Self {
            lock_set: Some(lock_set),
            position,
            ..Self::call("", parent)
        }
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_sender(mut self, parent: impl Into<InstanceId>) -> Self {
        self.parent_instance_id = Some(parent.into());
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn is_lock_request(&self) -> bool {
        self.lock_set.is_some()
    }

    /// Deferred-set admission rule: signals with a due time only.
    pub fn is_scheduled_signal(&self) -> bool {
        self.is_signal && self.scheduled_time_ns.is_some()
    }

    /// Next entity the lock request travels to after this one, if any.
    pub fn next_lock_target(&self) -> Option<&InstanceId> {
        self.lock_set.as_ref()?.get(self.position + 1)
    }
}

/// Releases a lock previously granted to `parent_instance_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMessage {
    pub parent_instance_id: InstanceId,
    pub lock_request_id: Uuid,
}

/// Envelope delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityMessage {
    Request(RequestMessage),
    Release(ReleaseMessage),
}

impl From<RequestMessage> for EntityMessage {
    fn from(value: RequestMessage) -> Self {
        EntityMessage::Request(value)
    }
}

impl From<ReleaseMessage> for EntityMessage {
    fn from(value: ReleaseMessage) -> Self {
        EntityMessage::Release(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_omitted_from_json() {
        let msg = RequestMessage::signal("ping");
        let value = serde_json::to_value(&msg).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("id"));
        assert_eq!(obj["operation"], "ping");
        assert_eq!(obj["is_signal"], true);
        for absent in [
            "input",
            "parent_instance_id",
            "scheduled_time_ns",
            "lock_set",
            "position",
            "sequence",
        ] {
            assert!(!obj.contains_key(absent), "{absent} should be omitted");
        }
    }

    #[test]
    fn lock_request_knows_next_target() {
        let set = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let first = RequestMessage::lock_request("orch-1", set.clone(), 0);
        assert!(first.is_lock_request());
        assert_eq!(first.next_lock_target().map(String::as_str), Some("b"));
        let last = RequestMessage::lock_request("orch-1", set, 2);
        assert_eq!(last.next_lock_target(), None);
    }

    #[test]
    fn envelope_is_tagged() {
        let release = EntityMessage::from(ReleaseMessage {
            parent_instance_id: "orch-1".into(),
            lock_request_id: Uuid::nil(),
        });
        let json = serde_json::to_value(&release).unwrap();
        assert_eq!(json["kind"], "release");
        let back: EntityMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, release);
    }

    #[test]
    fn scheduled_signal_satisfies_admission_rule() {
        assert!(
            RequestMessage::scheduled_signal("tick", 10).is_scheduled_signal()
        );
        assert!(!RequestMessage::signal("tick").is_scheduled_signal());
        let mut call = RequestMessage::call("get", "orch");
        call.scheduled_time_ns = Some(10);
        assert!(!call.is_scheduled_signal());
    }
}
