//! Durable scheduler state for a single entity: pending queue, scheduled
//! signals, lock holder and sorter bookkeeping, resumed one step at a time.

pub mod config;
pub mod error;
mod lock;
pub mod message;
pub mod scheduled;
pub mod sorter;
pub mod state;
pub mod step;

pub use config::SchedulerConfig;
pub use error::{LockError, SchedulerError};
pub use message::{EntityMessage, InstanceId, ReleaseMessage, RequestMessage};
pub use scheduled::ScheduledSignals;
pub use sorter::{Delivery, MessageSorter, SequenceSorter, SorterState};
pub use state::{SchedulerState, StateSummary};
pub use step::{EntityScheduler, ResumeOutcome};

pub(crate) mod serde_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_bytes::{ByteBuf, Bytes};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(Bytes::new(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<ByteBuf>::deserialize(deserializer).map(|opt| opt.map(|buf| buf.into_vec()))
    }
}
