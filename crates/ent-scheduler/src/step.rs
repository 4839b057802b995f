//! One resume of an entity: absorb inbound messages, release ready work.

use std::marker::PhantomData;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::message::{EntityMessage, ReleaseMessage, RequestMessage};
use crate::sorter::{Delivery, MessageSorter, SequenceSorter};
use crate::state::SchedulerState;

/// Result of a single resume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeOutcome {
    /// Operations to execute now, in order.
    pub ready: Vec<RequestMessage>,
    /// Lock request that was granted during this resume. The host forwards it
    /// to the next member of its lock set, or answers the requester.
    pub lock_granted: Option<RequestMessage>,
    /// Earliest remaining scheduled time; the host should wake up then.
    pub next_due_ns: Option<u64>,
    pub duplicates: usize,
    pub buffered: usize,
    pub releases_ignored: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EntityScheduler<S = SequenceSorter> {
    config: SchedulerConfig,
    _sorter: PhantomData<S>,
}

impl<S: MessageSorter> EntityScheduler<S> {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            _sorter: PhantomData,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run one resume step against `state`.
    ///
    /// On error `state` is left exactly as it was passed in.
    pub fn resume(
        &self,
        state: &mut SchedulerState,
        incoming: Vec<EntityMessage>,
        now_ns: u64,
    ) -> Result<ResumeOutcome, SchedulerError> {
        let mut working = state.clone();
        let mut sorter = S::load(&working.sorter)?;
        let mut outcome = ResumeOutcome::default();

        for message in incoming {
            match message {
                EntityMessage::Release(release) => {
                    apply_release(&mut working, &release, &mut outcome)
                }
                EntityMessage::Request(request) => {
                    let id = request.id;
                    match sorter.accept(request) {
                        Delivery::Deliver(batch) => {
                            for request in batch {
                                admit(&mut working, request, now_ns, &mut outcome)?;
                            }
                        }
                        Delivery::Buffered => outcome.buffered += 1,
                        Delivery::Duplicate => {
                            log::warn!("discarding duplicate request {id}");
                            outcome.duplicates += 1;
                        }
                    }
                }
            }
        }

        while let Some(due) = working.try_get_next_if_due(now_ns) {
            working.enqueue(due);
        }

        self.drain(&mut working, &mut outcome);
        outcome.next_due_ns = working.try_peek_next_due_time();
        working.sorter = sorter.persist()?;

        log::debug!(
            "resume at {now_ns}: {} ready, {working}, next due {:?}",
            outcome.ready.len(),
            outcome.next_due_ns
        );
        *state = working;
        Ok(outcome)
    }

    fn drain(&self, state: &mut SchedulerState, outcome: &mut ResumeOutcome) {
        let mut drained = 0;
        while !state.is_locked() && drained < self.config.max_batch_size {
            let Some(next) = state.try_dequeue() else {
                break;
            };
            if next.is_lock_request() {
                let Some(owner) = next.parent_instance_id.clone() else {
                    log::warn!("dropping lock request {} without a requester", next.id);
                    continue;
                };
                match state.try_acquire_lock(&owner) {
                    Ok(()) => outcome.lock_granted = Some(next),
                    Err(err) => log::warn!("dropping lock request {}: {err}", next.id),
                }
                break;
            }
            outcome.ready.push(next);
            drained += 1;
        }
    }
}

fn apply_release(
    state: &mut SchedulerState,
    release: &ReleaseMessage,
    outcome: &mut ResumeOutcome,
) {
    if let Err(err) = state.release_lock(&release.parent_instance_id) {
        log::warn!(
            "ignoring release {} from {}: {err}",
            release.lock_request_id,
            release.parent_instance_id
        );
        outcome.releases_ignored += 1;
    }
}

fn admit(
    state: &mut SchedulerState,
    request: RequestMessage,
    now_ns: u64,
    outcome: &mut ResumeOutcome,
) -> Result<(), SchedulerError> {
    if let Some(due_ns) = request.scheduled_time_ns {
        if !request.is_signal {
            return Err(SchedulerError::ScheduledRequestNotSignal(request.id));
        }
        if due_ns > now_ns {
            let id = request.id;
            if !state.add_scheduled_signal(request) {
                log::warn!("discarding duplicate scheduled signal {id}");
                outcome.duplicates += 1;
            }
            return Ok(());
        }
    }

    let from_holder = state.is_locked()
        && !request.is_lock_request()
        && request.parent_instance_id.as_deref() == state.locked_by();
    if from_holder {
        outcome.ready.push(request);
    } else {
        state.enqueue(request);
    }
    Ok(())
}
