/// Default cap on operations released per resume.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound on operations drained from the pending queue in one resume.
    /// Requests from the lock holder are not counted.
    pub max_batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }
}
