//! FIFO admission queue of job ids awaiting the dispatcher.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use gen_core::JobId;

/// Unbounded FIFO of pending job ids.
///
/// Holds ids only; the job records themselves live in the
/// [`JobStore`](crate::JobStore).
#[derive(Default)]
pub struct AdmissionQueue {
    ids: Mutex<VecDeque<JobId>>,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<JobId>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an id at the tail. Never blocks.
    pub fn enqueue(&self, id: JobId) {
        self.lock().push_back(id);
    }

    /// Take the id at the head, if any.
    pub fn try_dequeue(&self) -> Option<JobId> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
