use serde::{Deserialize, Serialize};

/// Snapshot of the generation queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Jobs waiting in the admission queue.
    pub pending: u64,
    /// Jobs currently generating (0 or 1).
    pub running: u64,
    /// Terminal results not yet read by their client.
    pub awaiting_pickup: u64,
    /// Jobs completed since startup.
    pub completed: u64,
    /// Jobs failed since startup.
    pub failed: u64,
}

impl QueueStats {
    /// Jobs not yet terminal (pending + running).
    pub fn active(&self) -> u64 {
        self.pending + self.running
    }

    /// Total processed jobs.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some((self.completed as f64 / total as f64) * 100.0)
        }
    }
}
