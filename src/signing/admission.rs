//! Admission control for signing jobs
//!
//! Bounds the number of signing jobs in flight at once. Acquisition never
//! waits: once the limit is reached further requests are turned away.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// AdmissionController tracks in-flight signing jobs against a fixed limit
#[derive(Clone)]
pub struct AdmissionController {
    /// Number of admitted jobs that have not been released yet
    active: Arc<Mutex<usize>>,
    /// Maximum number of concurrent jobs, `None` means unlimited
    limit: Option<usize>,
}

impl AdmissionController {
    /// Create a controller from the configured limit; values `<= 0` disable the limit
    pub fn new(max_concurrent_jobs: i64) -> Self {
        let limit = usize::try_from(max_concurrent_jobs)
            .ok()
            .filter(|limit| *limit > 0);

        Self {
            active: Arc::new(Mutex::new(0)),
            limit,
        }
    }

    /// Try to admit one job. Returns false immediately when at capacity.
    pub fn acquire(&self) -> bool {
        let current = {
            let mut active = self.active.lock();
            match self.limit {
                Some(limit) if *active >= limit => None,
                _ => {
                    *active += 1;
                    Some(*active)
                }
            }
        };

        match current {
            Some(active) => {
                debug!(active_jobs = active, max_concurrent_jobs = ?self.limit, "Job slot acquired");
                true
            }
            None => {
                warn!(max_concurrent_jobs = ?self.limit, "Concurrent job limit reached");
                false
            }
        }
    }

    /// Release a slot obtained from a successful [`acquire`](Self::acquire)
    pub fn release(&self) {
        let remaining = {
            let mut active = self.active.lock();
            if *active == 0 {
                None
            } else {
                *active -= 1;
                Some(*active)
            }
        };

        match remaining {
            Some(active) => {
                debug!(active_jobs = active, "Job slot released");
            }
            None => {
                warn!("Attempted to release a job slot when no job was active");
            }
        }
    }

    /// Admit one job and return a guard that releases the slot when dropped
    pub fn try_acquire(&self) -> Option<JobSlot> {
        if self.acquire() {
            Some(JobSlot {
                controller: self.clone(),
            })
        } else {
            None
        }
    }

    /// Current number of admitted jobs, counted with or without a limit
    pub fn active(&self) -> usize {
        *self.active.lock()
    }

    /// Configured limit, `None` when unlimited
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// RAII guard for an admitted job; releases its slot exactly once on drop
pub struct JobSlot {
    controller: AdmissionController,
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        self.controller.release();
    }
}
