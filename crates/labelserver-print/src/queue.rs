// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory print job queue for one printer.
//
// The queue holds the pending jobs in print order plus a bounded record of
// finished ones.  All mutation happens under a single mutex that is never
// held across an `.await`; the worker is woken through a `Notify` after each
// enqueue.  Jobs are compared by identity (`Arc::ptr_eq`), never by value.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use labelserver_core::error::{LabelError, Result};
use labelserver_core::types::{Job, JobId, JobStatus};

struct QueueState {
    pending: VecDeque<Arc<Job>>,
    completed: VecDeque<Arc<Job>>,
    next_id: u64,
}

impl QueueState {
    fn position(&self, job: &Arc<Job>) -> Option<usize> {
        self.pending.iter().position(|j| Arc::ptr_eq(j, job))
    }

    /// Move the pending job at `index` to the completed record.
    fn retire(&mut self, index: usize, history_limit: usize) -> Option<Arc<Job>> {
        let job = self.pending.remove(index)?;
        self.completed.push_back(Arc::clone(&job));
        while self.completed.len() > history_limit {
            if let Some(old) = self.completed.pop_front() {
                debug!(job_id = ?old.id(), "finished job dropped from history");
            }
        }
        Some(job)
    }
}

/// Thread-safe FIFO of print jobs for a single printer.
pub struct JobQueue {
    printer: String,
    history_limit: usize,
    state: Mutex<QueueState>,
    work: Notify,
}

impl JobQueue {
    pub fn new(printer: impl Into<String>, history_limit: usize) -> Self {
        Self {
            printer: printer.into(),
            history_limit,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                completed: VecDeque::new(),
                next_id: 1,
            }),
            work: Notify::new(),
        }
    }

    pub fn printer(&self) -> &str {
        &self.printer
    }

    /// Append a job to the pending list, assigning its id.
    ///
    /// A job that is already pending here is returned unchanged.  Jobs with
    /// an empty payload, jobs owned by another printer, and jobs that have
    /// already been queued once are rejected before anything is mutated.
    #[instrument(skip(self, job), fields(printer = %self.printer))]
    pub fn add_job(&self, job: Arc<Job>) -> Result<Arc<Job>> {
        if job.data().is_empty() {
            return Err(LabelError::Queue("job has no payload".into()));
        }

        let mut state = self.state();
        if state.position(&job).is_some() {
            debug!(job_id = ?job.id(), "job already queued");
            return Ok(job);
        }
        if let Some(owner) = job.printer() {
            return Err(LabelError::Queue(format!(
                "job already belongs to printer {owner} with status {}",
                job.status()
            )));
        }

        let id = JobId(state.next_id);
        if !job.enqueue(&self.printer, id) {
            return Err(LabelError::Queue(format!(
                "job cannot be queued from status {}",
                job.status()
            )));
        }
        state.next_id += 1;
        state.pending.push_back(Arc::clone(&job));
        let depth = state.pending.len();
        drop(state);

        info!(job_id = %id, depth, "job queued");
        self.work.notify_one();
        Ok(job)
    }

    /// Cancel a job that has not started printing.
    ///
    /// Returns `false` without changing anything if the job is not pending
    /// or is already being printed.
    #[instrument(skip(self, job), fields(printer = %self.printer, job_id = ?job.id()))]
    pub fn cancel_job(&self, job: &Arc<Job>) -> bool {
        let mut state = self.state();
        let Some(index) = state.position(job) else {
            debug!("cancel ignored, job not pending");
            return false;
        };
        if !job.advance(JobStatus::Cancelled) {
            debug!(status = %job.status(), "cancel ignored, job already started");
            return false;
        }
        state.retire(index, self.history_limit);
        info!("job cancelled");
        true
    }

    /// Move a pending job to the completed record with a terminal status.
    ///
    /// No-op (returns `false`) if the job was already removed or the
    /// transition is not allowed.
    pub fn finish_job(&self, job: &Arc<Job>, status: JobStatus) -> bool {
        self.finish_with(job, status, None)
    }

    /// Finish a job as `ERROR`, recording `message` on it.
    pub fn fail_job(&self, job: &Arc<Job>, message: impl Into<String>) -> bool {
        self.finish_with(job, JobStatus::Error, Some(message.into()))
    }

    fn finish_with(&self, job: &Arc<Job>, status: JobStatus, message: Option<String>) -> bool {
        if !status.is_terminal() {
            warn!(printer = %self.printer, %status, "refusing to finish job with non-terminal status");
            return false;
        }
        let mut state = self.state();
        let Some(index) = state.position(job) else {
            return false;
        };
        let moved = match (status, message) {
            (JobStatus::Error, Some(message)) => job.fail(message),
            (status, _) => job.advance(status),
        };
        if !moved {
            debug!(job_id = ?job.id(), from = %job.status(), to = %status, "transition refused");
            return false;
        }
        state.retire(index, self.history_limit);
        debug!(printer = %self.printer, job_id = ?job.id(), %status, "job finished");
        true
    }

    /// Peek at the head of the pending list.
    pub fn top_job(&self) -> Option<Arc<Job>> {
        self.state().pending.front().cloned()
    }

    /// Mark the head job `PRINTING` and return it.
    ///
    /// Peek and transition happen in one critical section so a concurrent
    /// cancel either wins before the print starts or is refused.  The job
    /// stays in the pending list until it is finished.
    pub fn start_next(&self) -> Option<Arc<Job>> {
        let state = self.state();
        let job = state.pending.front()?;
        match job.status() {
            JobStatus::Queued => {
                job.advance(JobStatus::Printing);
                Some(Arc::clone(job))
            }
            // Left over from an interrupted worker.
            JobStatus::Printing => Some(Arc::clone(job)),
            _ => None,
        }
    }

    /// Snapshot of the pending list in print order.
    pub fn jobs(&self) -> Vec<Arc<Job>> {
        self.state().pending.iter().cloned().collect()
    }

    /// Snapshot of finished jobs, oldest first.
    pub fn completed_jobs(&self) -> Vec<Arc<Job>> {
        self.state().completed.iter().cloned().collect()
    }

    /// Look a job up by id among pending and finished jobs.
    pub fn find(&self, id: JobId) -> Option<Arc<Job>> {
        let state = self.state();
        state
            .pending
            .iter()
            .chain(state.completed.iter())
            .find(|job| job.id() == Some(id))
            .cloned()
    }

    /// Finish every job stuck in `PRINTING` as `ERROR`.
    ///
    /// Used after a worker was aborted mid-print.
    pub fn interrupt_in_flight(&self, message: &str) -> usize {
        let stuck: Vec<Arc<Job>> = self
            .state()
            .pending
            .iter()
            .filter(|job| job.status() == JobStatus::Printing)
            .cloned()
            .collect();
        stuck
            .iter()
            .filter(|job| self.fail_job(job, message))
            .count()
    }

    pub fn len(&self) -> usize {
        self.state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until a job is enqueued.  A wake-up that arrived while nobody
    /// was waiting is kept and returned immediately.
    pub async fn work_available(&self) {
        self.work.notified().await;
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
