// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: job identity, the job lifecycle state machine, and the
// job itself.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-printer job identifier.
///
/// Assigned by the owning printer's queue at enqueue time, starting at 1 and
/// strictly increasing.  Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Lifecycle states of a print job.
///
/// ```text
/// NONE -> QUEUED -> PRINTING -> DONE | ERROR
///            \-> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Prepared but not yet handed to a printer.
    None,
    /// Waiting in a printer's pending list.
    Queued,
    /// At the head of the queue and being transmitted.
    Printing,
    /// Transmitted successfully.
    Done,
    /// Transmission or encoding failed; see the job's error message.
    Error,
    /// Removed from the pending list before it started printing.
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::None, Self::Queued)
                | (Self::Queued, Self::Printing)
                | (Self::Queued, Self::Cancelled)
                | (Self::Printing, Self::Done)
                | (Self::Printing, Self::Error)
        )
    }

    /// Upper-case name as exposed to clients.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Queued => "QUEUED",
            Self::Printing => "PRINTING",
            Self::Done => "DONE",
            Self::Error => "ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable part of a job, changed only by the owning queue.
#[derive(Debug)]
struct JobState {
    id: Option<JobId>,
    status: JobStatus,
    printer: Option<String>,
    error: Option<String>,
}

/// A single label-printing request.
///
/// Jobs are shared as `Arc<Job>`; two handles refer to the same job only if
/// they point at the same allocation.  The rendered payload and creation
/// time are fixed at construction; id, status, and owner are filled in by
/// the printer queue.
#[derive(Debug)]
pub struct Job {
    label_type: String,
    created_at: DateTime<Utc>,
    data: String,
    state: Mutex<JobState>,
}

impl Job {
    /// Create an unqueued job (status `NONE`, no id) holding a rendered payload.
    pub fn new(label_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label_type: label_type.into(),
            created_at: Utc::now(),
            data: data.into(),
            state: Mutex::new(JobState {
                id: None,
                status: JobStatus::None,
                printer: None,
                error: None,
            }),
        }
    }

    pub fn label_type(&self) -> &str {
        &self.label_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The rendered payload, before any printer-specific encoding.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn id(&self) -> Option<JobId> {
        self.state().id
    }

    pub fn status(&self) -> JobStatus {
        self.state().status
    }

    /// Id of the printer this job was queued on.
    pub fn printer(&self) -> Option<String> {
        self.state().printer.clone()
    }

    /// Failure message recorded when the job ended in `ERROR`.
    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// Attach the job to a printer: assign its id and move it to `QUEUED`.
    ///
    /// Returns `false` (and changes nothing) unless the job is still `NONE`.
    pub fn enqueue(&self, printer: &str, id: JobId) -> bool {
        let mut state = self.state();
        if !state.status.can_advance_to(JobStatus::Queued) {
            return false;
        }
        state.id = Some(id);
        state.printer = Some(printer.to_string());
        state.status = JobStatus::Queued;
        true
    }

    /// Move the job to `next` if the state machine allows it.
    pub fn advance(&self, next: JobStatus) -> bool {
        let mut state = self.state();
        if !state.status.can_advance_to(next) {
            return false;
        }
        state.status = next;
        true
    }

    /// Move the job to `ERROR`, recording why.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let mut state = self.state();
        if !state.status.can_advance_to(JobStatus::Error) {
            return false;
        }
        state.status = JobStatus::Error;
        state.error = Some(message.into());
        true
    }

    /// Point-in-time view of the job for listing.
    pub fn info(&self) -> JobInfo {
        let state = self.state();
        JobInfo {
            id: state.id,
            status: state.status,
            creation_time: self.created_at,
            data: self.data.clone(),
            label_type: self.label_type.clone(),
            error: state.error.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serializable snapshot of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: Option<JobId>,
    pub status: JobStatus,
    pub creation_time: DateTime<Utc>,
    pub data: String,
    pub label_type: String,
    pub error: Option<String>,
}

/// Summary of a label type as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTypeInfo {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_is_unassigned() {
        let job = Job::new("asset", "COUNT=1");
        assert_eq!(job.status(), JobStatus::None);
        assert!(job.id().is_none());
        assert!(job.printer().is_none());
        assert_eq!(job.data(), "COUNT=1");
    }

    #[test]
    fn enqueue_assigns_identity_once() {
        let job = Job::new("asset", "x");
        assert!(job.enqueue("front", JobId(7)));
        assert_eq!(job.id(), Some(JobId(7)));
        assert_eq!(job.printer().as_deref(), Some("front"));
        assert_eq!(job.status(), JobStatus::Queued);

        assert!(!job.enqueue("back", JobId(8)));
        assert_eq!(job.id(), Some(JobId(7)));
    }

    #[test]
    fn terminal_states_are_never_reopened() {
        let job = Job::new("asset", "x");
        job.enqueue("front", JobId(1));
        assert!(job.advance(JobStatus::Printing));
        assert!(job.advance(JobStatus::Done));
        for next in [
            JobStatus::None,
            JobStatus::Queued,
            JobStatus::Printing,
            JobStatus::Error,
            JobStatus::Cancelled,
        ] {
            assert!(!job.advance(next), "DONE -> {next} must be refused");
        }
        assert_eq!(job.status(), JobStatus::Done);
    }

    #[test]
    fn printing_job_cannot_be_cancelled() {
        assert!(!JobStatus::Printing.can_advance_to(JobStatus::Cancelled));
        assert!(JobStatus::Queued.can_advance_to(JobStatus::Cancelled));
    }

    #[test]
    fn fail_records_message() {
        let job = Job::new("asset", "x");
        job.enqueue("front", JobId(1));
        assert!(!job.fail("too early"));
        job.advance(JobStatus::Printing);
        assert!(job.fail("connection refused"));
        assert_eq!(job.status(), JobStatus::Error);
        assert_eq!(job.error().as_deref(), Some("connection refused"));
    }

    #[test]
    fn status_serializes_as_upper_case_name() {
        let json = serde_json::to_string(&JobStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
        assert_eq!(JobStatus::Printing.to_string(), "PRINTING");
    }

    #[test]
    fn info_snapshot_carries_payload() {
        let job = Job::new("asset", "COUNT=5");
        job.enqueue("front", JobId(3));
        let info = job.info();
        assert_eq!(info.id, Some(JobId(3)));
        assert_eq!(info.status, JobStatus::Queued);
        assert_eq!(info.data, "COUNT=5");
        assert_eq!(info.label_type, "asset");
    }
}
