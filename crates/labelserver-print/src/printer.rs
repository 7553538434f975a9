// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A configured printer: its label types, its job queue, and the lifecycle of
// its print worker.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use labelserver_core::config::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_POLL_INTERVAL, DEFAULT_STOP_GRACE, PrinterConfig,
};
use labelserver_core::error::{LabelError, Result};
use labelserver_core::label::LabelType;
use labelserver_core::types::{Job, JobId, JobStatus, LabelTypeInfo};

use crate::driver::{PrinterDriver, build_driver};
use crate::queue::JobQueue;
use crate::worker::Worker;

/// Message stored on a job whose print was cut off by `stop`.
pub const INTERRUPTED: &str = "interrupted by shutdown";

/// Timing and retention knobs for one printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterOptions {
    /// Upper bound on how long an idle worker sleeps before re-checking.
    pub poll_interval: Duration,
    /// How long `stop` waits for an in-flight print.
    pub stop_grace: Duration,
    /// Finished jobs kept for listing.
    pub history_limit: usize,
}

impl Default for PrinterOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_grace: DEFAULT_STOP_GRACE,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl From<&PrinterConfig> for PrinterOptions {
    fn from(config: &PrinterConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            stop_grace: config.stop_grace(),
            history_limit: config.history_limit(),
        }
    }
}

struct WorkerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// One physical printer and its queue.
pub struct Printer {
    id: String,
    name: String,
    label_types: HashMap<String, Arc<LabelType>>,
    queue: Arc<JobQueue>,
    driver: Arc<dyn PrinterDriver>,
    options: PrinterOptions,
    worker: Mutex<Option<WorkerHandle>>,
}

impl Printer {
    /// A printer with no label types and no running worker.  `name`
    /// defaults to `id`.
    pub fn new(
        id: impl Into<String>,
        name: Option<String>,
        driver: Arc<dyn PrinterDriver>,
        options: PrinterOptions,
    ) -> Self {
        let id = id.into();
        Self {
            name: name.unwrap_or_else(|| id.clone()),
            queue: Arc::new(JobQueue::new(id.clone(), options.history_limit)),
            id,
            label_types: HashMap::new(),
            driver,
            options,
            worker: Mutex::new(None),
        }
    }

    /// Build a printer and its label types from a `[printers.<id>]` table.
    ///
    /// # Errors
    ///
    /// Any driver or label-type problem is reported as
    /// `LabelError::Configuration` naming the printer.
    pub fn from_config(id: &str, config: &PrinterConfig, base_dir: &Path) -> Result<Self> {
        let named = |e: LabelError| LabelError::Configuration(format!("printer {id}: {e}"));
        let driver: Arc<dyn PrinterDriver> = Arc::from(build_driver(config).map_err(named)?);
        let mut printer = Self::new(id, config.name.clone(), driver, PrinterOptions::from(config));
        for label_type in config.build_label_types(base_dir).map_err(named)? {
            printer.add_label_type(label_type);
        }
        info!(
            printer = id,
            kind = %config.kind,
            label_types = printer.label_types.len(),
            "printer configured"
        );
        Ok(printer)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> PrinterOptions {
        self.options
    }

    /// Register a label type under its id, replacing any earlier one.
    pub fn add_label_type(&mut self, label_type: LabelType) {
        if self
            .label_types
            .insert(label_type.id().to_string(), Arc::new(label_type))
            .is_some()
        {
            debug!(printer = %self.id, "label type replaced");
        }
    }

    pub fn label_type(&self, id: &str) -> Option<Arc<LabelType>> {
        self.label_types.get(id).cloned()
    }

    /// Label types offered by this printer, sorted by id.
    pub fn label_types(&self) -> Vec<LabelTypeInfo> {
        let mut infos: Vec<_> = self.label_types.values().map(|lt| lt.info()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    // -- Queue ---------------------------------------------------------

    /// Validate `data` against a label type and queue the rendered job.
    ///
    /// # Errors
    ///
    /// `LabelTypeNotFound` for an unknown label type, `Validation` when the
    /// data is rejected (no job is created), `Queue` if the queue refuses
    /// the job.
    #[instrument(skip(self, data), fields(printer = %self.id))]
    pub fn submit(&self, label_type: &str, data: &Map<String, Value>) -> Result<Arc<Job>> {
        let lt = self
            .label_type(label_type)
            .ok_or_else(|| LabelError::LabelTypeNotFound {
                printer: self.id.clone(),
                label_type: label_type.to_string(),
            })?;
        let job = lt.prepare(data)?;
        self.add_job(Arc::new(job))
    }

    pub fn add_job(&self, job: Arc<Job>) -> Result<Arc<Job>> {
        self.queue.add_job(job)
    }

    pub fn cancel_job(&self, job: &Arc<Job>) -> bool {
        self.queue.cancel_job(job)
    }

    pub fn finish_job(&self, job: &Arc<Job>, status: JobStatus) -> bool {
        self.queue.finish_job(job, status)
    }

    pub fn top_job(&self) -> Option<Arc<Job>> {
        self.queue.top_job()
    }

    pub fn jobs(&self) -> Vec<Arc<Job>> {
        self.queue.jobs()
    }

    pub fn completed_jobs(&self) -> Vec<Arc<Job>> {
        self.queue.completed_jobs()
    }

    pub fn find_job(&self, id: JobId) -> Option<Arc<Job>> {
        self.queue.find(id)
    }

    // -- Worker lifecycle ----------------------------------------------

    /// Spawn the print worker on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// `WorkerAlreadyRunning` if a live worker exists; `Worker` when called
    /// outside a runtime.
    #[instrument(skip(self), fields(printer = %self.id))]
    pub fn start(&self) -> Result<()> {
        let mut slot = self.worker_slot();
        if slot.as_ref().is_some_and(|w| !w.task.is_finished()) {
            return Err(LabelError::WorkerAlreadyRunning(self.id.clone()));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| LabelError::Worker {
            printer: self.id.clone(),
            message: e.to_string(),
        })?;

        let (stop, stop_rx) = watch::channel(false);
        let worker = Worker::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.driver),
            self.options.poll_interval,
            stop_rx,
        );
        let task = runtime.spawn(worker.run());
        *slot = Some(WorkerHandle { stop, task });
        info!(kind = %self.driver.kind(), "printer started");
        Ok(())
    }

    /// Whether a worker task is alive.
    pub fn is_running(&self) -> bool {
        self.worker_slot()
            .as_ref()
            .is_some_and(|w| !w.task.is_finished())
    }

    /// Stop the worker after its current print.
    ///
    /// Waits up to the stop grace period.  If the print is still going the
    /// worker is aborted and the job it was printing ends in `ERROR`.
    /// Pending jobs and history are kept.  Does nothing when not running.
    ///
    /// # Errors
    ///
    /// `Worker` if the worker task had panicked.
    #[instrument(skip(self), fields(printer = %self.id))]
    pub async fn stop(&self) -> Result<()> {
        let handle = self.worker_slot().take();
        let Some(WorkerHandle { stop, mut task }) = handle else {
            return Ok(());
        };
        // The worker may already be gone; a failed send is fine.
        let _ = stop.send(true);

        let joined = match tokio::time::timeout(self.options.stop_grace, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(grace = ?self.options.stop_grace, "worker did not stop in time, aborting");
                task.abort();
                let joined = task.await;
                let interrupted = self.queue.interrupt_in_flight(INTERRUPTED);
                if interrupted > 0 {
                    warn!(jobs = interrupted, "in-flight print interrupted");
                }
                joined
            }
        };

        match joined {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                return Err(LabelError::Worker {
                    printer: self.id.clone(),
                    message: e.to_string(),
                });
            }
        }
        info!(pending = self.queue.len(), "printer stopped");
        Ok(())
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<WorkerHandle>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Printer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Printer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.driver.kind())
            .field("label_types", &self.label_types.len())
            .field("pending", &self.queue.len())
            .finish()
    }
}
