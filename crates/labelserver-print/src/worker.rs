// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-printer print worker.
//
// One task per printer drains its queue strictly in order, with at most one
// print in flight.  Each print runs in its own sub-task so that a panic in a
// driver or transport fails that job instead of ending the loop.  Stop is
// cooperative: the worker checks for it between jobs, never mid-send.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use labelserver_core::error::TransportError;
use labelserver_core::types::{Job, JobStatus};

use crate::driver::PrinterDriver;
use crate::queue::JobQueue;
use crate::transport::transmit;

/// Outcome of one print attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    Printed,
    Failed(String),
}

/// Aborts the wrapped task when dropped.
///
/// Ties an in-flight print to the worker task: aborting the worker drops
/// this guard, which aborts the print and drops its transport.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The background loop for one printer.
pub struct Worker {
    queue: Arc<JobQueue>,
    driver: Arc<dyn PrinterDriver>,
    poll_interval: Duration,
    stop: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        queue: Arc<JobQueue>,
        driver: Arc<dyn PrinterDriver>,
        poll_interval: Duration,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            driver,
            poll_interval,
            stop,
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Run until stop is signalled (or the stop sender is dropped).
    #[instrument(skip(self), fields(printer = %self.queue.printer()))]
    pub async fn run(mut self) {
        info!("print worker started");
        loop {
            if self.stop_requested() {
                break;
            }

            let Some(job) = self.queue.start_next() else {
                if self.idle().await {
                    break;
                }
                continue;
            };

            let outcome = self.print(&job).await;
            match outcome {
                PrintOutcome::Printed => {
                    self.queue.finish_job(&job, JobStatus::Done);
                    info!(job_id = ?job.id(), "job printed");
                    let delay = self.driver.job_delay();
                    if self.pause(delay).await {
                        break;
                    }
                }
                PrintOutcome::Failed(message) => {
                    warn!(job_id = ?job.id(), error = %message, "job failed");
                    self.queue.fail_job(&job, message);
                }
            }
        }
        info!("print worker stopped");
    }

    /// Wait for work, stop, or the poll interval.  Returns `true` on stop.
    async fn idle(&mut self) -> bool {
        tokio::select! {
            _ = self.queue.work_available() => false,
            changed = self.stop.changed() => changed.is_err() || *self.stop.borrow(),
            _ = tokio::time::sleep(self.poll_interval) => false,
        }
    }

    /// Sleep for `delay` unless stop arrives first.  Returns `true` on stop.
    async fn pause(&mut self, delay: Duration) -> bool {
        if delay.is_zero() {
            return false;
        }
        tokio::select! {
            changed = self.stop.changed() => changed.is_err() || *self.stop.borrow(),
            _ = tokio::time::sleep(delay) => false,
        }
    }

    /// Encode and transmit one job in a sub-task.
    async fn print(&self, job: &Arc<Job>) -> PrintOutcome {
        let driver = Arc::clone(&self.driver);
        let payload = job.data().to_string();
        let mut task = AbortOnDrop(tokio::spawn(async move {
            print_payload(driver.as_ref(), &payload).await
        }));

        match (&mut task.0).await {
            Ok(Ok(())) => PrintOutcome::Printed,
            Ok(Err(e)) => PrintOutcome::Failed(e.to_string()),
            Err(join_err) if join_err.is_panic() => {
                error!(job_id = ?job.id(), "print task panicked");
                PrintOutcome::Failed("internal error while printing".into())
            }
            Err(_) => PrintOutcome::Failed("print task was cancelled".into()),
        }
    }
}

/// Encode `payload` for the device and send it over a fresh connection.
pub async fn print_payload(driver: &dyn PrinterDriver, payload: &str) -> Result<(), TransportError> {
    let bytes = driver.encode(payload)?;
    let mut transport = driver.transport();
    debug!(target = %transport.target(), bytes = bytes.len(), "printing");
    transmit(transport.as_mut(), &bytes).await
}
