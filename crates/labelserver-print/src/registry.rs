// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// All configured printers, looked up by id.
//
// Built once at startup and shared (behind an `Arc`) with the request layer.
// Every request-facing operation resolves the printer first, so an unknown
// printer id is always reported as `PrinterNotFound`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info, instrument};

use labelserver_core::config::Config;
use labelserver_core::error::{LabelError, Result};
use labelserver_core::types::{Job, JobId, LabelTypeInfo};

use crate::printer::Printer;

#[derive(Debug, Default)]
pub struct Registry {
    printers: BTreeMap<String, Arc<Printer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured printer.  Workers are not started.
    ///
    /// # Errors
    ///
    /// Fails on the first printer that cannot be built; the error names it.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        for (id, printer) in &config.printers {
            registry.insert(Printer::from_config(id, printer, &config.base_dir)?);
        }
        info!(printers = registry.printers.len(), "printer registry built");
        Ok(registry)
    }

    /// Add a printer, replacing any with the same id.
    pub fn insert(&mut self, printer: Printer) {
        self.printers
            .insert(printer.id().to_string(), Arc::new(printer));
    }

    /// Start every printer's worker.
    pub fn start_all(&self) -> Result<()> {
        for printer in self.printers.values() {
            printer.start()?;
        }
        Ok(())
    }

    /// Stop every printer, logging the ones that fail.
    #[instrument(skip(self))]
    pub async fn stop_all(&self) {
        for printer in self.printers.values() {
            if let Err(e) = printer.stop().await {
                error!(printer = %printer.id(), error = %e, "printer did not stop cleanly");
            }
        }
        info!("all printers stopped");
    }

    pub fn get(&self, id: &str) -> Result<&Arc<Printer>> {
        self.printers
            .get(id)
            .ok_or_else(|| LabelError::PrinterNotFound(id.to_string()))
    }

    /// Printers in id order.
    pub fn printers(&self) -> impl Iterator<Item = &Arc<Printer>> {
        self.printers.values()
    }

    pub fn len(&self) -> usize {
        self.printers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.printers.is_empty()
    }

    // -- Request-facing operations -------------------------------------

    pub fn label_types(&self, printer: &str) -> Result<Vec<LabelTypeInfo>> {
        Ok(self.get(printer)?.label_types())
    }

    pub fn pending_jobs(&self, printer: &str) -> Result<Vec<Arc<Job>>> {
        Ok(self.get(printer)?.jobs())
    }

    pub fn completed_jobs(&self, printer: &str) -> Result<Vec<Arc<Job>>> {
        Ok(self.get(printer)?.completed_jobs())
    }

    pub fn job(&self, printer: &str, id: JobId) -> Result<Arc<Job>> {
        self.get(printer)?
            .find_job(id)
            .ok_or_else(|| LabelError::JobNotFound {
                printer: printer.to_string(),
                job: id,
            })
    }

    pub fn submit(
        &self,
        printer: &str,
        label_type: &str,
        data: &Map<String, Value>,
    ) -> Result<Arc<Job>> {
        self.get(printer)?.submit(label_type, data)
    }

    /// Cancel a queued job.  `Ok(false)` if it exists but has already
    /// started or finished.
    pub fn cancel(&self, printer: &str, id: JobId) -> Result<bool> {
        let job = self.job(printer, id)?;
        Ok(self.get(printer)?.cancel_job(&job))
    }
}
