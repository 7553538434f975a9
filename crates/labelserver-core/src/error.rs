// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for labelserver.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::types::JobId;

/// Top-level error type for all labelserver operations.
#[derive(Debug, Error)]
pub enum LabelError {
    // -- Startup --
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    // -- Submission --
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid job: {0}")]
    Queue(String),

    // -- Lookup --
    #[error("printer not found: {0}")]
    PrinterNotFound(String),

    #[error("printer {printer} has no label type {label_type}")]
    LabelTypeNotFound { printer: String, label_type: String },

    #[error("printer {printer} has no job {job}")]
    JobNotFound { printer: String, job: JobId },

    // -- Worker / hardware --
    #[error("printer {0} already has a running worker")]
    WorkerAlreadyRunning(String),

    #[error("print worker for {printer} failed: {message}")]
    Worker { printer: String, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while talking to a physical device.
///
/// These never reach the submitter: the worker turns them into a job in
/// `ERROR` state.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to {0} timed out")]
    Timeout(String),

    #[error("transport is not connected")]
    NotConnected,

    #[error("the remote end unexpectedly closed the connection")]
    UnexpectedlyClosed,

    #[error("payload cannot be encoded for this printer: {0}")]
    Encoding(String),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Submitted label data that failed schema or template checks.
///
/// Maps each offending field to a human-readable message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub fields: BTreeMap<String, String>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::default();
        err.add(field, message);
        err
    }

    /// Record a message for `field`, keeping the first one reported.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `field` is among the offending fields.
    pub fn names(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid label data")?;
        let mut sep = ": ";
        for (field, message) in &self.fields {
            write!(f, "{sep}{field}: {message}")?;
            sep = "; ";
        }
        Ok(())
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LabelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_field() {
        let mut err = ValidationError::default();
        err.add("count", "missing required field");
        err.add("name", "expected a string");
        assert_eq!(
            err.to_string(),
            "invalid label data: count: missing required field; name: expected a string"
        );
    }

    #[test]
    fn first_message_per_field_wins() {
        let mut err = ValidationError::single("count", "first");
        err.add("count", "second");
        assert_eq!(err.fields["count"], "first");
        assert!(err.names("count"));
        assert!(!err.names("other"));
    }
}
