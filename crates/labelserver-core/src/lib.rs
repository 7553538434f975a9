// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// labelserver: core job model, label templates, field schemas, and the
// configuration model shared by the print engine and the server binary.

pub mod config;
pub mod error;
pub mod label;
pub mod schema;
pub mod template;
pub mod types;

pub use config::Config;
pub use error::{LabelError, TransportError, ValidationError};
pub use label::LabelType;
pub use types::*;
