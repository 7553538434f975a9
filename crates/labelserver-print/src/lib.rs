// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// labelserver print engine: per-printer job queues, the background print
// worker, printer drivers, and the TCP/serial transports they write to.
// Domain types live in `labelserver-core`; this crate owns everything that
// runs concurrently or touches hardware.

pub mod driver;
pub mod printer;
pub mod queue;
pub mod registry;
pub mod serial;
pub mod tcp;
pub mod transport;
pub mod worker;

pub use driver::{PrinterDriver, build_driver};
pub use printer::{Printer, PrinterOptions};
pub use queue::JobQueue;
pub use registry::Registry;
pub use transport::Transport;
