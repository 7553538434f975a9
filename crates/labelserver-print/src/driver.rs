// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer drivers.
//
// A driver knows how to reach one printer family and how to turn a rendered
// label into the bytes that family expects.  The set of families is closed
// (`PrinterKind`); `build_driver` is the only place that maps a kind to an
// implementation.

use std::time::Duration;

use tracing::debug;

use labelserver_core::config::{Connection, PrinterConfig, PrinterKind};
use labelserver_core::error::{Result, TransportError};

use crate::serial::SerialTransport;
use crate::tcp::{RAW_PORT, TcpTransport};
use crate::transport::Transport;

/// Capabilities the print worker needs from a printer family.
pub trait PrinterDriver: Send + Sync {
    fn kind(&self) -> PrinterKind;

    /// A fresh, unconnected transport to the device.
    fn transport(&self) -> Box<dyn Transport>;

    /// Encode a rendered payload for the wire.
    fn encode(&self, payload: &str) -> std::result::Result<Vec<u8>, TransportError>;

    /// Pause after each successful print before the next job starts.
    fn job_delay(&self) -> Duration;
}

/// Build the driver for a configured printer.
pub fn build_driver(config: &PrinterConfig) -> Result<Box<dyn PrinterDriver>> {
    match config.kind {
        PrinterKind::CognitiveLbt42 => Ok(Box::new(CognitiveLbt42::from_config(config)?)),
    }
}

/// Cognitive Solutions LBT42.
///
/// Accepts plain ASCII over raw TCP (port 9100) or a serial line, with CR+LF
/// line endings.
#[derive(Debug, Clone)]
pub struct CognitiveLbt42 {
    connection: Connection,
    job_delay: Duration,
}

impl CognitiveLbt42 {
    pub const DEFAULT_JOB_DELAY: Duration = Duration::from_secs(1);

    pub fn new(connection: Connection, job_delay: Duration) -> Self {
        Self {
            connection,
            job_delay,
        }
    }

    pub fn from_config(config: &PrinterConfig) -> Result<Self> {
        let connection = config.connection(RAW_PORT)?;
        let job_delay = config
            .job_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(Self::DEFAULT_JOB_DELAY);
        debug!(?connection, ?job_delay, "cognitive-lbt42 driver configured");
        Ok(Self::new(connection, job_delay))
    }
}

impl PrinterDriver for CognitiveLbt42 {
    fn kind(&self) -> PrinterKind {
        PrinterKind::CognitiveLbt42
    }

    fn transport(&self) -> Box<dyn Transport> {
        match &self.connection {
            Connection::Tcp { host, port } => Box::new(TcpTransport::new(host.clone(), *port)),
            Connection::Serial { device, baud_rate } => {
                Box::new(SerialTransport::new(device.clone(), *baud_rate))
            }
        }
    }

    fn encode(&self, payload: &str) -> std::result::Result<Vec<u8>, TransportError> {
        if let Some(c) = payload.chars().find(|c| !c.is_ascii()) {
            return Err(TransportError::Encoding(format!(
                "character {c:?} is not ASCII"
            )));
        }
        Ok(crlf_line_endings(payload).into_bytes())
    }

    fn job_delay(&self) -> Duration {
        self.job_delay
    }
}

/// Turn every bare `\n` into `\r\n`; existing `\r\n` pairs are kept.
fn crlf_line_endings(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 16);
    let mut prev = '\0';
    for c in text.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_driver() -> CognitiveLbt42 {
        CognitiveLbt42::new(
            Connection::Tcp {
                host: "127.0.0.1".into(),
                port: RAW_PORT,
            },
            Duration::ZERO,
        )
    }

    #[test]
    fn line_endings_become_crlf() {
        assert_eq!(crlf_line_endings("a\nb\n"), "a\r\nb\r\n");
        assert_eq!(crlf_line_endings("a\r\nb"), "a\r\nb");
        assert_eq!(crlf_line_endings("\n\n"), "\r\n\r\n");
        assert_eq!(crlf_line_endings("none"), "none");
    }

    #[test]
    fn encode_rejects_non_ascii() {
        let driver = tcp_driver();
        assert_eq!(driver.encode("COUNT=5\n").unwrap(), b"COUNT=5\r\n");
        assert!(matches!(
            driver.encode("Größe"),
            Err(TransportError::Encoding(_))
        ));
    }

    #[test]
    fn config_defaults() {
        let config = PrinterConfig::tcp(PrinterKind::CognitiveLbt42, "10.0.0.5", None);
        let driver = CognitiveLbt42::from_config(&config).unwrap();
        assert_eq!(driver.job_delay(), CognitiveLbt42::DEFAULT_JOB_DELAY);
        assert_eq!(driver.transport().target(), "10.0.0.5:9100");
    }

    #[test]
    fn serial_device_selects_serial_transport() {
        let mut config = PrinterConfig::tcp(PrinterKind::CognitiveLbt42, "unused", None);
        config.hostname = None;
        config.device = Some("/dev/ttyUSB0".into());
        config.job_delay_ms = Some(250);
        let driver = build_driver(&config).unwrap();
        assert_eq!(driver.kind(), PrinterKind::CognitiveLbt42);
        assert_eq!(driver.job_delay(), Duration::from_millis(250));
        assert_eq!(driver.transport().target(), "/dev/ttyUSB0@9600");
    }

    #[test]
    fn missing_connection_is_configuration_error() {
        let mut config = PrinterConfig::tcp(PrinterKind::CognitiveLbt42, "", None);
        config.hostname = None;
        assert!(build_driver(&config).is_err());
    }
}
