// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Serial-port transport for directly attached printers.

use async_trait::async_trait;
use serial2_tokio::SerialPort;
use tracing::{debug, info, instrument};

use labelserver_core::error::TransportError;

use crate::transport::{Transport, advance};

/// A serial line to a printer, opened per job.
pub struct SerialTransport {
    device: String,
    baud_rate: u32,
    port: Option<SerialPort>,
}

impl SerialTransport {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            port: None,
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn target(&self) -> String {
        format!("{}@{}", self.device, self.baud_rate)
    }

    #[instrument(skip(self), fields(target = %self.target()))]
    async fn connect(&mut self) -> Result<(), TransportError> {
        let port = SerialPort::open(&self.device, self.baud_rate).map_err(|source| {
            TransportError::Connect {
                target: self.target(),
                source,
            }
        })?;
        info!("serial port opened");
        self.port = Some(port);
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_ref().ok_or(TransportError::NotConnected)?;
        let mut sent = 0;
        while sent < data.len() {
            let n = port.write(&data[sent..]).await?;
            sent = advance(sent, n)?;
        }
        debug!(bytes = data.len(), "sent over serial");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.port.take().is_some() {
            debug!(target = %self.target(), "serial port closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_device_is_connect_error() {
        let mut transport = SerialTransport::new("/nonexistent/ttyLABEL0", 9600);
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn send_without_connect_fails() {
        let mut transport = SerialTransport::new("/dev/null", 9600);
        assert!(matches!(
            transport.send(b"x").await,
            Err(TransportError::NotConnected)
        ));
    }

    #[test]
    fn target_names_device_and_speed() {
        assert_eq!(
            SerialTransport::new("/dev/ttyUSB0", 19200).target(),
            "/dev/ttyUSB0@19200"
        );
    }
}
