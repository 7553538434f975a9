// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP transport (JetDirect-style, port 9100).
//
// Open a socket and write the payload.  The printer interprets the bytes
// natively; there is no framing, acknowledgement, or job tracking.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use labelserver_core::error::TransportError;

use crate::transport::{Transport, write_fully};

/// Default raw TCP printing port.
pub const RAW_PORT: u16 = 9100;

/// Default time allowed for the TCP handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A blocking-per-job TCP connection to a printer.
#[derive(Debug)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: CONNECT_TIMEOUT,
            stream: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[instrument(skip(self), fields(target = %self.target()))]
    async fn connect(&mut self) -> Result<(), TransportError> {
        let target = self.target();
        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(target.clone()))?
        .map_err(|source| TransportError::Connect { target, source })?;

        info!("connected to printer");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        write_fully(stream, data).await?;
        debug!(bytes = data.len(), "sent over TCP");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
            debug!(target = %self.target(), "TCP connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::transmit;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn sends_payload_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        transmit(&mut transport, b"COUNT=5\r\n").await.unwrap();
        assert!(!transport.is_connected());

        assert_eq!(server.await.unwrap(), b"COUNT=5\r\n");
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        // Bind then drop to find a port nobody is listening on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut transport = TcpTransport::new("127.0.0.1", port);
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    async fn send_without_connect_fails() {
        let mut transport = TcpTransport::new("127.0.0.1", RAW_PORT);
        let err = transport.send(b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
        // Closing an unopened transport is a no-op.
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }
}
