// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Byte-stream connections to print hardware.
//
// A transport is used strictly in connect -> send -> close order through
// [`transmit`], which closes the connection on every exit path.  If the
// surrounding future is dropped mid-send, the transport's owned socket or
// port is dropped with it and the OS handle is released.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use labelserver_core::error::TransportError;

/// A connection to one physical device.
#[async_trait]
pub trait Transport: Send {
    /// Human-readable target, used in logs and error messages.
    fn target(&self) -> String;

    /// Open the connection.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Write every byte of `data`.
    ///
    /// Partial writes are continued until the buffer is exhausted.  A write
    /// that accepts zero bytes means the peer went away and yields
    /// [`TransportError::UnexpectedlyClosed`].
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Release the connection.  Calling it again, or without a prior
    /// `connect`, does nothing.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Connect, send `data`, and close, returning the first error.
///
/// `close` runs even if `connect` or `send` failed.
pub async fn transmit(transport: &mut dyn Transport, data: &[u8]) -> Result<(), TransportError> {
    let target = transport.target();
    let result = match transport.connect().await {
        Ok(()) => transport.send(data).await,
        Err(e) => Err(e),
    };
    let closed = transport.close().await;
    if let (Err(_), Err(close_err)) = (&result, &closed) {
        warn!(target = %target, error = %close_err, "close failed after transmit error");
    }
    result?;
    closed?;
    debug!(target = %target, bytes = data.len(), "payload transmitted");
    Ok(())
}

/// Write all of `data` to `writer`, treating a zero-length write as the
/// peer closing the connection.
pub async fn write_fully<W>(writer: &mut W, data: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut sent = 0;
    while sent < data.len() {
        let n = writer.write(&data[sent..]).await?;
        sent = advance(sent, n)?;
    }
    writer.flush().await?;
    Ok(())
}

/// Account for one write call of `n` bytes.
pub(crate) fn advance(sent: usize, n: usize) -> Result<usize, TransportError> {
    if n == 0 {
        return Err(TransportError::UnexpectedlyClosed);
    }
    Ok(sent + n)
}
