//! The socket to the debug server running inside the host.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{AttachError, AttachErrorKind, DapError};
use crate::queue::OutboundReceiver;
use crate::transport::{encode_header, read_message};

/// Connect to `host:port`, giving up after `timeout` when one is set. A
/// failed connect is reported with the `unreachable` kind.
pub async fn connect_tcp(
    host: &str,
    port: u16,
    timeout: Option<Duration>,
    unreachable: AttachErrorKind,
) -> Result<TcpStream, AttachError> {
    let attempt = TcpStream::connect((host, port));
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, attempt).await.map_err(|_| {
            AttachError::new(
                AttachErrorKind::Timeout,
                format!("no answer from {host}:{port} within {}s", limit.as_secs()),
            )
        })?,
        None => attempt.await,
    };
    result.map_err(|e| AttachError::new(unreachable, format!("{host}:{port}: {e}")))
}

/// Open the remote debug socket.
pub async fn connect(
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<TcpStream, AttachError> {
    tracing::info!(host, port, "connecting to remote runtime");
    let stream = connect_tcp(host, port, timeout, AttachErrorKind::RemoteUnreachable).await?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "could not disable Nagle on remote socket");
    }
    Ok(stream)
}

/// Drain `queue` onto `writer` until the stop sentinel arrives. Header and
/// payload go out as two writes. A failed write ends the loop with the
/// error; nothing left in the queue is sent.
pub async fn send_loop<W>(mut writer: W, mut queue: OutboundReceiver) -> Result<(), DapError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = queue.get().await {
        tracing::debug!(%message, "-> remote");
        write_split(&mut writer, &message).await?;
    }
    tracing::debug!("remote send loop stopped");
    let _ = writer.shutdown().await;
    Ok(())
}

async fn write_split<W: AsyncWrite + Unpin>(writer: &mut W, message: &str) -> std::io::Result<()> {
    writer
        .write_all(encode_header(message.len()).as_bytes())
        .await?;
    writer.write_all(message.as_bytes()).await?;
    writer.flush().await
}

/// Read framed messages from the remote runtime and pass each to
/// `on_message` until the stream ends. Returns why it stopped.
pub async fn receive_loop<R, F>(reader: R, mut on_message: F) -> Result<(), DapError>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str) -> Result<(), DapError>,
{
    let mut reader = BufReader::new(reader);
    while let Some(message) = read_message(&mut reader).await? {
        tracing::debug!(%message, "<- remote");
        on_message(&message)?;
    }
    tracing::info!("remote runtime closed its stream");
    Ok(())
}
