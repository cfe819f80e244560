//! The connection to the DAP client.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::DapError;
use crate::transport::{encode_message, read_message};

#[derive(Debug)]
enum ClientFrame {
    Data(Vec<u8>),
    Close,
}

/// Handle for sending messages to the debugger. Clones share one writer,
/// so frames never interleave.
#[derive(Debug, Clone)]
pub struct DebuggerSender {
    tx: mpsc::UnboundedSender<ClientFrame>,
}

impl DebuggerSender {
    /// Frame and queue `message` for the debugger.
    pub fn send(&self, message: &str) -> Result<(), DapError> {
        tracing::trace!(%message, "-> debugger");
        self.tx
            .send(ClientFrame::Data(encode_message(message)))
            .map_err(|_| DapError::ChannelClosed("debugger"))
    }

    /// Ask the writer to stop once everything queued so far is written.
    pub fn close(&self) {
        let _ = self.tx.send(ClientFrame::Close);
    }
}

/// Reading half of the debugger connection plus its writer task.
pub struct DebuggerChannel<R> {
    reader: BufReader<R>,
    writer_task: JoinHandle<()>,
}

impl<R: AsyncRead + Unpin> DebuggerChannel<R> {
    /// Wrap a duplex byte stream given as separate halves. Spawns the
    /// writer task, so this must run inside a tokio runtime.
    pub fn start<W>(reader: R, writer: W) -> (Self, DebuggerSender)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<ClientFrame>();
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(frame) = rx.recv().await {
                let ClientFrame::Data(bytes) = frame else {
                    break;
                };
                if let Err(e) = write_frame(&mut writer, &bytes).await {
                    tracing::warn!(error = %e, "writing to debugger failed");
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        let channel = Self {
            reader: BufReader::new(reader),
            writer_task,
        };
        (channel, DebuggerSender { tx })
    }

    /// Read the next message from the debugger. `None` at end of stream.
    pub async fn recv(&mut self) -> Result<Option<String>, DapError> {
        read_message(&mut self.reader).await
    }

    /// Receive messages until the stream ends, handing each to
    /// `on_receive` on this task. A handler error stops the loop.
    pub async fn run<F>(&mut self, mut on_receive: F) -> Result<(), DapError>
    where
        F: FnMut(String) -> Result<(), DapError>,
    {
        while let Some(message) = self.recv().await? {
            tracing::debug!(%message, "<- debugger");
            on_receive(message)?;
        }
        tracing::info!("debugger closed its stream");
        Ok(())
    }

    /// Wait for the writer task to drain. Call after [`DebuggerSender::close`].
    pub async fn finish(self) {
        if let Err(e) = self.writer_task.await {
            tracing::warn!(error = %e, "debugger writer task failed");
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}
