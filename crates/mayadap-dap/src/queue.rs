//! Ordered queue of messages waiting to be written to the remote runtime.

use tokio::sync::mpsc;

/// An entry in the outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A serialized message to frame and send.
    Message(String),
    /// Stop the consumer. Anything queued behind it is never sent.
    Close,
}

/// Producer side. Cheap to clone; every clone feeds the same FIFO.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<Outbound>,
}

/// Consumer side, owned by the remote send loop.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::UnboundedReceiver<Outbound>,
    stopped: bool,
}

/// Create a connected producer/consumer pair.
pub fn outbound_queue() -> (OutboundQueue, OutboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        OutboundQueue { tx },
        OutboundReceiver { rx, stopped: false },
    )
}

impl OutboundQueue {
    /// Append a message. Never blocks; a message put after the consumer is
    /// gone is dropped with a log line.
    pub fn put(&self, message: impl Into<String>) {
        self.push(Outbound::Message(message.into()));
    }

    /// Append the stop sentinel.
    pub fn close(&self) {
        self.push(Outbound::Close);
    }

    fn push(&self, item: Outbound) {
        if self.tx.send(item).is_err() {
            tracing::debug!("outbound queue consumer is gone; dropping entry");
        }
    }
}

impl OutboundReceiver {
    /// Wait for the next message. Returns `None` on the stop sentinel or
    /// once every producer has been dropped.
    pub async fn get(&mut self) -> Option<String> {
        if self.stopped {
            return None;
        }
        match self.rx.recv().await {
            Some(Outbound::Message(message)) => Some(message),
            Some(Outbound::Close) | None => {
                self.stopped = true;
                self.rx.close();
                None
            }
        }
    }
}
