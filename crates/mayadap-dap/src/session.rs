//! One bridged debug session: the context object every component shares.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mayadap_config::Config;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::attach::AttachConfig;
use crate::channel::{DebuggerChannel, DebuggerSender};
use crate::error::{AttachError, AttachErrorKind, DapError};
use crate::launcher::AttachLauncher;
use crate::protocol::output_event;
use crate::queue::{outbound_queue, OutboundQueue, OutboundReceiver};
use crate::remote;
use crate::router::Router;

/// How long shutdown waits for the remote send loop to flush.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where the session is in its attach lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No attach request seen yet.
    AwaitingAttach,
    /// The attach code is being delivered and the remote socket opened.
    Attaching,
    /// The remote send and receive loops are running.
    Attached,
    /// The first attach failed. The session keeps answering the debugger
    /// but never reaches the remote runtime.
    Failed,
    /// The session is over.
    Ended,
}

/// Sequence numbers of client requests answered by the relay itself.
/// Entries are never removed.
#[derive(Debug, Default)]
pub struct ProcessedSeqs {
    seqs: Mutex<HashSet<i64>>,
}

impl ProcessedSeqs {
    /// Record `seq`. Returns `false` if it was already present.
    pub fn record(&self, seq: i64) -> bool {
        lock(&self.seqs).insert(seq)
    }

    pub fn contains(&self, seq: i64) -> bool {
        lock(&self.seqs).contains(&seq)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        lock(&self.seqs).len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Task {
    name: &'static str,
    handle: JoinHandle<()>,
    drain: bool,
}

/// Named tasks owned by a session.
#[derive(Default)]
pub struct TaskSet {
    tasks: Mutex<Vec<Task>>,
}

impl TaskSet {
    /// Spawn a task that is aborted at shutdown.
    pub fn spawn<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.insert(name, fut, false);
    }

    /// Spawn a task that shutdown waits on (for a bounded time) instead of
    /// aborting.
    pub fn spawn_draining<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.insert(name, fut, true);
    }

    fn insert<F>(&self, name: &'static str, fut: F, drain: bool)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::debug!(task = name, "starting task");
        let handle = tokio::spawn(async move {
            fut.await;
            tracing::debug!(task = name, "task finished");
        });
        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| !t.handle.is_finished());
        tasks.push(Task {
            name,
            handle,
            drain,
        });
    }

    /// Names of the tasks still running.
    #[cfg(test)]
    pub fn running(&self) -> Vec<&'static str> {
        lock(&self.tasks)
            .iter()
            .filter(|t| !t.handle.is_finished())
            .map(|t| t.name)
            .collect()
    }

    /// Abort every non-draining task, then give draining tasks up to
    /// `grace` to finish before aborting them too.
    pub async fn shutdown(&self, grace: Duration) {
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        let mut draining = Vec::new();
        for task in tasks {
            if task.drain {
                draining.push(task);
            } else {
                task.handle.abort();
            }
        }
        for mut task in draining {
            if tokio::time::timeout(grace, &mut task.handle).await.is_err() {
                tracing::warn!(task = task.name, "task did not drain in time; aborting");
                task.handle.abort();
            }
        }
    }
}

/// Shared state of one bridged session.
pub struct Session {
    client: DebuggerSender,
    outbound: OutboundQueue,
    outbound_rx: Mutex<Option<OutboundReceiver>>,
    processed: ProcessedSeqs,
    launcher: AttachLauncher,
    state: Mutex<SessionState>,
    tasks: TaskSet,
    ended: watch::Sender<bool>,
}

impl Session {
    pub fn new(client: DebuggerSender, launcher: AttachLauncher) -> Arc<Self> {
        let (outbound, outbound_rx) = outbound_queue();
        let (ended, _) = watch::channel(false);
        Arc::new(Self {
            client,
            outbound,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            processed: ProcessedSeqs::default(),
            launcher,
            state: Mutex::new(SessionState::AwaitingAttach),
            tasks: TaskSet::default(),
            ended,
        })
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn client(&self) -> &DebuggerSender {
        &self.client
    }

    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    pub fn processed(&self) -> &ProcessedSeqs {
        &self.processed
    }

    #[cfg(test)]
    pub(crate) fn take_outbound(&self) -> Option<OutboundReceiver> {
        lock(&self.outbound_rx).take()
    }

    /// Transition: AwaitingAttach → Attaching.
    pub fn begin_attach(&self) -> Result<(), AttachError> {
        let mut state = lock(&self.state);
        match *state {
            SessionState::AwaitingAttach => {
                *state = SessionState::Attaching;
                Ok(())
            }
            other => Err(AttachError::new(
                AttachErrorKind::AlreadyAttached,
                format!("session is {other:?}; only one attach per session"),
            )),
        }
    }

    /// Transition: Attaching → Failed. No-op in any other state.
    fn mark_failed(&self) {
        let mut state = lock(&self.state);
        if *state == SessionState::Attaching {
            *state = SessionState::Failed;
        }
    }

    /// Start the attach launcher without waiting for it. A failure reaches
    /// the debugger as a diagnostic.
    pub fn spawn_attach(self: &Arc<Self>, config: AttachConfig) {
        if let Err(err) = self.begin_attach() {
            self.report_attach_error(&err);
            return;
        }
        let session = Arc::clone(self);
        self.tasks.spawn("attach", async move {
            if let Err(err) = session.launcher.attach(&session, &config).await {
                session.mark_failed();
                session.report_attach_error(&err);
            }
        });
    }

    /// Take ownership of the remote debug socket and start the remote send
    /// and receive loops. Transition: Attaching → Attached.
    pub fn open_remote(self: &Arc<Self>, stream: TcpStream) -> Result<(), AttachError> {
        let rx = lock(&self.outbound_rx).take().ok_or_else(|| {
            AttachError::new(
                AttachErrorKind::AlreadyAttached,
                "remote connection already open",
            )
        })?;
        {
            let mut state = lock(&self.state);
            if *state == SessionState::Ended {
                return Ok(());
            }
            *state = SessionState::Attached;
        }
        let (read_half, write_half) = stream.into_split();
        self.spawn_remote_loops(read_half, write_half, rx);
        tracing::info!("attached to remote runtime");
        Ok(())
    }

    /// Start the remote send and receive loops. Either loop stopping on its
    /// own ends the session.
    fn spawn_remote_loops<R, W>(self: &Arc<Self>, reader: R, writer: W, rx: OutboundReceiver)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let session = Arc::clone(self);
        self.tasks.spawn_draining("remote-send", async move {
            if let Err(e) = remote::send_loop(writer, rx).await {
                tracing::warn!(error = %e, "writing to remote runtime failed");
                session.end("remote send failed");
            }
        });

        let router = Router::new(Arc::clone(self));
        let session = Arc::clone(self);
        self.tasks.spawn("remote-recv", async move {
            if let Err(e) = remote::receive_loop(reader, |m| router.on_remote_message(m)).await {
                tracing::warn!(error = %e, "remote receive loop failed");
            }
            session.end("remote runtime disconnected");
        });
    }

    /// Send the diagnostic for `err` to the debugger.
    pub fn report_attach_error(&self, err: &AttachError) {
        tracing::error!(kind = ?err.kind, detail = %err.detail, "attach failed");
        let text = self.launcher.remediation(err);
        let sent = output_event("stderr", &text).and_then(|event| self.client.send(&event));
        if let Err(e) = sent {
            tracing::warn!(error = %e, "could not deliver attach diagnostic");
        }
    }

    /// Mark the session over and stop the remote send loop. Idempotent.
    pub fn end(&self, reason: &str) {
        let already = self.ended.send_replace(true);
        if already {
            return;
        }
        tracing::info!(reason, "session ending");
        *lock(&self.state) = SessionState::Ended;
        self.outbound.close();
    }

    /// Resolves once [`Session::end`] has been called.
    pub async fn ended(&self) {
        let mut rx = self.ended.subscribe();
        let _ = rx.wait_for(|ended| *ended).await;
    }

    /// End the session and stop its tasks.
    pub async fn shutdown(&self) {
        self.end("shutdown");
        self.tasks.shutdown(DRAIN_GRACE).await;
        self.client.close();
    }
}

/// Relay between a debugger speaking DAP on `reader`/`writer` and the
/// remote runtime named in its attach request, until either side goes away.
pub async fn run_session<R, W>(reader: R, writer: W, config: &Config) -> Result<(), DapError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (mut channel, client) = DebuggerChannel::start(reader, writer);
    let session = Session::new(client, AttachLauncher::from_config(config));
    let router = Router::new(Arc::clone(&session));

    let result = tokio::select! {
        result = channel.run(|message| router.on_client_message(&message)) => {
            if let Err(e) = &result {
                tracing::error!(error = %e, "debugger receive loop failed");
            }
            result
        }
        _ = session.ended() => Ok(()),
    };

    session.shutdown().await;
    channel.finish().await;
    result
}
