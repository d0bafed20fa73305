//! Media session controller
//!
//! Runs the playback [`Session`] on a single worker task. Callers hand
//! commands over an unbounded queue and get a [`PendingCommand`] back, so
//! submission never blocks. Commands execute strictly in submission order.
//!
//! Teardown ([`MediaSessionController::destroy`]) is prompt: it flips the
//! destroyed flag and cancels the worker, which abandons the in-flight
//! command, releases every native resource and resolves everything still
//! queued with `Cancelled`.

use mellow_core::{MediaError, NativeMedia, PlaybackState, Result};
use mellow_playback::{
    BridgeEvent, CommandEnvelope, EventSink, Origin, PlaybackCommand, Session, SessionConfig,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

type Reply = oneshot::Sender<Result<PlaybackState>>;

struct Job {
    envelope: CommandEnvelope,
    reply: Option<Reply>,
}

/// Deferred result of a submitted command
#[derive(Debug)]
pub struct PendingCommand {
    inner: Pending,
}

#[derive(Debug)]
enum Pending {
    Settled(Option<Result<PlaybackState>>),
    Waiting(oneshot::Receiver<Result<PlaybackState>>),
}

impl PendingCommand {
    fn rejected(err: MediaError) -> Self {
        Self {
            inner: Pending::Settled(Some(Err(err))),
        }
    }

    /// Already resolved with `state`; nothing is queued
    pub fn settled(state: PlaybackState) -> Self {
        Self {
            inner: Pending::Settled(Some(Ok(state))),
        }
    }
}

impl Future for PendingCommand {
    type Output = Result<PlaybackState>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Pending::Settled(result) => {
                Poll::Ready(result.take().unwrap_or(Err(MediaError::Cancelled)))
            }
            // A dropped reply means the worker went away mid-command
            Pending::Waiting(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|reply| reply.unwrap_or(Err(MediaError::Cancelled))),
        }
    }
}

pub struct MediaSessionController {
    jobs: mpsc::UnboundedSender<Job>,
    state: watch::Receiver<PlaybackState>,
    cancel: CancellationToken,
    finished: CancellationToken,
    destroyed: AtomicBool,
}

impl MediaSessionController {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn(native: NativeMedia, sink: Arc<dyn EventSink>, config: SessionConfig) -> Self {
        let session = Session::new(native, Arc::clone(&sink), config);
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(session.snapshot());
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();

        let worker = Worker {
            session,
            jobs: jobs_rx,
            state: state_tx,
            sink,
            cancel: cancel.clone(),
        };
        let done = finished.clone();
        tokio::spawn(async move {
            worker.run().await;
            done.cancel();
        });

        info!("Media session worker started");

        Self {
            jobs: jobs_tx,
            state: state_rx,
            cancel,
            finished,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Queue a command and get its deferred result
    pub fn submit(&self, envelope: CommandEnvelope) -> PendingCommand {
        let (reply, receiver) = oneshot::channel();
        match self.enqueue(envelope, Some(reply)) {
            Ok(()) => PendingCommand {
                inner: Pending::Waiting(receiver),
            },
            Err(err) => PendingCommand::rejected(err),
        }
    }

    /// Queue a command nobody waits for
    pub fn submit_detached(&self, envelope: CommandEnvelope) -> Result<()> {
        self.enqueue(envelope, None)
    }

    /// Run a system command and wait for it
    pub async fn execute(&self, command: PlaybackCommand) -> Result<PlaybackState> {
        self.submit(CommandEnvelope::system(command)).await
    }

    fn enqueue(&self, envelope: CommandEnvelope, reply: Option<Reply>) -> Result<()> {
        if self.is_destroyed() {
            return Err(MediaError::SessionDestroyed);
        }

        debug!(
            command = %envelope.command.tag(),
            correlation_id = %envelope.correlation_id,
            "Queueing command"
        );
        self.jobs
            .send(Job { envelope, reply })
            .map_err(|_| MediaError::SessionDestroyed)
    }

    /// Latest state published by the worker
    pub fn snapshot(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Tear the session down without waiting for the worker
    ///
    /// Later submissions fail with `SessionDestroyed`.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Destroying media session");
        self.cancel.cancel();
    }

    /// Wait until the worker has released the session and exited
    pub async fn closed(&self) {
        self.finished.cancelled().await;
    }
}

impl Drop for MediaSessionController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for MediaSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSessionController")
            .field("destroyed", &self.is_destroyed())
            .field("status", &self.state.borrow().status)
            .finish_non_exhaustive()
    }
}

struct Worker {
    session: Session,
    jobs: mpsc::UnboundedReceiver<Job>,
    state: watch::Sender<PlaybackState>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(mut self) {
        let mut in_flight = None;

        loop {
            let job = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                job = self.jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                result = self.session.execute(&job.envelope.command) => Some(result),
            };

            let Some(result) = outcome else {
                debug!(
                    correlation_id = %job.envelope.correlation_id,
                    "In-flight command abandoned"
                );
                in_flight = Some(job);
                break;
            };

            self.state.send_replace(self.session.snapshot());
            if job.envelope.origin == Origin::WebLayer {
                self.sink
                    .emit(BridgeEvent::ack(job.envelope.correlation_id.clone()));
            }
            if let Some(reply) = job.reply {
                // Caller may have stopped waiting
                let _ = reply.send(result);
            }
        }

        self.shutdown(in_flight).await;
    }

    async fn shutdown(mut self, in_flight: Option<Job>) {
        self.jobs.close();
        self.session.release().await;
        self.state.send_replace(self.session.snapshot());

        let queued = std::iter::from_fn(|| self.jobs.try_recv().ok());
        let mut cancelled = 0usize;
        for job in in_flight.into_iter().chain(queued) {
            if let Some(reply) = job.reply {
                let _ = reply.send(Err(MediaError::Cancelled));
            }
            cancelled += 1;
        }

        info!(cancelled, "Media session worker stopped");
    }
}
