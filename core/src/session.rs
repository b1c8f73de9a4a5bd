//! Event sessions of continuous recognition and translation.
//!
//! ADR: An engine delivers the events of a session through a bounded channel. The adapter
//! consumes them from a single loop in emission order, so there is no shared state between the
//! engine's I/O task and the adapter.
//!
//! ADR: Stopping consumes the session. The stop signal is a [`CancellationToken`] that is also
//! triggered when the session is dropped, so an engine task never outlives its consumer.
use anyhow::{Result, bail};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
use tracing::debug;

use crate::CancellationDetails;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent<R> {
    SessionStarted { session_id: String },
    /// A hypothesis that may still change.
    Intermediate(R),
    Final(R),
    Canceled(CancellationDetails),
    SessionStopped { session_id: String },
}

impl<R> SessionEvent<R> {
    /// `true` for the events that end a session from the consumer's point of view.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled(_) | Self::SessionStopped { .. })
    }
}

/// Create a connected pair of an engine side sender and a consumer side session.
pub fn session_channel<R>() -> (EventSender<R>, EventSession<R>) {
    let (sender, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let stop = CancellationToken::new();
    (
        EventSender {
            sender,
            stop: stop.clone(),
        },
        EventSession {
            events,
            stop_guard: stop.drop_guard(),
            task: None,
        },
    )
}

/// The engine side of a session.
#[derive(Debug)]
pub struct EventSender<R> {
    sender: mpsc::Sender<SessionEvent<R>>,
    stop: CancellationToken,
}

impl<R> Clone for EventSender<R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stop: self.stop.clone(),
        }
    }
}

impl<R> EventSender<R> {
    /// Deliver an event. Fails if the consumer is gone.
    pub async fn send(&self, event: SessionEvent<R>) -> Result<()> {
        if self.sender.send(event).await.is_err() {
            bail!("Session consumer is gone");
        }
        Ok(())
    }

    /// Resolves when the consumer stops or drops the session.
    pub fn stop_requested(&self) -> WaitForCancellationFuture<'_> {
        self.stop.cancelled()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// The consumer side of a session.
#[derive(Debug)]
pub struct EventSession<R> {
    events: mpsc::Receiver<SessionEvent<R>>,
    stop_guard: DropGuard,
    task: Option<JoinHandle<Result<()>>>,
}

impl<R> EventSession<R> {
    /// Attach the engine task that produces the events. Its result is returned from
    /// [`EventSession::stop`].
    #[must_use]
    pub fn with_task(mut self, task: JoinHandle<Result<()>>) -> Self {
        self.task = Some(task);
        self
    }

    /// The next event. `None` if the engine side is gone.
    pub async fn next_event(&mut self) -> Option<SessionEvent<R>> {
        self.events.recv().await
    }

    /// Stop the session and wait for the engine task to end.
    ///
    /// Events not yet consumed are discarded.
    pub async fn stop(self) -> Result<()> {
        let Self {
            events,
            stop_guard,
            task,
        } = self;
        // Signal first, then close the channel, so that a sender blocked on a full channel
        // gets released.
        drop(stop_guard);
        drop(events);
        if let Some(task) = task {
            task.await??;
        }
        debug!("Session stopped");
        Ok(())
    }
}
