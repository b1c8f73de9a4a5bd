use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use speech_bridge_core::{CancellationDetails, EventSession, SessionEvent, SpeechError};

#[derive(Debug)]
enum Completion {
    Stopped,
    Canceled(CancellationDetails),
    CanceledByCaller,
    /// The engine closed the event channel without a terminal event.
    EngineGone,
}

/// The coordinating loop of a continuous session.
///
/// Consumes the events in emission order until the first terminal event, stops the session
/// exactly once and turns the terminal event into the operation's result.
#[derive(Debug)]
pub(crate) struct SessionDriver<R> {
    session: EventSession<R>,
    cancel: CancellationToken,
    completion: Option<Completion>,
}

impl<R> SessionDriver<R> {
    pub fn new(session: EventSession<R>, cancel: CancellationToken) -> Self {
        Self {
            session,
            cancel,
            completion: None,
        }
    }

    /// The next final result. `None` once the session has completed.
    ///
    /// Events after the first terminal event are never consumed.
    pub async fn next_final(&mut self) -> Option<R> {
        if self.completion.is_some() {
            return None;
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Canceled by the caller");
                    self.completion = Some(Completion::CanceledByCaller);
                    return None;
                }
                event = self.session.next_event() => event,
            };

            match event {
                Some(SessionEvent::SessionStarted { session_id }) => {
                    info!(%session_id, "Session started");
                }
                Some(SessionEvent::Intermediate(_)) => {
                    debug!("Intermediate result");
                }
                Some(SessionEvent::Final(result)) => return Some(result),
                Some(SessionEvent::Canceled(details)) => {
                    debug!("Canceled: {details}");
                    self.completion = Some(Completion::Canceled(details));
                    return None;
                }
                Some(SessionEvent::SessionStopped { session_id }) => {
                    info!(%session_id, "Session stopped");
                    self.completion = Some(Completion::Stopped);
                    return None;
                }
                None => {
                    self.completion = Some(Completion::EngineGone);
                    return None;
                }
            }
        }
    }

    /// Stop the session and return how it ended.
    ///
    /// A cancellation with reason `Error` becomes [`SpeechError::Recognition`]. A cancellation
    /// with reason `EndOfStream` is a regular end.
    pub async fn finish(self) -> Result<(), SpeechError> {
        let Self {
            session,
            cancel,
            completion,
        } = self;

        // The caller may cancel while the consumer waits on something other than the session.
        let completion = match completion {
            None if cancel.is_cancelled() => Some(Completion::CanceledByCaller),
            completion => completion,
        };

        let stopped = session.stop().await;

        match completion {
            Some(Completion::Canceled(details)) if details.is_error() => {
                let error = SpeechError::Recognition { details };
                error!("{error}");
                Err(error)
            }
            Some(Completion::CanceledByCaller) => Err(SpeechError::Canceled),
            Some(Completion::Stopped | Completion::Canceled(_) | Completion::EngineGone)
            | None => stopped.map_err(|e| {
                let error = SpeechError::transport(e);
                error!("{error}");
                error
            }),
        }
    }
}
