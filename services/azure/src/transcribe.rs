use anyhow::Result;
use tracing::debug;

use crate::{
    messages::{RecognitionStatus, ServerMessage, SpeechHypothesis, SpeechPhrase, ticks},
    status_cancellation,
    websocket::MessageHandler,
};
use speech_bridge_core::{RecognitionResult, ResultReason, SessionEvent};

/// Maps `speech.*` messages to recognition events.
#[derive(Debug, Default)]
pub struct RecognitionHandler;

impl MessageHandler<RecognitionResult> for RecognitionHandler {
    fn handle(&mut self, message: &ServerMessage) -> Result<Vec<SessionEvent<RecognitionResult>>> {
        let event = match message.path.as_str() {
            "speech.hypothesis" | "speech.fragment" => {
                let hypothesis: SpeechHypothesis = message.json()?;
                debug!("Recognizing: {}", hypothesis.text);
                SessionEvent::Intermediate(RecognitionResult {
                    reason: ResultReason::RecognizingSpeech,
                    text: hypothesis.text,
                    offset: ticks(hypothesis.offset),
                    duration: ticks(hypothesis.duration),
                })
            }
            "speech.phrase" => {
                let phrase: SpeechPhrase = message.json()?;
                let reason = match &phrase.recognition_status {
                    RecognitionStatus::Success => ResultReason::RecognizedSpeech,
                    RecognitionStatus::NoMatch
                    | RecognitionStatus::InitialSilenceTimeout
                    | RecognitionStatus::BabbleTimeout => ResultReason::NoMatch,
                    RecognitionStatus::EndOfDictation => return Ok(Vec::new()),
                    status => {
                        return Ok(vec![SessionEvent::Canceled(status_cancellation(status))]);
                    }
                };
                let text = if reason == ResultReason::RecognizedSpeech {
                    phrase.text()
                } else {
                    String::new()
                };
                SessionEvent::Final(RecognitionResult {
                    reason,
                    text,
                    offset: ticks(phrase.offset),
                    duration: ticks(phrase.duration),
                })
            }
            _ => return Ok(Vec::new()),
        };
        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speech_bridge_core::CancellationErrorCode;

    fn message(path: &str, body: &str) -> ServerMessage {
        ServerMessage {
            path: path.into(),
            request_id: None,
            body: body.into(),
        }
    }

    #[test]
    fn phrase_and_hypothesis() {
        let mut handler = RecognitionHandler;
        let events = handler
            .handle(&message(
                "speech.hypothesis",
                r#"{"Text":"hel","Offset":0,"Duration":100}"#,
            ))
            .unwrap();
        assert!(matches!(
            &events[..],
            [SessionEvent::Intermediate(RecognitionResult { reason: ResultReason::RecognizingSpeech, text, .. })] if text == "hel"
        ));

        let events = handler
            .handle(&message(
                "speech.phrase",
                r#"{"RecognitionStatus":"Success","DisplayText":"Hello.","Offset":0,"Duration":100}"#,
            ))
            .unwrap();
        assert!(matches!(
            &events[..],
            [SessionEvent::Final(RecognitionResult { reason: ResultReason::RecognizedSpeech, text, .. })] if text == "Hello."
        ));
    }

    #[test]
    fn silence_is_no_match() {
        let events = RecognitionHandler
            .handle(&message(
                "speech.phrase",
                r#"{"RecognitionStatus":"InitialSilenceTimeout","Offset":0,"Duration":0}"#,
            ))
            .unwrap();
        assert!(matches!(
            &events[..],
            [SessionEvent::Final(RecognitionResult { reason: ResultReason::NoMatch, .. })]
        ));
    }

    #[test]
    fn error_status_cancels() {
        let events = RecognitionHandler
            .handle(&message(
                "speech.phrase",
                r#"{"RecognitionStatus":"TooManyRequests"}"#,
            ))
            .unwrap();
        assert!(matches!(
            &events[..],
            [SessionEvent::Canceled(details)] if details.error_code == CancellationErrorCode::TooManyRequests
        ));
    }

    #[test]
    fn turn_messages_are_not_forwarded() {
        assert!(
            RecognitionHandler
                .handle(&message("turn.start", "{}"))
                .unwrap()
                .is_empty()
        );
    }
}
