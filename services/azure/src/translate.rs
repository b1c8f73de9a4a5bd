use anyhow::Result;
use tracing::{debug, warn};

use crate::{
    messages::{
        RecognitionStatus, ServerMessage, TranslationHypothesis, TranslationPhrase,
    },
    status_cancellation,
    websocket::MessageHandler,
};
use speech_bridge_core::{
    CancellationDetails, CancellationErrorCode, ResultReason, SessionEvent, TranslationResult,
};

/// Maps `translation.*` messages to translation events.
///
/// `translation.synthesis` audio is not requested and ignored.
#[derive(Debug, Default)]
pub struct TranslationHandler;

impl MessageHandler<TranslationResult> for TranslationHandler {
    fn handle(&mut self, message: &ServerMessage) -> Result<Vec<SessionEvent<TranslationResult>>> {
        let event = match message.path.as_str() {
            "translation.hypothesis" => {
                let hypothesis: TranslationHypothesis = message.json()?;
                debug!("Translating: {}", hypothesis.text);
                SessionEvent::Intermediate(TranslationResult {
                    reason: ResultReason::TranslatingSpeech,
                    text: hypothesis.text,
                    translations: hypothesis.translation.translations(),
                })
            }
            "translation.phrase" => {
                let phrase: TranslationPhrase = message.json()?;
                match &phrase.recognition_status {
                    RecognitionStatus::Success => {}
                    RecognitionStatus::NoMatch
                    | RecognitionStatus::InitialSilenceTimeout
                    | RecognitionStatus::BabbleTimeout => {
                        return Ok(vec![SessionEvent::Final(TranslationResult {
                            reason: ResultReason::NoMatch,
                            text: String::new(),
                            translations: Vec::new(),
                        })]);
                    }
                    RecognitionStatus::EndOfDictation => return Ok(Vec::new()),
                    status => {
                        return Ok(vec![SessionEvent::Canceled(status_cancellation(status))]);
                    }
                }

                let Some(translation) = phrase.translation else {
                    return Ok(vec![SessionEvent::Canceled(CancellationDetails::error(
                        CancellationErrorCode::ServiceError,
                        "Recognized phrase without a translation",
                    ))]);
                };

                if translation.translation_status.as_deref() == Some("Error") {
                    let reason = translation.failure_reason.unwrap_or_default();
                    warn!("Translation failed: {reason}");
                    return Ok(vec![SessionEvent::Canceled(CancellationDetails::error(
                        CancellationErrorCode::ServiceError,
                        format!("Translation failed: {reason}"),
                    ))]);
                }

                SessionEvent::Final(TranslationResult {
                    reason: ResultReason::TranslatedSpeech,
                    text: phrase.text,
                    translations: translation.translations(),
                })
            }
            _ => return Ok(Vec::new()),
        };
        Ok(vec![event])
    }
}
