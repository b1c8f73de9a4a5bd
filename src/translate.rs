use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    AudioSink, SpeechService, SynthesisContent, session::SessionDriver,
    synthesize::log_transport,
};
use speech_bridge_core::{
    AudioSource, ResultReason, SpeechError, TranslationConfig,
    ssml::validate_language,
    voice::default_voice_for_language,
};

/// Translations waiting to be spoken. When full, the session loop waits for the speaker.
const SPEAKER_QUEUE_CAPACITY: usize = 16;

/// Languages and voice of a continuous translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    /// Locale of the spoken audio, for example `en-US`.
    pub from_language: String,
    /// Locale of the translation, for example `de-DE`.
    pub to_language: String,
    /// Short voice name, for example `KatjaNeural`. Derived from `to_language` if not set.
    pub voice: Option<String>,
}

impl TranslationRequest {
    pub fn new(from_language: impl Into<String>, to_language: impl Into<String>) -> Self {
        Self {
            from_language: from_language.into(),
            to_language: to_language.into(),
            voice: None,
        }
    }

    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }
}

impl SpeechService {
    /// Translate all speech in `audio` and speak each translated utterance on the default
    /// device.
    ///
    /// Returns the spoken translations in order.
    pub async fn translate_continuous(
        &self,
        request: TranslationRequest,
        audio: AudioSource,
    ) -> Result<Vec<String>, SpeechError> {
        self.translate_continuous_with_cancel(request, audio, CancellationToken::new())
            .await
    }

    pub async fn translate_continuous_with_cancel(
        &self,
        request: TranslationRequest,
        audio: AudioSource,
        cancel: CancellationToken,
    ) -> Result<Vec<String>, SpeechError> {
        validate_language(&request.from_language)?;
        validate_language(&request.to_language)?;
        let voice = match request.voice {
            Some(voice) => voice,
            None => default_voice_for_language(&request.to_language)?.to_string(),
        };
        // Fail before the session starts if nothing can be spoken.
        self.player()?;

        let config = TranslationConfig {
            from_language: request.from_language,
            target_languages: vec![request.to_language.clone()],
            profanity: self.options.profanity,
        };

        let session = self
            .engine
            .start_translation(config, audio)
            .await
            .map_err(log_transport)?;

        let (queue, mut utterances) = mpsc::channel::<String>(SPEAKER_QUEUE_CAPACITY);
        let speaker = {
            let service = self.clone();
            let locale = request.to_language;
            tokio::spawn(async move {
                let mut spoken = Vec::new();
                while let Some(text) = utterances.recv().await {
                    debug!("Speaking: {text}");
                    service
                        .synthesize(
                            SynthesisContent::text_with_voice(text.as_str(), &locale, &voice),
                            AudioSink::DefaultDevice,
                        )
                        .await?;
                    spoken.push(text);
                }
                Ok::<_, SpeechError>(spoken)
            })
        };

        let mut driver = SessionDriver::new(session, cancel.clone());
        loop {
            let result = tokio::select! {
                result = driver.next_final() => result,
                _ = queue.closed() => {
                    warn!("Speaker ended, stopping the translation");
                    break;
                }
            };
            let Some(result) = result else {
                break;
            };
            if result.reason != ResultReason::TranslatedSpeech {
                debug!("Ignoring final result: {:?}", result.reason);
                continue;
            }
            let Some(translation) = result.translations.into_iter().next() else {
                warn!("Translated speech without a translation");
                continue;
            };
            info!("Translated `{}` to `{}`", result.text, translation.text);
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Canceled by the caller");
                    break;
                }
                sent = queue.send(translation.text) => sent,
            };
            if sent.is_err() {
                break;
            }
        }
        drop(queue);

        let finished = driver.finish().await;
        if matches!(finished, Err(SpeechError::Canceled)) {
            speaker.abort();
            return Err(SpeechError::Canceled);
        }

        let spoken = speaker
            .await
            .map_err(|e| log_transport(e.into()))??;
        finished?;
        Ok(spoken)
    }
}
