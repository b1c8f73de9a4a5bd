use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{SpeechService, session::SessionDriver, synthesize::log_transport};
use speech_bridge_core::{AudioSource, RecognitionConfig, ResultReason, SpeechError};

impl SpeechService {
    /// Recognize all speech in `audio`.
    ///
    /// Each recognized utterance is followed by a newline. Returns when the engine ends the
    /// session, which it does at the end of the audio.
    pub async fn recognize_continuous(&self, audio: AudioSource) -> Result<String, SpeechError> {
        self.recognize_continuous_with_cancel(audio, CancellationToken::new())
            .await
    }

    /// [`SpeechService::recognize_continuous`] that stops early with [`SpeechError::Canceled`]
    /// when `cancel` is triggered.
    pub async fn recognize_continuous_with_cancel(
        &self,
        audio: AudioSource,
        cancel: CancellationToken,
    ) -> Result<String, SpeechError> {
        let config = RecognitionConfig {
            language: self.options.recognition_language.clone(),
            profanity: self.options.profanity,
        };

        let session = self
            .engine
            .start_recognition(config, audio)
            .await
            .map_err(log_transport)?;

        let mut driver = SessionDriver::new(session, cancel);
        let mut text = String::new();
        while let Some(result) = driver.next_final().await {
            match result.reason {
                ResultReason::RecognizedSpeech => {
                    debug!("Recognized: {}", result.text);
                    text.push_str(&result.text);
                    text.push('\n');
                }
                reason => {
                    debug!("Ignoring final result: {reason:?}");
                }
            }
        }

        driver.finish().await?;
        Ok(text)
    }
}
