use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use crate::SpeechService;
use speech_bridge_core::{
    AudioPlayer, CancellationDetails, CancellationErrorCode, PullAudioStream, SpeechError,
    SynthesisOutcome, SynthesisReason, SynthesisRequest,
    ssml::{self, Segment, Speak},
    voice::{self, full_voice_name},
};

/// What to synthesize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisContent {
    /// Plain text spoken by a voice of a locale, for example `en-US` and `AriaNeural`.
    Text {
        text: String,
        locale: String,
        voice: String,
    },
    /// A complete SSML document.
    Ssml(String),
}

impl SynthesisContent {
    /// Text spoken with the default locale and voice.
    pub fn text(text: impl Into<String>) -> Self {
        Self::text_with_voice(text, voice::DEFAULT_LOCALE, voice::DEFAULT_VOICE)
    }

    pub fn text_with_voice(
        text: impl Into<String>,
        locale: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self::Text {
            text: text.into(),
            locale: locale.into(),
            voice: voice.into(),
        }
    }

    pub fn ssml(ssml: impl Into<String>) -> Self {
        Self::Ssml(ssml.into())
    }

    fn into_ssml(self) -> Result<String, SpeechError> {
        match self {
            Self::Text {
                text,
                locale,
                voice,
            } => {
                if text.trim().is_empty() {
                    return Err(SpeechError::validation("Text to synthesize is empty"));
                }
                if voice.trim().is_empty() {
                    return Err(SpeechError::validation("Voice name is empty"));
                }
                ssml::build(
                    &full_voice_name(&locale, &voice),
                    &locale,
                    [Segment::new(text)],
                )
            }
            Self::Ssml(ssml) => {
                if ssml.trim().is_empty() {
                    return Err(SpeechError::validation("SSML document is empty"));
                }
                Ok(ssml)
            }
        }
    }
}

impl From<&Speak> for SynthesisContent {
    fn from(speak: &Speak) -> Self {
        Self::Ssml(speak.to_string())
    }
}

/// Where synthesized audio goes.
pub enum AudioSink<'a> {
    /// The service's [`AudioPlayer`], usually the default speaker.
    DefaultDevice,
    /// The complete audio is written and flushed before the call returns.
    Writer(&'a mut (dyn AsyncWrite + Unpin + Send)),
}

impl SpeechService {
    /// Synthesize `content` into `sink`.
    ///
    /// Exactly one engine request per call. A canceled synthesis is returned as
    /// [`SpeechError::Synthesis`].
    pub async fn synthesize(
        &self,
        content: SynthesisContent,
        sink: AudioSink<'_>,
    ) -> Result<SynthesisOutcome, SpeechError> {
        let player = match sink {
            AudioSink::DefaultDevice => Some(self.player()?),
            AudioSink::Writer(_) => None,
        };

        let outcome = self.synthesize_outcome(content).await?;

        match sink {
            AudioSink::DefaultDevice => {
                if let Some(player) = player {
                    player
                        .play(outcome.format, outcome.audio.clone())
                        .await
                        .context("Playing synthesized audio")
                        .map_err(log_transport)?;
                }
            }
            AudioSink::Writer(writer) => {
                write_all(writer, &outcome.audio).await?;
            }
        }

        Ok(outcome)
    }

    pub async fn speak_ssml_to_default_speakers(
        &self,
        speak: &Speak,
    ) -> Result<SynthesisOutcome, SpeechError> {
        self.synthesize(speak.into(), AudioSink::DefaultDevice)
            .await
    }

    pub async fn speak_text_to_default_speakers(
        &self,
        text: &str,
        locale: &str,
        voice: &str,
    ) -> Result<SynthesisOutcome, SpeechError> {
        self.synthesize(
            SynthesisContent::text_with_voice(text, locale, voice),
            AudioSink::DefaultDevice,
        )
        .await
    }

    /// Synthesize into a stream the caller reads at its own pace.
    pub async fn synthesize_to_pull_stream(
        &self,
        text: &str,
        locale: &str,
        voice: &str,
    ) -> Result<(SynthesisOutcome, PullAudioStream), SpeechError> {
        let outcome = self
            .synthesize_outcome(SynthesisContent::text_with_voice(text, locale, voice))
            .await?;
        let stream = PullAudioStream::new(outcome.audio.clone());
        Ok((outcome, stream))
    }

    pub async fn synthesize_to_writer(
        &self,
        text: &str,
        locale: &str,
        voice: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<SynthesisOutcome, SpeechError> {
        self.synthesize(
            SynthesisContent::text_with_voice(text, locale, voice),
            AudioSink::Writer(writer),
        )
        .await
    }

    async fn synthesize_outcome(
        &self,
        content: SynthesisContent,
    ) -> Result<SynthesisOutcome, SpeechError> {
        let request = SynthesisRequest {
            ssml: content.into_ssml()?,
            output_format: self.options.output_format,
        };

        let outcome = self
            .engine
            .synthesize(request)
            .await
            .map_err(log_transport)?;

        match outcome.reason {
            SynthesisReason::Completed => {
                info!("Synthesized {} bytes of audio", outcome.audio.len());
                Ok(outcome)
            }
            SynthesisReason::Canceled => {
                let details = outcome.cancellation.unwrap_or_else(|| {
                    CancellationDetails::error(
                        CancellationErrorCode::RuntimeError,
                        "Canceled without details",
                    )
                });
                let error = SpeechError::Synthesis { details };
                error!("{error}");
                Err(error)
            }
        }
    }

    pub(crate) fn player(&self) -> Result<Arc<dyn AudioPlayer>, SpeechError> {
        self.player
            .clone()
            .ok_or_else(|| SpeechError::configuration("No default audio output device available"))
    }
}

async fn write_all(
    writer: &mut (dyn AsyncWrite + Unpin + Send),
    audio: &[u8],
) -> Result<(), SpeechError> {
    writer
        .write_all(audio)
        .await
        .context("Writing synthesized audio")
        .map_err(log_transport)?;
    writer
        .flush()
        .await
        .context("Flushing synthesized audio")
        .map_err(log_transport)
}

pub(crate) fn log_transport(e: anyhow::Error) -> SpeechError {
    let error = SpeechError::transport(e);
    error!("{error}");
    error
}
