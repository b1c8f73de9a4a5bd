//! The capability interface of a speech engine.
//!
//! An engine performs the actual synthesis and recognition work, usually by talking to a cloud
//! service. Engine calls return `anyhow::Result`, the adapters translate failures and
//! cancellations into [`crate::SpeechError`] values.
use std::{fmt, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    AudioSource, CancellationDetails, EventSession, OutputFormat, PronunciationAssessmentConfig,
    PronunciationAssessmentResult,
};

#[async_trait]
pub trait SpeechEngine: fmt::Debug + Send + Sync {
    /// Synthesize one SSML document. Exactly one request to the engine per call.
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisOutcome>;

    /// Start a continuous recognition session that consumes `audio` until it ends.
    async fn start_recognition(
        &self,
        config: RecognitionConfig,
        audio: AudioSource,
    ) -> Result<EventSession<RecognitionResult>>;

    /// Start a continuous translation session that consumes `audio` until it ends.
    async fn start_translation(
        &self,
        config: TranslationConfig,
        audio: AudioSource,
    ) -> Result<EventSession<TranslationResult>>;

    /// One recognition pass scored against the reference text.
    async fn assess_pronunciation(
        &self,
        recognition: RecognitionConfig,
        assessment: PronunciationAssessmentConfig,
        audio: AudioSource,
    ) -> Result<PronunciationAssessmentResult>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub ssml: String,
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthesisReason {
    Completed,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutcome {
    pub reason: SynthesisReason,
    pub format: OutputFormat,
    pub audio: Bytes,
    /// Set if `reason` is [`SynthesisReason::Canceled`].
    pub cancellation: Option<CancellationDetails>,
}

impl SynthesisOutcome {
    pub fn completed(format: OutputFormat, audio: Bytes) -> Self {
        Self {
            reason: SynthesisReason::Completed,
            format,
            audio,
            cancellation: None,
        }
    }

    pub fn canceled(format: OutputFormat, details: CancellationDetails) -> Self {
        Self {
            reason: SynthesisReason::Canceled,
            format,
            audio: Bytes::new(),
            cancellation: Some(details),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Profanity {
    #[default]
    Masked,
    Removed,
    Raw,
}

impl Profanity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Masked => "masked",
            Self::Removed => "removed",
            Self::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// BCP-47 locale of the spoken audio.
    pub language: String,
    pub profanity: Profanity,
}

impl RecognitionConfig {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            profanity: Profanity::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationConfig {
    pub from_language: String,
    pub target_languages: Vec<String>,
    pub profanity: Profanity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultReason {
    RecognizingSpeech,
    RecognizedSpeech,
    TranslatingSpeech,
    TranslatedSpeech,
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub reason: ResultReason,
    pub text: String,
    /// Position of the utterance in the audio stream.
    pub offset: Duration,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub reason: ResultReason,
    /// The recognized text in the source language.
    pub text: String,
    pub translations: Vec<Translation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub language: String,
    pub text: String,
}
