//! Pronunciation assessment configuration and results.
//!
//! The scores are computed by the speech service and handed to the caller as they arrive.
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::SpeechError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradingSystem {
    FivePoint,
    #[default]
    HundredMark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    #[default]
    Phoneme,
    Word,
    FullText,
}

/// What to assess. Serializes to the JSON the `Pronunciation-Assessment` header carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PronunciationAssessmentConfig {
    pub reference_text: String,
    pub grading_system: GradingSystem,
    pub granularity: Granularity,
    pub dimension: String,
    pub enable_miscue: bool,
}

impl PronunciationAssessmentConfig {
    /// Hundred-mark grading on phoneme granularity.
    pub fn new(reference_text: impl Into<String>) -> Result<Self, SpeechError> {
        let reference_text = reference_text.into();
        if reference_text.trim().is_empty() {
            return Err(SpeechError::validation("Reference text is empty"));
        }
        Ok(Self {
            reference_text,
            grading_system: GradingSystem::HundredMark,
            granularity: Granularity::Phoneme,
            dimension: "Comprehensive".into(),
            enable_miscue: false,
        })
    }

    #[must_use]
    pub fn with_miscue(mut self, enable_miscue: bool) -> Self {
        self.enable_miscue = enable_miscue;
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Base64 of the JSON configuration.
    pub fn to_header_value(&self) -> serde_json::Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_json()?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PronunciationAssessmentResult {
    /// The text the service recognized.
    pub text: String,
    pub accuracy_score: f64,
    pub fluency_score: f64,
    pub completeness_score: f64,
    pub pronunciation_score: f64,
    pub words: Vec<WordAssessment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordAssessment {
    pub word: String,
    pub accuracy_score: f64,
    /// `None`, `Omission`, `Insertion` or `Mispronunciation`.
    pub error_type: String,
    pub phonemes: Vec<PhonemeAssessment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonemeAssessment {
    pub phoneme: String,
    pub accuracy_score: f64,
}
