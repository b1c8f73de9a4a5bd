//! Wire types of the Azure speech protocol.
//!
//! Server text messages carry a block of `Name:Value` header lines, an empty line and a JSON
//! body. The `Path` header names the message type.
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use speech_bridge_core::{
    PhonemeAssessment, PronunciationAssessmentResult, Translation, WordAssessment,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    pub path: String,
    pub request_id: Option<String>,
    pub body: String,
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self> {
        let (headers, body) = match text.split_once("\r\n\r\n") {
            Some((headers, body)) => (headers, body),
            None => (text, ""),
        };

        let mut path = None;
        let mut request_id = None;
        for line in headers.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.eq_ignore_ascii_case("Path") {
                path = Some(value.to_ascii_lowercase());
            } else if name.eq_ignore_ascii_case("X-RequestId") {
                request_id = Some(value.to_string());
            }
        }

        Ok(Self {
            path: path.context("Server message without a `Path` header")?,
            request_id,
            body: body.to_string(),
        })
    }

    pub fn json<'a, T: Deserialize<'a>>(&'a self) -> Result<T> {
        serde_json::from_str(&self.body)
            .with_context(|| format!("Failed to parse `{}` message", self.path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum RecognitionStatus {
    Success,
    NoMatch,
    InitialSilenceTimeout,
    BabbleTimeout,
    Error,
    EndOfDictation,
    TooManyRequests,
    BadRequest,
    Forbidden,
    ServiceUnavailable,
    #[serde(other)]
    Unknown,
}

/// Offsets and durations are counted in 100 nanosecond ticks.
pub fn ticks(ticks: u64) -> Duration {
    Duration::from_nanos(ticks.saturating_mul(100))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechHypothesis {
    pub text: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub duration: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechPhrase {
    pub recognition_status: RecognitionStatus,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub duration: u64,
    pub display_text: Option<String>,
    #[serde(rename = "NBest")]
    pub nbest: Option<Vec<NBest>>,
}

impl SpeechPhrase {
    /// The display text of the simple format, or the best alternative of the detailed format.
    pub fn text(&self) -> String {
        if let Some(text) = &self.display_text {
            return text.clone();
        }
        self.nbest
            .as_ref()
            .and_then(|nbest| nbest.first())
            .map(|best| best.display.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranslationHypothesis {
    pub text: String,
    pub translation: TranslationBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranslationPhrase {
    pub recognition_status: RecognitionStatus,
    #[serde(default)]
    pub text: String,
    pub translation: Option<TranslationBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranslationBody {
    pub translation_status: Option<String>,
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub translations: Vec<TranslationEntry>,
}

impl TranslationBody {
    pub fn translations(&self) -> Vec<Translation> {
        self.translations
            .iter()
            .map(|t| Translation {
                language: t.language.clone(),
                text: t.text.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranslationEntry {
    pub language: String,
    pub text: String,
}

/// The response of the short audio REST endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShortAudioResponse {
    pub recognition_status: RecognitionStatus,
    #[serde(rename = "NBest", default)]
    pub nbest: Vec<NBest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NBest {
    pub display: String,
    pub accuracy_score: Option<f64>,
    pub fluency_score: Option<f64>,
    pub completeness_score: Option<f64>,
    pub pron_score: Option<f64>,
    /// Older service versions nest the scores.
    pub pronunciation_assessment: Option<Scores>,
    pub words: Vec<WordEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Scores {
    pub accuracy_score: Option<f64>,
    pub fluency_score: Option<f64>,
    pub completeness_score: Option<f64>,
    pub pron_score: Option<f64>,
    pub error_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WordEntry {
    pub word: String,
    pub accuracy_score: Option<f64>,
    pub error_type: Option<String>,
    pub pronunciation_assessment: Option<Scores>,
    pub phonemes: Vec<PhonemeEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PhonemeEntry {
    pub phoneme: String,
    pub accuracy_score: Option<f64>,
    pub pronunciation_assessment: Option<Scores>,
}

impl NBest {
    pub fn into_assessment(self) -> PronunciationAssessmentResult {
        let nested = self.pronunciation_assessment.unwrap_or_default();
        PronunciationAssessmentResult {
            text: self.display,
            accuracy_score: self.accuracy_score.or(nested.accuracy_score).unwrap_or_default(),
            fluency_score: self.fluency_score.or(nested.fluency_score).unwrap_or_default(),
            completeness_score: self
                .completeness_score
                .or(nested.completeness_score)
                .unwrap_or_default(),
            pronunciation_score: self.pron_score.or(nested.pron_score).unwrap_or_default(),
            words: self.words.into_iter().map(WordEntry::into_assessment).collect(),
        }
    }
}

impl WordEntry {
    fn into_assessment(self) -> WordAssessment {
        let nested = self.pronunciation_assessment.unwrap_or_default();
        WordAssessment {
            word: self.word,
            accuracy_score: self.accuracy_score.or(nested.accuracy_score).unwrap_or_default(),
            error_type: self
                .error_type
                .or(nested.error_type)
                .unwrap_or_else(|| "None".into()),
            phonemes: self
                .phonemes
                .into_iter()
                .map(|phoneme| {
                    let nested = phoneme.pronunciation_assessment.unwrap_or_default();
                    PhonemeAssessment {
                        phoneme: phoneme.phoneme,
                        accuracy_score: phoneme
                            .accuracy_score
                            .or(nested.accuracy_score)
                            .unwrap_or_default(),
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header_prefixed_message() {
        let text = "X-RequestId:123ABC\r\nContent-Type:application/json; charset=utf-8\r\nPath:speech.phrase\r\n\r\n{\"RecognitionStatus\":\"Success\",\"DisplayText\":\"Hello.\",\"Offset\":1000000,\"Duration\":5000000}";
        let message = ServerMessage::parse(text).unwrap();
        assert_eq!(message.path, "speech.phrase");
        assert_eq!(message.request_id.as_deref(), Some("123ABC"));
        let phrase: SpeechPhrase = message.json().unwrap();
        assert_eq!(phrase.recognition_status, RecognitionStatus::Success);
        assert_eq!(phrase.text(), "Hello.");
        assert_eq!(ticks(phrase.offset), Duration::from_millis(100));
    }

    #[test]
    fn message_without_path_is_an_error() {
        assert!(ServerMessage::parse("X-RequestId:1\r\n\r\n{}").is_err());
    }

    #[test]
    fn detailed_phrase_uses_best_alternative() {
        let phrase: SpeechPhrase = serde_json::from_str(
            r#"{"RecognitionStatus":"Success","Offset":0,"Duration":0,
                "NBest":[{"Confidence":0.9,"Display":"Best."},{"Display":"Second."}]}"#,
        )
        .unwrap();
        assert_eq!(phrase.text(), "Best.");
    }

    #[test]
    fn unknown_status_does_not_fail() {
        let phrase: SpeechPhrase =
            serde_json::from_str(r#"{"RecognitionStatus":"SomethingNew"}"#).unwrap();
        assert_eq!(phrase.recognition_status, RecognitionStatus::Unknown);
    }

    #[test]
    fn translation_phrase() {
        let phrase: TranslationPhrase = serde_json::from_str(
            r#"{"RecognitionStatus":"Success","Text":"Hello","Offset":0,"Duration":0,
                "Translation":{"TranslationStatus":"Success",
                "Translations":[{"Language":"de","Text":"Hallo"}]}}"#,
        )
        .unwrap();
        let translations = phrase.translation.unwrap().translations();
        assert_eq!(
            translations,
            [Translation {
                language: "de".into(),
                text: "Hallo".into()
            }]
        );
    }

    #[test]
    fn assessment_scores_flat_and_nested() {
        let response: ShortAudioResponse = serde_json::from_str(
            r#"{"RecognitionStatus":"Success","NBest":[{
                "Display":"Hello.",
                "AccuracyScore":90.0,"FluencyScore":80.0,"CompletenessScore":100.0,"PronScore":85.5,
                "Words":[{"Word":"hello","PronunciationAssessment":{"AccuracyScore":70.0,"ErrorType":"Mispronunciation"},
                    "Phonemes":[{"Phoneme":"h","PronunciationAssessment":{"AccuracyScore":60.0}}]}]}]}"#,
        )
        .unwrap();
        let result = response.nbest.into_iter().next().unwrap().into_assessment();
        assert_eq!(result.text, "Hello.");
        assert_eq!(result.pronunciation_score, 85.5);
        assert_eq!(result.words[0].error_type, "Mispronunciation");
        assert_eq!(result.words[0].accuracy_score, 70.0);
        assert_eq!(result.words[0].phonemes[0].accuracy_score, 60.0);
    }

    #[test]
    fn simple_format_response_has_no_assessment() {
        let response: ShortAudioResponse = serde_json::from_str(
            r#"{"RecognitionStatus":"Success","DisplayText":"Hello.","Offset":100,"Duration":500}"#,
        )
        .unwrap();
        assert_eq!(response.recognition_status, RecognitionStatus::Success);
        assert!(response.nbest.is_empty());
    }
}
