use tracing::info;

use crate::{SpeechService, synthesize::log_transport};
use speech_bridge_core::{
    AudioSource, PronunciationAssessmentConfig, PronunciationAssessmentResult, RecognitionConfig,
    SpeechError,
};

impl SpeechService {
    /// Score how well `audio` pronounces `reference_text`.
    ///
    /// Hundred-mark grading with phoneme granularity. The scores are computed by the engine and
    /// returned as they are.
    pub async fn assess_pronunciation(
        &self,
        reference_text: &str,
        audio: AudioSource,
    ) -> Result<PronunciationAssessmentResult, SpeechError> {
        let assessment = PronunciationAssessmentConfig::new(reference_text)?
            .with_miscue(self.options.enable_miscue);
        let recognition = RecognitionConfig {
            language: self.options.recognition_language.clone(),
            profanity: self.options.profanity,
        };

        let result = self
            .engine
            .assess_pronunciation(recognition, assessment, audio)
            .await
            .map_err(log_transport)?;

        info!(
            "Pronunciation score {} (accuracy {}, fluency {}, completeness {})",
            result.pronunciation_score,
            result.accuracy_score,
            result.fluency_score,
            result.completeness_score
        );
        Ok(result)
    }
}
