//! A [`SpeechEngine`] for the Azure speech service.
//!
//! Synthesis and pronunciation assessment use the REST endpoints, continuous recognition and
//! translation the speech WebSocket protocol.
mod assess;
mod host;
mod messages;
mod synthesize;
mod transcribe;
mod translate;
mod websocket;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

pub use host::Host;
use speech_bridge_core::{
    AudioSource, CancellationDetails, CancellationErrorCode, Credential, EventSession,
    PronunciationAssessmentConfig, PronunciationAssessmentResult, RecognitionConfig,
    RecognitionResult, SpeechEngine, SynthesisOutcome, SynthesisRequest, TranslationConfig,
    TranslationResult, session_channel,
};

use messages::RecognitionStatus;
use transcribe::RecognitionHandler;
use translate::TranslationHandler;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const USER_AGENT_VALUE: &str = concat!("speech-bridge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct AzureEngine {
    host: Host,
    client: reqwest::Client,
}

impl AzureEngine {
    pub fn new(credential: Credential) -> Self {
        Self {
            host: Host::new(credential),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SpeechEngine for AzureEngine {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisOutcome> {
        synthesize::synthesize(&self.client, &self.host, request).await
    }

    async fn start_recognition(
        &self,
        config: RecognitionConfig,
        audio: AudioSource,
    ) -> Result<EventSession<RecognitionResult>> {
        let mut url = self.host.recognition_url(&config.language)?;
        url.query_pairs_mut()
            .append_pair("profanity", config.profanity.as_str());
        info!("Starting recognition for `{}`", config.language);

        let (sender, session) = session_channel();
        let task = tokio::spawn(websocket::run_session(
            url,
            self.host.subscription_key().to_string(),
            audio,
            sender,
            RecognitionHandler,
        ));
        Ok(session.with_task(task))
    }

    async fn start_translation(
        &self,
        config: TranslationConfig,
        audio: AudioSource,
    ) -> Result<EventSession<TranslationResult>> {
        let mut url = self
            .host
            .translation_url(&config.from_language, &config.target_languages)?;
        url.query_pairs_mut()
            .append_pair("profanity", config.profanity.as_str());
        info!(
            "Starting translation from `{}` to {:?}",
            config.from_language, config.target_languages
        );

        let (sender, session) = session_channel();
        let task = tokio::spawn(websocket::run_session(
            url,
            self.host.subscription_key().to_string(),
            audio,
            sender,
            TranslationHandler,
        ));
        Ok(session.with_task(task))
    }

    async fn assess_pronunciation(
        &self,
        recognition: RecognitionConfig,
        assessment: PronunciationAssessmentConfig,
        audio: AudioSource,
    ) -> Result<PronunciationAssessmentResult> {
        assess::assess_pronunciation(&self.client, &self.host, recognition, assessment, audio)
            .await
    }
}

/// The cancellation code for an HTTP status the service responded with.
pub fn cancellation_code(status: u16) -> CancellationErrorCode {
    match status {
        400 => CancellationErrorCode::BadRequest,
        401 => CancellationErrorCode::AuthenticationFailure,
        403 => CancellationErrorCode::Forbidden,
        408 => CancellationErrorCode::ServiceTimeout,
        429 => CancellationErrorCode::TooManyRequests,
        503 => CancellationErrorCode::ServiceUnavailable,
        500..=599 => CancellationErrorCode::ServiceError,
        _ => CancellationErrorCode::RuntimeError,
    }
}

/// Request failures the service reports as a cancellation rather than an error.
fn request_cancellation(error: &reqwest::Error) -> Option<CancellationDetails> {
    let code = if error.is_timeout() {
        CancellationErrorCode::ServiceTimeout
    } else if error.is_connect() {
        CancellationErrorCode::ConnectionFailure
    } else {
        return None;
    };
    Some(CancellationDetails::error(code, error.to_string()))
}

fn status_cancellation(status: &RecognitionStatus) -> CancellationDetails {
    let code = match status {
        RecognitionStatus::TooManyRequests => CancellationErrorCode::TooManyRequests,
        RecognitionStatus::BadRequest => CancellationErrorCode::BadRequest,
        RecognitionStatus::Forbidden => CancellationErrorCode::Forbidden,
        RecognitionStatus::ServiceUnavailable => CancellationErrorCode::ServiceUnavailable,
        _ => CancellationErrorCode::ServiceError,
    };
    CancellationDetails::error(code, format!("Recognition status: {status:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            cancellation_code(401),
            CancellationErrorCode::AuthenticationFailure
        );
        assert_eq!(cancellation_code(403), CancellationErrorCode::Forbidden);
        assert_eq!(cancellation_code(429), CancellationErrorCode::TooManyRequests);
        assert_eq!(
            cancellation_code(503),
            CancellationErrorCode::ServiceUnavailable
        );
        assert_eq!(cancellation_code(502), CancellationErrorCode::ServiceError);
    }

    #[tokio::test]
    async fn unreachable_host_cancels_synthesis() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let credential = Credential::from_host("http://127.0.0.1:9", "key").unwrap();
        let engine = AzureEngine::new(credential);
        let outcome = engine
            .synthesize(SynthesisRequest {
                ssml: "<speak/>".into(),
                output_format: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome.cancellation.map(|c| c.error_code),
            Some(CancellationErrorCode::ConnectionFailure)
        );
    }
}
