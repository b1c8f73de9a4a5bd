use std::sync::Arc;

use static_assertions::assert_impl_all;

use azure::AzureEngine;
use speech_bridge_core::{
    AudioPlayer, Credential, OutputFormat, Profanity, SpeechEngine, SpeechError, voice,
};

/// Settings that apply to all calls of a [`SpeechService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Language of the audio for continuous recognition and pronunciation assessment.
    pub recognition_language: String,
    pub output_format: OutputFormat,
    pub profanity: Profanity,
    /// Pronunciation assessment also reports omitted and inserted words.
    pub enable_miscue: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            recognition_language: voice::DEFAULT_LOCALE.into(),
            output_format: OutputFormat::default(),
            profanity: Profanity::default(),
            enable_miscue: false,
        }
    }
}

/// Speech synthesis, continuous recognition, continuous translation and pronunciation
/// assessment.
///
/// The service holds only immutable state. It is cheap to clone and concurrent calls do not
/// influence each other, every call builds its own configuration.
#[derive(Debug, Clone)]
pub struct SpeechService {
    pub(crate) engine: Arc<dyn SpeechEngine>,
    pub(crate) player: Option<Arc<dyn AudioPlayer>>,
    pub(crate) options: Arc<ServiceOptions>,
}

assert_impl_all!(SpeechService: Send, Sync);

impl SpeechService {
    /// A service that talks to Azure.
    ///
    /// With the `device` feature, the default speaker is used for playback.
    pub fn new(credential: Credential) -> Self {
        let service = Self::with_engine(AzureEngine::new(credential));
        #[cfg(feature = "device")]
        let service = service.with_player(crate::device::DefaultSpeaker);
        service
    }

    /// A service configured from `AZURE_SUBSCRIPTION_KEY` and `AZURE_REGION` or `AZURE_HOST`.
    pub fn from_env() -> Result<Self, SpeechError> {
        Ok(Self::new(Credential::from_env()?))
    }

    pub fn with_engine(engine: impl SpeechEngine + 'static) -> Self {
        Self {
            engine: Arc::new(engine),
            player: None,
            options: Default::default(),
        }
    }

    #[must_use]
    pub fn with_player(mut self, player: impl AudioPlayer + 'static) -> Self {
        self.player = Some(Arc::new(player));
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ServiceOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }
}
