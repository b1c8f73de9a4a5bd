mod assess;
#[cfg(feature = "device")]
mod device;
mod recognize;
mod service;
mod session;
mod synthesize;
mod translate;


#[cfg(feature = "device")]
pub use device::{DefaultSpeaker, default_microphone};
pub use service::*;
pub use speech_bridge_core::*;
pub use synthesize::{AudioSink, SynthesisContent};
pub use tokio_util::sync::CancellationToken;
pub use translate::TranslationRequest;

pub mod engines {
    pub use azure::AzureEngine;
}
