use anyhow::{Context, Result, bail};
use bytes::BytesMut;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use crate::{
    Host, SUBSCRIPTION_KEY_HEADER, USER_AGENT_VALUE,
    messages::{RecognitionStatus, ShortAudioResponse},
};
use speech_bridge_core::{
    AudioSource, PronunciationAssessmentConfig, PronunciationAssessmentResult, RecognitionConfig,
};

/// Short audio recognition with a `Pronunciation-Assessment` header.
///
/// The short audio endpoint takes at most 60 seconds of audio, it is sent in one request body.
pub async fn assess_pronunciation(
    client: &reqwest::Client,
    host: &Host,
    recognition: RecognitionConfig,
    assessment: PronunciationAssessmentConfig,
    audio: AudioSource,
) -> Result<PronunciationAssessmentResult> {
    let url = host.short_audio_url(&recognition.language)?;
    let content_type = format!(
        "audio/wav; codecs=audio/pcm; samplerate={}",
        audio.format().sample_rate
    );
    let header = assessment
        .to_header_value()
        .context("Serializing pronunciation assessment config")?;

    let mut body = BytesMut::new();
    let mut chunks = audio.into_stream();
    while let Some(chunk) = chunks.try_next().await.context("Reading audio")? {
        body.extend_from_slice(&chunk);
    }
    debug!("Assessing {} bytes of audio", body.len());

    let response = client
        .post(url)
        .header(SUBSCRIPTION_KEY_HEADER, host.subscription_key())
        .header(CONTENT_TYPE, content_type)
        .header(ACCEPT, "application/json")
        .header(USER_AGENT, USER_AGENT_VALUE)
        .header("Pronunciation-Assessment", header)
        .body(body.freeze())
        .send()
        .await
        .context("Sending pronunciation assessment request")?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .context("Receiving pronunciation assessment response")?;
    if !status.is_success() {
        bail!(
            "Pronunciation assessment failed with {status}: {}",
            String::from_utf8_lossy(&body)
        );
    }

    let response: ShortAudioResponse =
        serde_json::from_slice(&body).context("Parsing pronunciation assessment response")?;
    if response.recognition_status != RecognitionStatus::Success {
        bail!(
            "Pronunciation assessment recognition ended with {:?}",
            response.recognition_status
        );
    }
    let Some(best) = response.nbest.into_iter().next() else {
        bail!("Pronunciation assessment response without results");
    };
    Ok(best.into_assessment())
}
