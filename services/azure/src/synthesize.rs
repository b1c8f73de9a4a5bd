use anyhow::{Context, Result};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use crate::{
    Host, SUBSCRIPTION_KEY_HEADER, USER_AGENT_VALUE, cancellation_code, request_cancellation,
};
use speech_bridge_core::{CancellationDetails, SynthesisOutcome, SynthesisRequest};

/// One REST synthesis request.
///
/// Failures the service reports are returned as a canceled outcome. Only local failures are
/// errors.
pub async fn synthesize(
    client: &reqwest::Client,
    host: &Host,
    request: SynthesisRequest,
) -> Result<SynthesisOutcome> {
    let format = request.output_format;
    let url = host.synthesis_url()?;
    debug!("Synthesizing {} bytes of SSML as {format}", request.ssml.len());

    let response = client
        .post(url)
        .header(SUBSCRIPTION_KEY_HEADER, host.subscription_key())
        .header(CONTENT_TYPE, "application/ssml+xml")
        .header("X-Microsoft-OutputFormat", format.as_str())
        .header(USER_AGENT, USER_AGENT_VALUE)
        .body(request.ssml)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            if let Some(details) = request_cancellation(&e) {
                return Ok(SynthesisOutcome::canceled(format, details));
            }
            return Err(e).context("Sending synthesis request");
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Ok(SynthesisOutcome::canceled(
            format,
            CancellationDetails::error(
                cancellation_code(status.as_u16()),
                format!("{status} {body}").trim().to_string(),
            ),
        ));
    }

    let audio = response
        .bytes()
        .await
        .context("Receiving synthesized audio")?;
    debug!("Received {} bytes of audio", audio.len());
    Ok(SynthesisOutcome::completed(format, audio))
}
