//! Recognizes all speech in a 16 bit PCM WAV file.

use std::{env, path::Path};

use anyhow::{Context, Result, bail};
use speech_bridge::{AudioSource, ServiceOptions, SpeechService};

const LANGUAGE: &str = "de-DE";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv_override()?;
    tracing_subscriber::fmt::init();

    let mut args = env::args();
    let Some(file) = args.nth(1) else {
        bail!("Invalid number of arguments, expect a WAV file");
    };

    let wav = tokio::fs::read(Path::new(&file))
        .await
        .with_context(|| format!("Reading `{file}`"))?;
    let audio = AudioSource::from_wav_bytes(wav)?;

    let service = SpeechService::from_env()?.with_options(ServiceOptions {
        recognition_language: LANGUAGE.into(),
        ..Default::default()
    });

    let text = service.recognize_continuous(audio).await?;
    print!("{text}");
    Ok(())
}
