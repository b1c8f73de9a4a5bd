//! Synthesizes a text with Azure and writes the audio to a WAV file.
//!
//! Usage: `azure-synthesize <output.wav> [text]`

use std::env;

use anyhow::{Context, Result, bail};
use speech_bridge::SpeechService;

const LOCALE: &str = "en-US";
const VOICE: &str = "AriaNeural";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv_override()?;
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (path, text) = match args.as_slice() {
        [path] => (
            path,
            "In a small village, surrounded by dense forests and gentle hills, there once lived an inventive tinkerer who built machines that amazed people.",
        ),
        [path, text] => (path, text.as_str()),
        _ => bail!("Invalid number of arguments, expect an output file and an optional text"),
    };

    let service = SpeechService::from_env()?;

    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Creating `{path}`"))?;
    let outcome = service
        .synthesize_to_writer(text, LOCALE, VOICE, &mut file)
        .await?;

    println!("Wrote {} bytes of {} to {path}", outcome.audio.len(), outcome.format);
    Ok(())
}
