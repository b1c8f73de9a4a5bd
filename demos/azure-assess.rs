//! Scores the pronunciation of a 16 bit PCM WAV file against a reference text.
//!
//! Usage: `azure-assess <file.wav> <reference text>`

use std::env;

use anyhow::{Context, Result, bail};
use speech_bridge::{AudioSource, SpeechService};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv_override()?;
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [file, reference_text] = args.as_slice() else {
        bail!("Invalid number of arguments, expect a WAV file and the reference text");
    };

    let wav = tokio::fs::read(file)
        .await
        .with_context(|| format!("Reading `{file}`"))?;
    let audio = AudioSource::from_wav_bytes(wav)?;

    let service = SpeechService::from_env()?;
    let result = service.assess_pronunciation(reference_text, audio).await?;

    println!(
        "Pronunciation: {:.1} Accuracy: {:.1} Fluency: {:.1} Completeness: {:.1}",
        result.pronunciation_score,
        result.accuracy_score,
        result.fluency_score,
        result.completeness_score
    );
    for word in &result.words {
        println!("  {:<16} {:>5.1} {}", word.word, word.accuracy_score, word.error_type);
    }
    Ok(())
}
