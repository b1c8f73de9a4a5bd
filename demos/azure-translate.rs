//! Translates speech from the default microphone and speaks the translations until Ctrl+C.
//!
//! Usage: `azure-translate [from] [to]`, defaults to `en-US` and `de-DE`.

use std::env;

use anyhow::Result;
use speech_bridge::{CancellationToken, SpeechService, TranslationRequest};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv_override()?;
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let from = args.next().unwrap_or_else(|| "en-US".into());
    let to = args.next().unwrap_or_else(|| "de-DE".into());

    let service = SpeechService::from_env()?;

    let stop = CancellationToken::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("Stopping");
            }
            stop.cancel();
        });
    }

    println!("Speak now, press Ctrl+C to stop");
    let spoken = service
        .translate_continuous_from_default_microphone(TranslationRequest::new(from, to), stop)
        .await?;

    println!("{} translations spoken", spoken.len());
    Ok(())
}
