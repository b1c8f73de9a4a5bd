use crate::SpeechError;

pub const DEFAULT_LOCALE: &str = "en-US";
pub const DEFAULT_VOICE: &str = "AriaNeural";

/// The voice identifier the service expects in `<voice name="...">`.
pub fn full_voice_name(locale: &str, voice: &str) -> String {
    format!("Microsoft Server Speech Text to Speech Voice ({locale}, {voice})")
}

/// Short voice name for a locale when none is configured.
///
/// TODO: Support more languages for the default voice.
pub fn default_voice_for_language(locale: &str) -> Result<&'static str, SpeechError> {
    match locale {
        "en-US" => Ok(DEFAULT_VOICE),
        "en-GB" => Ok("LibbyNeural"),
        "de-DE" => Ok("KatjaNeural"),
        "fr-FR" => Ok("DeniseNeural"),
        "es-ES" => Ok("ElviraNeural"),
        _ => Err(SpeechError::validation(format!(
            "No default voice for `{locale}` defined, select one from here: <https://learn.microsoft.com/en-us/azure/ai-services/speech-service/language-support?tabs=tts>"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_voice_name() {
        assert_eq!(
            full_voice_name(DEFAULT_LOCALE, DEFAULT_VOICE),
            "Microsoft Server Speech Text to Speech Voice (en-US, AriaNeural)"
        );
    }

    #[test]
    fn unknown_locale_has_no_default_voice() {
        assert_eq!(default_voice_for_language("de-DE").unwrap(), "KatjaNeural");
        let error = default_voice_for_language("xx-XX").unwrap_err();
        assert!(error.to_string().contains("xx-XX"));
    }
}
