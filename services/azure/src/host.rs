use anyhow::{Context, Result, anyhow};
use url::Url;

use speech_bridge_core::{Credential, Endpoint};

const SYNTHESIS_PATH: &str = "/cognitiveservices/v1";
const RECOGNITION_PATH: &str = "/speech/recognition/conversation/cognitiveservices/v1";
const TRANSLATION_PATH: &str = "/speech/translation/cognitiveservices/v1";

/// Resolves the service endpoints of a credential.
#[derive(Debug, Clone)]
pub struct Host {
    credential: Credential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Synthesis,
    Recognition,
    Translation,
}

impl Service {
    fn subdomain(&self) -> &'static str {
        match self {
            Service::Synthesis => "tts",
            Service::Recognition => "stt",
            Service::Translation => "s2s",
        }
    }
}

impl Host {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    pub fn subscription_key(&self) -> &str {
        self.credential.key()
    }

    /// The REST synthesis endpoint.
    pub fn synthesis_url(&self) -> Result<Url> {
        self.url(Service::Synthesis, false, SYNTHESIS_PATH)
    }

    /// The WebSocket endpoint for continuous recognition.
    pub fn recognition_url(&self, language: &str) -> Result<Url> {
        let mut url = self.url(Service::Recognition, true, RECOGNITION_PATH)?;
        url.query_pairs_mut()
            .append_pair("language", language)
            .append_pair("format", "detailed");
        Ok(url)
    }

    /// The REST endpoint for short audio, used for pronunciation assessment.
    pub fn short_audio_url(&self, language: &str) -> Result<Url> {
        let mut url = self.url(Service::Recognition, false, RECOGNITION_PATH)?;
        url.query_pairs_mut()
            .append_pair("language", language)
            .append_pair("format", "detailed");
        Ok(url)
    }

    /// The WebSocket endpoint for speech translation.
    pub fn translation_url(&self, from: &str, to: &[String]) -> Result<Url> {
        let mut url = self.url(Service::Translation, true, TRANSLATION_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("from", from);
            for to in to {
                query.append_pair("to", to);
            }
            query.append_pair("format", "detailed");
        }
        Ok(url)
    }

    fn url(&self, service: Service, websocket: bool, path: &str) -> Result<Url> {
        let mut url = match self.credential.endpoint() {
            Endpoint::Region(region) => {
                let scheme = if websocket { "wss" } else { "https" };
                let host = format!(
                    "{scheme}://{region}.{}.speech.microsoft.com",
                    service.subdomain()
                );
                Url::parse(&host).with_context(|| format!("Invalid region `{region}`"))?
            }
            Endpoint::Host(host) => {
                let mut url = host.clone();
                let secure = matches!(url.scheme(), "https" | "wss");
                let scheme = match (websocket, secure) {
                    (true, true) => "wss",
                    (true, false) => "ws",
                    (false, true) => "https",
                    (false, false) => "http",
                };
                url.set_scheme(scheme)
                    .map_err(|_| anyhow!("Failed to switch `{host}` to `{scheme}`"))?;
                url.set_query(None);
                url
            }
        };
        url.set_path(path);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_host() -> Host {
        Host::new(Credential::from_subscription("westeurope", "key").unwrap())
    }

    #[test]
    fn region_endpoints() {
        let host = region_host();
        assert_eq!(
            host.synthesis_url().unwrap().as_str(),
            "https://westeurope.tts.speech.microsoft.com/cognitiveservices/v1"
        );
        assert_eq!(
            host.recognition_url("de-DE").unwrap().as_str(),
            "wss://westeurope.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1?language=de-DE&format=detailed"
        );
        assert_eq!(
            host.short_audio_url("en-US").unwrap().as_str(),
            "https://westeurope.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1?language=en-US&format=detailed"
        );
        assert_eq!(
            host.translation_url("en-US", &["de".into(), "fr".into()])
                .unwrap()
                .as_str(),
            "wss://westeurope.s2s.speech.microsoft.com/speech/translation/cognitiveservices/v1?from=en-US&to=de&to=fr&format=detailed"
        );
    }

    #[test]
    fn custom_host_replaces_scheme_and_host() {
        let host = Host::new(Credential::from_host("http://localhost:5000", "key").unwrap());
        assert_eq!(
            host.synthesis_url().unwrap().as_str(),
            "http://localhost:5000/cognitiveservices/v1"
        );
        assert_eq!(
            host.recognition_url("en-US").unwrap().as_str(),
            "ws://localhost:5000/speech/recognition/conversation/cognitiveservices/v1?language=en-US&format=detailed"
        );

        let host = Host::new(Credential::from_host("wss://speech.example.com", "key").unwrap());
        assert!(host.synthesis_url().unwrap().as_str().starts_with("https://speech.example.com/"));
        assert!(host.translation_url("en-US", &[]).unwrap().as_str().starts_with("wss://speech.example.com/"));
    }
}
