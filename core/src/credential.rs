use std::{env, fmt};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::SpeechError;

pub const SUBSCRIPTION_KEY_ENV: &str = "AZURE_SUBSCRIPTION_KEY";
pub const REGION_ENV: &str = "AZURE_REGION";
pub const HOST_ENV: &str = "AZURE_HOST";

/// Credential parameters as they appear in configuration files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    pub host: Option<String>,
    pub region: Option<String>,
    pub subscription_key: String,
}

/// The subscription key and where to reach the speech service.
///
/// Immutable once constructed. `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    key: String,
    endpoint: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A cloud region identifier like `westeurope`.
    Region(String),
    /// A custom host, for example a speech container. Replaces all region derived hosts.
    Host(Url),
}

impl Credential {
    pub fn from_subscription(
        region: impl Into<String>,
        subscription_key: impl Into<String>,
    ) -> Result<Self, SpeechError> {
        let region = region.into();
        if region.is_empty() {
            return Err(SpeechError::configuration("Region is empty"));
        }
        if !region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SpeechError::configuration(format!(
                "`{region}`: Invalid region identifier"
            )));
        }
        Ok(Self {
            key: validate_key(subscription_key.into())?,
            endpoint: Endpoint::Region(region.to_ascii_lowercase()),
        })
    }

    pub fn from_host(
        host: impl AsRef<str>,
        subscription_key: impl Into<String>,
    ) -> Result<Self, SpeechError> {
        let host = host.as_ref();
        let url = Url::parse(host)
            .map_err(|e| SpeechError::configuration(format!("`{host}`: Invalid host: {e}")))?;
        if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(SpeechError::configuration(format!(
                "`{host}`: Unsupported host scheme"
            )));
        }
        Ok(Self {
            key: validate_key(subscription_key.into())?,
            endpoint: Endpoint::Host(url),
        })
    }

    pub fn from_params(params: Params) -> Result<Self, SpeechError> {
        if let Some(host) = params.host {
            Self::from_host(host, params.subscription_key)
        } else if let Some(region) = params.region {
            Self::from_subscription(region, params.subscription_key)
        } else {
            Err(SpeechError::configuration(
                "Neither host nor region is defined in params",
            ))
        }
    }

    /// Reads `AZURE_SUBSCRIPTION_KEY` and `AZURE_HOST` or `AZURE_REGION`.
    pub fn from_env() -> Result<Self, SpeechError> {
        let subscription_key = env::var(SUBSCRIPTION_KEY_ENV).map_err(|_| {
            SpeechError::configuration(format!("Subscription key not set on {SUBSCRIPTION_KEY_ENV} env"))
        })?;

        if let Ok(host) = env::var(HOST_ENV) {
            return Self::from_host(host, subscription_key);
        }

        let region = env::var(REGION_ENV).map_err(|_| {
            SpeechError::configuration(format!("Region not set on {REGION_ENV} env"))
        })?;
        Self::from_subscription(region, subscription_key)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn region(&self) -> Option<&str> {
        match &self.endpoint {
            Endpoint::Region(region) => Some(region),
            Endpoint::Host(_) => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl TryFrom<Params> for Credential {
    type Error = SpeechError;

    fn try_from(params: Params) -> Result<Self, Self::Error> {
        Self::from_params(params)
    }
}

fn validate_key(key: String) -> Result<String, SpeechError> {
    if key.trim().is_empty() {
        return Err(SpeechError::configuration("Subscription key is empty"));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_credential_is_normalized() {
        let credential = Credential::from_subscription("WestEurope", "secret").unwrap();
        assert_eq!(credential.region(), Some("westeurope"));
        assert_eq!(credential.key(), "secret");
    }

    #[test]
    fn empty_key_or_region_is_a_configuration_error() {
        assert!(matches!(
            Credential::from_subscription("westeurope", " "),
            Err(SpeechError::Configuration { .. })
        ));
        assert!(matches!(
            Credential::from_subscription("", "secret"),
            Err(SpeechError::Configuration { .. })
        ));
        assert!(matches!(
            Credential::from_subscription("west europe", "secret"),
            Err(SpeechError::Configuration { .. })
        ));
    }

    #[test]
    fn host_takes_precedence_over_region() {
        let params: Params = serde_json::from_str(
            r#"{"host": "ws://localhost:5000", "region": "eastus", "subscriptionKey": "k"}"#,
        )
        .unwrap();
        let credential = Credential::try_from(params).unwrap();
        assert_eq!(credential.region(), None);
        assert!(
            matches!(credential.endpoint(), Endpoint::Host(url) if url.host_str() == Some("localhost"))
        );
    }

    #[test]
    fn params_need_host_or_region() {
        let params = Params {
            subscription_key: "k".into(),
            ..Default::default()
        };
        assert!(matches!(
            Credential::from_params(params),
            Err(SpeechError::Configuration { .. })
        ));
    }

    #[test]
    fn invalid_host_is_rejected() {
        assert!(Credential::from_host("not a url", "k").is_err());
        assert!(Credential::from_host("ftp://example.com", "k").is_err());
    }

    #[test]
    fn debug_does_not_print_the_key() {
        let credential = Credential::from_subscription("eastus", "very-secret").unwrap();
        let debug = format!("{credential:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("eastus"));
    }
}
