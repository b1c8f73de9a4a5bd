use std::fmt;

use derive_more::{Display, Error};

/// Errors returned by the speech operations.
///
/// Engine failures are opaque and arrive as [`SpeechError::Transport`]. Cancellations reported
/// by the engine keep the vendor's error code, reason and detail text.
#[derive(Debug, Display, Error)]
pub enum SpeechError {
    /// Missing or invalid credential, region, host or output device.
    #[display("Configuration error: {message}")]
    Configuration { message: String },
    /// A malformed request, for example an empty text or voice name.
    #[display("Invalid request: {message}")]
    Validation { message: String },
    #[display("Error creating audio. {details}")]
    Synthesis { details: CancellationDetails },
    #[display("Error recognizing speech. {details}")]
    Recognition { details: CancellationDetails },
    #[display("Transport error: {message}")]
    Transport { message: String },
    /// The caller canceled a continuous operation.
    #[display("Canceled by the caller")]
    Canceled,
}

impl SpeechError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Wraps an engine failure, keeping the complete context chain in the message.
    pub fn transport(error: anyhow::Error) -> Self {
        let message = error
            .chain()
            .map(|e| e.to_string())
            .collect::<Vec<String>>()
            .join(": ");
        Self::Transport { message }
    }

    /// The engine's cancellation details, if this error originates from one.
    pub fn cancellation(&self) -> Option<&CancellationDetails> {
        match self {
            Self::Synthesis { details } | Self::Recognition { details } => Some(details),
            _ => None,
        }
    }
}

/// Why the engine canceled a synthesis or a recognition session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationDetails {
    pub reason: CancellationReason,
    pub error_code: CancellationErrorCode,
    pub error_details: String,
}

impl CancellationDetails {
    pub fn error(error_code: CancellationErrorCode, error_details: impl Into<String>) -> Self {
        Self {
            reason: CancellationReason::Error,
            error_code,
            error_details: error_details.into(),
        }
    }

    pub fn end_of_stream() -> Self {
        Self {
            reason: CancellationReason::EndOfStream,
            error_code: CancellationErrorCode::NoError,
            error_details: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.reason == CancellationReason::Error
    }
}

impl fmt::Display for CancellationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error Code: {} Reason: {} - Details: {}",
            self.error_code, self.reason, self.error_details
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancellationReason {
    Error,
    EndOfStream,
    CancelledByUser,
}

impl CancellationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::EndOfStream => "EndOfStream",
            Self::CancelledByUser => "CancelledByUser",
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The vendor's cancellation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancellationErrorCode {
    NoError,
    AuthenticationFailure,
    BadRequest,
    TooManyRequests,
    Forbidden,
    ConnectionFailure,
    ServiceTimeout,
    ServiceError,
    ServiceUnavailable,
    RuntimeError,
}

impl CancellationErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoError => "NoError",
            Self::AuthenticationFailure => "AuthenticationFailure",
            Self::BadRequest => "BadRequest",
            Self::TooManyRequests => "TooManyRequests",
            Self::Forbidden => "Forbidden",
            Self::ConnectionFailure => "ConnectionFailure",
            Self::ServiceTimeout => "ServiceTimeout",
            Self::ServiceError => "ServiceError",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::RuntimeError => "RuntimeError",
        }
    }
}

impl fmt::Display for CancellationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn synthesis_error_message_contains_code_reason_and_details() {
        let error = SpeechError::Synthesis {
            details: CancellationDetails::error(
                CancellationErrorCode::AuthenticationFailure,
                "WebSocket upgrade failed",
            ),
        };
        assert_eq!(
            error.to_string(),
            "Error creating audio. Error Code: AuthenticationFailure Reason: Error - Details: WebSocket upgrade failed"
        );
    }

    #[test]
    fn transport_error_keeps_the_context_chain() {
        let result: anyhow::Result<()> = Err(anyhow::anyhow!("connection reset"));
        let error = result.context("Sending audio").unwrap_err();
        let error = SpeechError::transport(error);
        assert_eq!(
            error.to_string(),
            "Transport error: Sending audio: connection reset"
        );
        assert!(error.cancellation().is_none());
    }

    #[test]
    fn end_of_stream_is_not_an_error() {
        assert!(!CancellationDetails::end_of_stream().is_error());
        assert!(CancellationDetails::error(CancellationErrorCode::ServiceError, "").is_error());
    }
}
