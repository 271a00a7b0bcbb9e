// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors surfaced to callers and handlers of a transmission.
///
/// Backpressure rejections are not represented here: they are reported as a
/// [`crate::transmit::Submission`] and never raised to the submitter.
#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    /// Connection refused, timeout, DNS failure and friends. Never retried by the engine.
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The collector answered, but with a non-success status (e.g. 401 for a bad write key).
    #[error("{status}: collector rejected request: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    /// A response body could not be decoded into the expected shape.
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// Update and delete address a marker by the id the server assigned on creation.
    #[error("Marker has no id")]
    MissingMarkerId,
}

impl TransmitError {
    /// Status code of the collector response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Unable to parse {var}={value}")]
    Parse { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let error = TransmitError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: "unknown API key".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "401 Unauthorized: collector rejected request: unknown API key"
        );
        assert_eq!(error.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_decode_error_has_no_status() {
        let decode = serde_json::from_str::<serde_json::Value>("{not json")
            .expect_err("payload should not parse");
        let error = TransmitError::from(decode);
        assert!(error.to_string().starts_with("Failed to decode response body"));
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::Parse {
            var: "HONEYCOMB_REJECTION_POLICY",
            value: "sometimes".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unable to parse HONEYCOMB_REJECTION_POLICY=sometimes"
        );
    }
}
