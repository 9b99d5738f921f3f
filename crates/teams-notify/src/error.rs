//! Error types for the teams-notify crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while resolving configuration or delivering a card.
///
/// None of these ever escape the validation or delivery phase; they are
/// recorded on a [`ValidationVerdict`](crate::ValidationVerdict) or a
/// [`DeliveryResult`](crate::DeliveryResult) and logged.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A required configuration key has no value.
    #[error("configuration missing: {key}")]
    ConfigMissing {
        /// The property name that was missing.
        key: String,
    },

    /// A configuration value is present but malformed.
    #[error("configuration invalid for {key}: {reason}")]
    ConfigInvalid {
        /// The property name that failed validation.
        key: String,
        /// The reason the value was rejected.
        reason: String,
    },

    /// Network-level failure (DNS, connect, timeout, malformed URL).
    #[error("transport error: {0}")]
    Transport(String),

    /// The webhook answered with a non-2xx status.
    #[error("webhook rejected notification with status {status}")]
    RemoteRejected {
        /// HTTP status code returned by the webhook.
        status: u16,
        /// Response body, if it could be read.
        body: Option<String>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Anything else, including a panic caught at a phase boundary.
    #[error("unexpected fault: {0}")]
    Unexpected(String),
}

impl NotifyError {
    /// Returns the classification recorded on verdicts and delivery results.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigMissing { .. } => ErrorKind::ConfigMissing,
            Self::ConfigInvalid { .. } => ErrorKind::ConfigInvalid,
            Self::Transport(_) => ErrorKind::TransportError,
            Self::RemoteRejected { .. } => ErrorKind::RemoteRejected,
            Self::Serialization(_) | Self::Unexpected(_) => ErrorKind::UnexpectedFault,
        }
    }
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A required key was absent.
    ConfigMissing,
    /// A key was present but failed its format check.
    ConfigInvalid,
    /// Network, DNS, timeout or malformed URL.
    TransportError,
    /// Non-2xx HTTP response.
    RemoteRejected,
    /// Any other fault.
    UnexpectedFault,
}

impl ErrorKind {
    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMissing => "config_missing",
            Self::ConfigInvalid => "config_invalid",
            Self::TransportError => "transport_error",
            Self::RemoteRejected => "remote_rejected",
            Self::UnexpectedFault => "unexpected_fault",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
