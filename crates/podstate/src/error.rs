//! Error types for pod status decoding and configuration resolution.

use thiserror::Error;

/// The raw pod status payload could not be decoded.
///
/// This is the only failure that prevents a pod from producing any result.
#[derive(Debug, Error)]
pub enum MalformedStatus {
    /// No payload was provided
    #[error("pod status is missing")]
    Missing,

    /// The payload is not valid JSON
    #[error("pod status is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// The payload is valid JSON but not an object
    #[error("pod status is not a JSON object")]
    NotAnObject,

    /// The payload does not have the shape of a pod status
    #[error("pod status could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Invalid user configuration, detected while resolving parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No chat channels were configured
    #[error("Missing required configuration parameter: channels")]
    MissingChannels,

    /// A numeric parameter could not be parsed
    #[error("Invalid value for configuration parameter {name}: {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    /// A scope pattern is not a valid regular expression
    #[error("Invalid regular expression for configuration parameter {name}: {source}")]
    InvalidRegex {
        name: &'static str,
        #[source]
        source: regex::Error,
    },
}
