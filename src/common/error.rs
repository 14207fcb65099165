//! Error types for the application.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Errors raised by the JSON-backed route and webhook stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access store file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store file '{}' is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize store: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Webhook URL is not an accepted Discord webhook endpoint: {url}")]
    InvalidWebhookUrl { url: String },
}

/// A single failed delivery attempt to a channel or webhook endpoint.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Channel not found: {channel_id}")]
    ChannelNotFound { channel_id: u64 },

    #[error("Webhook endpoint no longer exists")]
    EndpointNotFound,

    #[error("Webhook rejected delivery ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Discord API error: {0}")]
    Discord(#[from] serenity::Error),
}

/// An administrator command that could not be understood.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Usage: {usage}")]
    Usage { usage: String },

    #[error("'{0}' is not a channel mention or id")]
    InvalidChannel(String),
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for a single delivery attempt.
pub type DeliveryResult = std::result::Result<(), DeliveryError>;
